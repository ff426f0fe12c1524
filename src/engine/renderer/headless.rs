// Headless rendering backend
//
// Keeps the bookkeeping of a real backend (handles, bindings, link checks)
// without touching a GPU. Used by `--headless` runs and by the test suite.

use super::backend::{
    BackendError, BufferDescription, BufferKind, GpuHandle, HandleAllocator, RenderBackend,
    ShaderStage, TextureData,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum HeadlessObject {
    Shader { stage: ShaderStage },
    Program { shaders: Vec<GpuHandle> },
    Texture { width: u32, height: u32 },
    Buffer { kind: BufferKind, len: usize },
}

/// Counts of live objects per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub shaders: usize,
    pub programs: usize,
    pub textures: usize,
    pub buffers: usize,
}

impl HeadlessStats {
    pub fn total(&self) -> usize {
        self.shaders + self.programs + self.textures + self.buffers
    }
}

/// Backend that validates calls and tracks object lifetimes in memory
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    allocator: HandleAllocator,
    objects: RefCell<HashMap<GpuHandle, HeadlessObject>>,
    active_program: Cell<Option<GpuHandle>>,
    bound_textures: RefCell<HashMap<u32, GpuHandle>>,
    bound_buffers: RefCell<HashMap<BufferKind, GpuHandle>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a handle refers to a live object
    pub fn is_live(&self, handle: GpuHandle) -> bool {
        self.objects.borrow().contains_key(&handle)
    }

    /// Texture currently bound to a unit
    pub fn bound_texture(&self, unit: u32) -> Option<GpuHandle> {
        self.bound_textures.borrow().get(&unit).copied()
    }

    /// Buffer currently bound for a kind
    pub fn bound_buffer(&self, kind: BufferKind) -> Option<GpuHandle> {
        self.bound_buffers.borrow().get(&kind).copied()
    }

    /// Dimensions of a live texture
    pub fn texture_size(&self, texture: GpuHandle) -> Option<(u32, u32)> {
        match self.objects.borrow().get(&texture) {
            Some(HeadlessObject::Texture { width, height }) => Some((*width, *height)),
            _ => None,
        }
    }

    /// Kind and byte length of a live buffer
    pub fn buffer_info(&self, buffer: GpuHandle) -> Option<(BufferKind, usize)> {
        match self.objects.borrow().get(&buffer) {
            Some(HeadlessObject::Buffer { kind, len }) => Some((*kind, *len)),
            _ => None,
        }
    }

    /// Shaders a live program was linked from
    pub fn program_shaders(&self, program: GpuHandle) -> Option<Vec<GpuHandle>> {
        match self.objects.borrow().get(&program) {
            Some(HeadlessObject::Program { shaders }) => Some(shaders.clone()),
            _ => None,
        }
    }

    /// Count the live objects
    pub fn stats(&self) -> HeadlessStats {
        let mut stats = HeadlessStats::default();
        for object in self.objects.borrow().values() {
            match object {
                HeadlessObject::Shader { .. } => stats.shaders += 1,
                HeadlessObject::Program { .. } => stats.programs += 1,
                HeadlessObject::Texture { .. } => stats.textures += 1,
                HeadlessObject::Buffer { .. } => stats.buffers += 1,
            }
        }
        stats
    }

    fn insert(&self, object: HeadlessObject) -> GpuHandle {
        let handle = self.allocator.allocate();
        self.objects.borrow_mut().insert(handle, object);
        handle
    }

    fn remove(&self, handle: GpuHandle) {
        if self.objects.borrow_mut().remove(&handle).is_none() {
            log::debug!("Headless backend: delete of unknown object {}", handle);
        }
    }

    fn shader_stage(&self, handle: GpuHandle) -> Option<ShaderStage> {
        match self.objects.borrow().get(&handle) {
            Some(HeadlessObject::Shader { stage }) => Some(*stage),
            _ => None,
        }
    }
}

impl RenderBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_shader(
        &self,
        stage: ShaderStage,
        label: &str,
        source: &str,
    ) -> Result<GpuHandle, BackendError> {
        if source.trim().is_empty() {
            return Err(BackendError::Compile {
                label: label.to_string(),
                message: "empty shader source".to_string(),
            });
        }
        Ok(self.insert(HeadlessObject::Shader { stage }))
    }

    fn delete_shader(&self, shader: GpuHandle) {
        self.remove(shader);
    }

    fn link_program(&self, label: &str, shaders: &[GpuHandle]) -> Result<GpuHandle, BackendError> {
        let mut has_vertex = false;
        for &shader in shaders {
            match self.shader_stage(shader) {
                Some(ShaderStage::Vertex) => has_vertex = true,
                Some(ShaderStage::Fragment) => {}
                None => return Err(BackendError::UnknownObject(shader)),
            }
        }

        if !has_vertex {
            return Err(BackendError::Link {
                label: label.to_string(),
                message: "no vertex stage attached".to_string(),
            });
        }

        Ok(self.insert(HeadlessObject::Program {
            shaders: shaders.to_vec(),
        }))
    }

    fn delete_program(&self, program: GpuHandle) {
        if self.active_program.get() == Some(program) {
            self.active_program.set(None);
        }
        self.remove(program);
    }

    fn use_program(&self, program: Option<GpuHandle>) {
        self.active_program.set(program);
    }

    fn active_program(&self) -> Option<GpuHandle> {
        self.active_program.get()
    }

    fn create_texture(&self, label: &str, data: &TextureData) -> Result<GpuHandle, BackendError> {
        if data.width == 0 || data.height == 0 {
            return Err(BackendError::Texture {
                label: label.to_string(),
                message: format!("zero-sized texture {}x{}", data.width, data.height),
            });
        }
        if data.pixels.len() != data.expected_len() {
            return Err(BackendError::Texture {
                label: label.to_string(),
                message: format!(
                    "expected {} bytes of pixel data, got {}",
                    data.expected_len(),
                    data.pixels.len()
                ),
            });
        }
        Ok(self.insert(HeadlessObject::Texture {
            width: data.width,
            height: data.height,
        }))
    }

    fn delete_texture(&self, texture: GpuHandle) {
        self.bound_textures
            .borrow_mut()
            .retain(|_, bound| *bound != texture);
        self.remove(texture);
    }

    fn bind_texture(&self, unit: u32, texture: Option<GpuHandle>) {
        let mut bound = self.bound_textures.borrow_mut();
        match texture {
            Some(texture) => {
                bound.insert(unit, texture);
            }
            None => {
                bound.remove(&unit);
            }
        }
    }

    fn create_buffer(
        &self,
        label: &str,
        description: &BufferDescription,
    ) -> Result<GpuHandle, BackendError> {
        if description.contents.is_empty() {
            return Err(BackendError::Buffer {
                label: label.to_string(),
                message: "empty contents".to_string(),
            });
        }
        Ok(self.insert(HeadlessObject::Buffer {
            kind: description.kind,
            len: description.contents.len(),
        }))
    }

    fn delete_buffer(&self, buffer: GpuHandle) {
        self.bound_buffers
            .borrow_mut()
            .retain(|_, bound| *bound != buffer);
        self.remove(buffer);
    }

    fn bind_buffer(&self, kind: BufferKind, buffer: Option<GpuHandle>) {
        let mut bound = self.bound_buffers.borrow_mut();
        match buffer {
            Some(buffer) => {
                bound.insert(kind, buffer);
            }
            None => {
                bound.remove(&kind);
            }
        }
    }
}
