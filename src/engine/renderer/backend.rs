// Rendering backend contract
//
// Assets and buffers talk to the GPU only through this trait. Objects are
// referred to by opaque non-zero handles handed out by the backend.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::str::FromStr;

/// Shared, single-threaded reference to the active backend
pub type SharedBackend = Rc<dyn RenderBackend>;

/// Opaque handle to a backend object (shader, program, texture or buffer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(NonZeroU32);

impl GpuHandle {
    /// Get the raw handle value
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for GpuHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out process-unique, monotonically increasing handles
#[derive(Debug)]
pub struct HandleAllocator {
    next: Cell<u32>,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self { next: Cell::new(1) }
    }

    /// Allocate the next handle
    pub fn allocate(&self) -> GpuHandle {
        let value = self.next.get();
        self.next.set(value.wrapping_add(1).max(1));
        // `next` starts at 1 and skips 0 on wrap-around.
        GpuHandle(NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN))
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Programmable pipeline stage of a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

impl FromStr for ShaderStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertex" | "vert" => Ok(ShaderStage::Vertex),
            "fragment" | "frag" | "pixel" => Ok(ShaderStage::Fragment),
            other => Err(format!("unknown shader stage '{}'", other)),
        }
    }
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(FilterMode::Nearest),
            "linear" => Ok(FilterMode::Linear),
            other => Err(format!("unknown filter mode '{}'", other)),
        }
    }
}

/// Texture addressing outside the [0, 1] range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
}

impl FromStr for WrapMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(WrapMode::Clamp),
            "repeat" => Ok(WrapMode::Repeat),
            other => Err(format!("unknown wrap mode '{}'", other)),
        }
    }
}

/// Decoded RGBA8 pixels ready for upload
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub filtering: FilterMode,
    pub wrapping: WrapMode,
}

impl TextureData {
    /// A single pixel of the given colour
    pub fn solid(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: color.to_vec(),
            filtering: FilterMode::Nearest,
            wrapping: WrapMode::Clamp,
        }
    }

    /// Number of bytes the pixel data must hold
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// What a buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Whether buffer contents are expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Static,
    Dynamic,
}

/// Everything needed to create a buffer
#[derive(Debug, Clone)]
pub struct BufferDescription {
    pub kind: BufferKind,
    pub usage: BufferUsage,
    /// Size of one element in bytes
    pub stride: u32,
    pub contents: Vec<u8>,
}

impl BufferDescription {
    /// Number of whole elements in the contents
    pub fn element_count(&self) -> u32 {
        if self.stride == 0 {
            return 0;
        }
        (self.contents.len() / self.stride as usize) as u32
    }
}

/// Errors reported by a rendering backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Shader {label} failed to compile: {message}")]
    Compile { label: String, message: String },

    #[error("Program {label} failed to link: {message}")]
    Link { label: String, message: String },

    #[error("Invalid texture {label}: {message}")]
    Texture { label: String, message: String },

    #[error("Invalid buffer {label}: {message}")]
    Buffer { label: String, message: String },

    #[error("Unknown GPU object {0}")]
    UnknownObject(GpuHandle),
}

/// Generate/delete/bind primitives for GPU objects
///
/// Every `create_*` call returns a fresh handle that is unique for the
/// lifetime of the process. `delete_*` on an unknown handle is ignored.
pub trait RenderBackend {
    /// Human readable backend name for diagnostics
    fn name(&self) -> &str;

    fn create_shader(
        &self,
        stage: ShaderStage,
        label: &str,
        source: &str,
    ) -> Result<GpuHandle, BackendError>;
    fn delete_shader(&self, shader: GpuHandle);

    /// Link compiled shaders into a program
    fn link_program(&self, label: &str, shaders: &[GpuHandle]) -> Result<GpuHandle, BackendError>;
    fn delete_program(&self, program: GpuHandle);
    /// Make a program current, or clear it with `None`
    fn use_program(&self, program: Option<GpuHandle>);
    fn active_program(&self) -> Option<GpuHandle>;

    fn create_texture(&self, label: &str, data: &TextureData) -> Result<GpuHandle, BackendError>;
    fn delete_texture(&self, texture: GpuHandle);
    fn bind_texture(&self, unit: u32, texture: Option<GpuHandle>);

    fn create_buffer(
        &self,
        label: &str,
        description: &BufferDescription,
    ) -> Result<GpuHandle, BackendError>;
    fn delete_buffer(&self, buffer: GpuHandle);
    fn bind_buffer(&self, kind: BufferKind, buffer: Option<GpuHandle>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let allocator = HandleAllocator::new();
        let a = allocator.allocate();
        let b = allocator.allocate();
        let c = allocator.allocate();

        assert_eq!(a.get(), 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_stage_parsing() {
        assert_eq!("Vertex".parse::<ShaderStage>(), Ok(ShaderStage::Vertex));
        assert_eq!("frag".parse::<ShaderStage>(), Ok(ShaderStage::Fragment));
        assert!("geometry".parse::<ShaderStage>().is_err());
    }

    #[test]
    fn test_sampler_mode_parsing() {
        assert_eq!("NEAREST".parse::<FilterMode>(), Ok(FilterMode::Nearest));
        assert_eq!("repeat".parse::<WrapMode>(), Ok(WrapMode::Repeat));
        assert!("mirror".parse::<WrapMode>().is_err());
    }

    #[test]
    fn test_solid_texture_data() {
        let data = TextureData::solid([255, 255, 255, 255]);
        assert_eq!(data.expected_len(), data.pixels.len());
    }

    #[test]
    fn test_buffer_element_count() {
        let description = BufferDescription {
            kind: BufferKind::Vertex,
            usage: BufferUsage::Static,
            stride: 16,
            contents: vec![0; 96],
        };
        assert_eq!(description.element_count(), 6);
    }
}
