// GPU buffer wrapper
//
// Buffers are not cached assets: whoever creates one owns it, and the backend
// object is released when the wrapper is dropped.

use super::backend::{
    BackendError, BufferDescription, BufferKind, BufferUsage, GpuHandle, SharedBackend,
};
use super::vertex::Vertex2D;
use std::rc::Rc;

impl BufferDescription {
    /// Describe a vertex buffer holding `vertices`
    pub fn vertices(vertices: &[Vertex2D], usage: BufferUsage) -> Self {
        Self {
            kind: BufferKind::Vertex,
            usage,
            stride: Vertex2D::STRIDE,
            contents: bytemuck::cast_slice(vertices).to_vec(),
        }
    }
}

/// A backend buffer released on drop
pub struct Buffer {
    handle: GpuHandle,
    kind: BufferKind,
    element_count: u32,
    backend: SharedBackend,
}

impl Buffer {
    /// Create and fill a buffer
    pub fn new(
        backend: &SharedBackend,
        label: &str,
        description: &BufferDescription,
    ) -> Result<Self, BackendError> {
        let handle = backend.create_buffer(label, description)?;
        Ok(Self {
            handle,
            kind: description.kind,
            element_count: description.element_count(),
            backend: Rc::clone(backend),
        })
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    /// Bind this buffer for its kind
    pub fn bind(&self) {
        self.backend.bind_buffer(self.kind, Some(self.handle));
    }

    /// Clear the binding for this buffer's kind
    pub fn unbind(&self) {
        self.backend.bind_buffer(self.kind, None);
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.backend.delete_buffer(self.handle);
    }
}
