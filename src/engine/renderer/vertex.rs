// Vertex structure for 2D quad rendering

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// Vertex with a 2D position and texture coordinates
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex2D {
    /// Position in clip space
    pub position: [f32; 2],
    /// Texture coordinates (UV)
    pub tex_coord: [f32; 2],
}

impl Vertex2D {
    /// Size of one vertex in bytes
    pub const STRIDE: u32 = std::mem::size_of::<Vertex2D>() as u32;

    /// Create a new vertex
    pub fn new(position: Vec2, tex_coord: Vec2) -> Self {
        Self {
            position: position.to_array(),
            tex_coord: tex_coord.to_array(),
        }
    }

    /// Get the vertex buffer layout descriptor
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex2D>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // Tex Coords
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }

    /// Two triangles covering a centred square of the given half extent
    pub fn quad(half_extent: f32) -> [Vertex2D; 6] {
        let min = -half_extent;
        let max = half_extent;
        let bottom_left = Self::new(Vec2::new(min, min), Vec2::new(0.0, 1.0));
        let bottom_right = Self::new(Vec2::new(max, min), Vec2::new(1.0, 1.0));
        let top_right = Self::new(Vec2::new(max, max), Vec2::new(1.0, 0.0));
        let top_left = Self::new(Vec2::new(min, max), Vec2::new(0.0, 0.0));

        [
            bottom_left,
            bottom_right,
            top_right,
            bottom_left,
            top_right,
            top_left,
        ]
    }
}
