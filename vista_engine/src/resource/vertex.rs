/// Vertex format shared by every mesh

use bytemuck::{Pod, Zeroable};
use crate::graphics_device::{VertexAttribute, VertexFormat, VertexLayout};

/// Interleaved vertex: position, color, texture coordinate
///
/// Bound at binding 0 with locations 0, 1 and 2.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const fn new(pos: [f32; 3], color: [f32; 3], uv: [f32; 2]) -> Self {
        Self { pos, color, uv }
    }

    /// Layout consumed by the scene pipeline
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<Vertex>() as u32,
            attributes: vec![
                VertexAttribute { location: 0, format: VertexFormat::Float3, offset: 0 },
                VertexAttribute { location: 1, format: VertexFormat::Float3, offset: 12 },
                VertexAttribute { location: 2, format: VertexFormat::Float2, offset: 24 },
            ],
        }
    }
}

#[cfg(test)]
#[path = "vertex_tests.rs"]
mod tests;
