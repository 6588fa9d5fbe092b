/// Meshes and mesh models
///
/// A [`Mesh`] owns device-local vertex and index buffers filled once through a
/// staging upload. A [`MeshModel`] groups the submeshes of one imported model
/// under a shared model transform.

use std::sync::Arc;
use glam::Mat4;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, BufferUsage, GraphicsDevice, MemoryLocation};
use crate::resource::{create_buffer_with_data, TextureId, Vertex};

// ===== MESH =====

/// One drawable unit: immutable geometry plus a texture slot
pub struct Mesh {
    vertex_buffer: Option<Arc<dyn Buffer>>,
    index_buffer: Option<Arc<dyn Buffer>>,
    vertex_count: u32,
    index_count: u32,
    texture_id: TextureId,
}

impl Mesh {
    /// Upload `vertices` and `indices` into device-local buffers
    pub fn new(
        device: &dyn GraphicsDevice,
        vertices: &[Vertex],
        indices: &[u32],
        texture_id: TextureId,
    ) -> Result<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(Error::InvalidResource("mesh needs vertices and indices".to_string()));
        }
        if let Some(index) = indices.iter().find(|i| **i as usize >= vertices.len()) {
            return Err(Error::InvalidResource(format!(
                "index {} out of range for {} vertices",
                index,
                vertices.len()
            )));
        }

        let vertex_buffer = create_buffer_with_data(
            device,
            BufferUsage::Vertex,
            MemoryLocation::GpuOnly,
            bytemuck::cast_slice(vertices),
        )?;
        let index_buffer = create_buffer_with_data(
            device,
            BufferUsage::Index,
            MemoryLocation::GpuOnly,
            bytemuck::cast_slice(indices),
        )?;

        Ok(Self {
            vertex_buffer: Some(vertex_buffer),
            index_buffer: Some(index_buffer),
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
            texture_id,
        })
    }

    /// Vertex buffer; `InvalidResource` once destroyed
    pub fn vertex_buffer(&self) -> Result<&Arc<dyn Buffer>> {
        self.vertex_buffer
            .as_ref()
            .ok_or_else(|| Error::InvalidResource("mesh buffers already destroyed".to_string()))
    }

    /// Index buffer of `u32` indices; `InvalidResource` once destroyed
    pub fn index_buffer(&self) -> Result<&Arc<dyn Buffer>> {
        self.index_buffer
            .as_ref()
            .ok_or_else(|| Error::InvalidResource("mesh buffers already destroyed".to_string()))
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn texture_id(&self) -> TextureId {
        self.texture_id
    }

    /// Release the buffers; the mesh stays as an empty shell
    pub fn destroy_buffers(&mut self) {
        self.vertex_buffer = None;
        self.index_buffer = None;
    }

    pub fn is_destroyed(&self) -> bool {
        self.vertex_buffer.is_none()
    }
}

// ===== MESH MODEL =====

/// Submeshes sharing one model transform
pub struct MeshModel {
    meshes: Vec<Mesh>,
    transform: Mat4,
}

impl MeshModel {
    pub fn new(meshes: Vec<Mesh>) -> Self {
        Self { meshes, transform: Mat4::IDENTITY }
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Mesh at `index`; `InvalidResource` when out of range
    pub fn mesh(&self, index: usize) -> Result<&Mesh> {
        self.meshes.get(index).ok_or_else(|| {
            Error::InvalidResource(format!("mesh {} out of range ({} meshes)", index, self.meshes.len()))
        })
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Release every submesh's buffers, then the model itself
    ///
    /// The device must no longer be using the buffers.
    pub fn destroy(mut self) {
        self.destroy_meshes();
    }

    fn destroy_meshes(&mut self) {
        for mesh in &mut self.meshes {
            mesh.destroy_buffers();
        }
        self.meshes.clear();
    }
}

impl Drop for MeshModel {
    fn drop(&mut self) {
        self.destroy_meshes();
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
