/// Camera: view and projection matrices fed to the scene pipeline
///
/// The camera mostly stores what the caller sets. The one thing it computes
/// is a perspective projection, when one was requested, so the renderer can
/// follow the presentable chain's aspect ratio after a rebuild.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Perspective parameters kept to recompute the projection on resize
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perspective {
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Perspective {
    fn default() -> Self {
        Self { fov_y: 45f32.to_radians(), near: 0.1, far: 100.0 }
    }
}

/// Uniform block at set 0, binding 0 of the scene shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

/// Low-level camera
#[derive(Debug, Clone)]
pub struct Camera {
    view_matrix: Mat4,
    projection_matrix: Mat4,
    perspective: Option<Perspective>,
}

impl Camera {
    /// Camera with explicit matrices; `set_aspect` leaves them alone
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self { view_matrix: view, projection_matrix: projection, perspective: None }
    }

    /// Camera with a perspective projection that follows the aspect ratio
    pub fn perspective(view: Mat4, perspective: Perspective, aspect: f32) -> Self {
        Self {
            view_matrix: view,
            projection_matrix: vulkan_perspective(perspective, aspect),
            perspective: Some(perspective),
        }
    }

    /// Camera at (0, 0, 2.5) looking at the origin, Y up
    pub fn looking_at_origin(aspect: f32) -> Self {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 2.5), Vec3::ZERO, Vec3::Y);
        Self::perspective(view, Perspective::default(), aspect)
    }

    // ===== GETTERS =====

    /// View matrix (inverse of the camera's world transform).
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    /// Projection matrix, in Vulkan clip space.
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    pub fn perspective_params(&self) -> Option<Perspective> {
        self.perspective
    }

    /// Contents of the camera uniform buffer
    pub fn uniform(&self) -> CameraUniform {
        CameraUniform {
            projection: self.projection_matrix.to_cols_array_2d(),
            view: self.view_matrix.to_cols_array_2d(),
        }
    }

    // ===== SETTERS =====

    pub fn set_view(&mut self, matrix: Mat4) {
        self.view_matrix = matrix;
    }

    /// Set an explicit projection; drops the perspective parameters.
    pub fn set_projection(&mut self, matrix: Mat4) {
        self.projection_matrix = matrix;
        self.perspective = None;
    }

    /// Recompute a perspective projection for a new aspect ratio.
    pub fn set_aspect(&mut self, aspect: f32) {
        if let Some(perspective) = self.perspective {
            self.projection_matrix = vulkan_perspective(perspective, aspect);
        }
    }
}

/// Right-handed perspective with Y pointing down, depth 0..1
fn vulkan_perspective(perspective: Perspective, aspect: f32) -> Mat4 {
    let mut projection = Mat4::perspective_rh(perspective.fov_y, aspect, perspective.near, perspective.far);
    projection.y_axis.y *= -1.0;
    projection
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
