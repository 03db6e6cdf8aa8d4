//! The camera a frame is culled against.

use glam::{Mat4, Vec3};

/// Projection, view transform and world position of the active camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Clip-space projection, OpenGL depth convention (`z` in `[-1, 1]`).
    pub projection: Mat4,
    /// World-to-camera transform.
    pub world_to_local: Mat4,
    /// Camera position in world space.
    pub position: Vec3,
}

impl Camera {
    /// Perspective camera at `position` looking at `target`.
    #[must_use]
    pub fn look_at(
        position: Vec3,
        target: Vec3,
        fov_y_radians: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            projection: Mat4::perspective_rh_gl(fov_y_radians, aspect, near, far),
            world_to_local: Mat4::look_at_rh(position, target, Vec3::Y),
            position,
        }
    }

    /// `projection * world_to_local`.
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.world_to_local
    }
}
