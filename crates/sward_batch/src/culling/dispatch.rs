//! Dispatch sizing and kernel constants for the chunk culling pass.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use tracing::{debug, warn};

use crate::camera::Camera;
use crate::config::CullingSettings;
use crate::error::{BatchError, BatchResult};

/// Workgroup counts passed to the compute dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSize {
    /// Groups along X.
    pub x: u32,
    /// Groups along Y.
    pub y: u32,
    /// Groups along Z.
    pub z: u32,
}

impl DispatchSize {
    /// Groups needed to cover `count` items with `group_size` threads each.
    ///
    /// The result is never zero: an empty dispatch would silently skip
    /// culling for the frame. In squared mode the same count is used on X
    /// and Y, matching kernels that address chunks by 2D thread id.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidGroupSize`] for a zero group size.
    pub fn for_items(count: usize, group_size: u32, squared: bool) -> BatchResult<Self> {
        if group_size == 0 {
            return Err(BatchError::InvalidGroupSize(group_size));
        }
        let mut groups = count.div_ceil(group_size as usize) as u32;
        if groups == 0 {
            warn!(count, group_size, "empty culling dispatch clamped to one group");
            groups = 1;
        }
        let size = Self {
            x: groups,
            y: if squared { groups } else { 1 },
            z: 1,
        };
        debug!(?size, count, group_size, squared, "sized culling dispatch");
        Ok(size)
    }

    /// Total workgroups.
    #[must_use]
    pub const fn groups(&self) -> u32 {
        self.x * self.y * self.z
    }
}

/// Uniform block read by the culling kernel. 112 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CullConstants {
    /// `projection * world_to_local`, column-major.
    pub view_projection: [[f32; 4]; 4],
    /// Camera position, `w` unused.
    pub camera_position: [f32; 4],
    /// Chunk half-width, vertical extent, half-depth; `w` unused.
    pub chunk_bounds: [f32; 4],
    /// Screen-space margin around NDC.
    pub screen_allowed_size: f32,
    /// Lowest accepted NDC depth.
    pub z_allowed_size: f32,
    /// Chunks in the buffer.
    pub chunk_count: u32,
    /// Threads per dispatch row, for 2D thread-id addressing.
    pub grid_width: u32,
}

impl CullConstants {
    /// Builds the constants for one frame.
    #[must_use]
    pub fn new(
        camera: &Camera,
        chunk_bounds: Vec3,
        settings: &CullingSettings,
        chunk_count: usize,
        dispatch: DispatchSize,
    ) -> Self {
        Self {
            view_projection: camera.view_projection().to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).to_array(),
            chunk_bounds: chunk_bounds.extend(0.0).to_array(),
            screen_allowed_size: settings.screen_allowed_size,
            z_allowed_size: settings.z_allowed_size,
            chunk_count: chunk_count as u32,
            grid_width: dispatch.x * settings.group_size,
        }
    }

    /// View-projection as a matrix.
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_division() {
        let size = DispatchSize::for_items(640, 64, false).unwrap();
        assert_eq!(size, DispatchSize { x: 10, y: 1, z: 1 });
    }

    #[test]
    fn test_partial_group_rounds_up() {
        assert_eq!(DispatchSize::for_items(63, 64, false).unwrap().x, 1);
        assert_eq!(DispatchSize::for_items(65, 64, false).unwrap().x, 2);
    }

    #[test]
    fn test_empty_dispatch_is_clamped() {
        assert_eq!(DispatchSize::for_items(0, 64, false).unwrap().groups(), 1);
    }

    #[test]
    fn test_squared_dispatch() {
        let size = DispatchSize::for_items(256, 64, true).unwrap();
        assert_eq!(size, DispatchSize { x: 4, y: 4, z: 1 });
    }

    #[test]
    fn test_zero_group_size() {
        assert_eq!(
            DispatchSize::for_items(10, 0, false),
            Err(BatchError::InvalidGroupSize(0))
        );
    }

    #[test]
    fn test_constants_layout() {
        assert_eq!(std::mem::size_of::<CullConstants>(), 112);
        assert_eq!(std::mem::size_of::<CullConstants>() % 16, 0);
    }
}
