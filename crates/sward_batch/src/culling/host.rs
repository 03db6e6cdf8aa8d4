//! CPU evaluation of the chunk culling kernel.

use glam::{Mat4, Vec2, Vec3};
use tracing::trace;

use super::dispatch::{CullConstants, DispatchSize};
use super::Culler;
use crate::camera::Camera;
use crate::config::CullingSettings;
use crate::error::{BatchError, BatchResult};
use crate::partition::{Chunk, ChunkRecord};

/// Clip-space `w` below which a corner counts as behind the camera.
const W_EPSILON: f32 = 1e-5;

/// Visibility test for one chunk box, identical to the WGSL kernel.
///
/// The box is centered on `(center.x, 0, center.y)` with half extents
/// `extent`. It is visible when the camera sits inside it, when it
/// straddles the camera plane, or when its projected corners overlap
/// `[-screen, screen]` on X and Y and `[z_min, 1]` in depth.
#[must_use]
pub fn chunk_visible(
    view_projection: &Mat4,
    camera_position: Vec3,
    center: Vec2,
    extent: Vec3,
    screen: f32,
    z_min: f32,
) -> bool {
    let center = Vec3::new(center.x, 0.0, center.y);
    if (camera_position - center).abs().cmple(extent).all() {
        return true;
    }

    let mut ndc_min = Vec3::splat(f32::MAX);
    let mut ndc_max = Vec3::splat(f32::MIN);
    let mut in_front = 0;
    for corner in 0..8u32 {
        let sign = Vec3::new(
            if corner & 1 != 0 { 1.0 } else { -1.0 },
            if corner & 2 != 0 { 1.0 } else { -1.0 },
            if corner & 4 != 0 { 1.0 } else { -1.0 },
        );
        let clip = *view_projection * (center + extent * sign).extend(1.0);
        if clip.w > W_EPSILON {
            let ndc = clip.truncate() / clip.w;
            ndc_min = ndc_min.min(ndc);
            ndc_max = ndc_max.max(ndc);
            in_front += 1;
        }
    }

    match in_front {
        0 => false,
        8 => {
            ndc_max.x >= -screen
                && ndc_min.x <= screen
                && ndc_max.y >= -screen
                && ndc_min.y <= screen
                && ndc_max.z >= z_min
                && ndc_min.z <= 1.0
        }
        _ => true,
    }
}

/// [`Culler`] that runs the kernel's test on the CPU.
///
/// Keeps its own copy of the uploaded records so the data flow matches
/// the GPU backend: flags only reach the caller's table on readback.
#[derive(Debug, Clone)]
pub struct HostCuller {
    settings: CullingSettings,
    records: Option<Vec<ChunkRecord>>,
    extent: Vec3,
    released: bool,
}

impl HostCuller {
    /// Creates a culler with the given kernel settings.
    #[must_use]
    pub const fn new(settings: CullingSettings) -> Self {
        Self {
            settings,
            records: None,
            extent: Vec3::ZERO,
            released: false,
        }
    }

    /// Chunk half extents last set.
    #[must_use]
    pub const fn bounds(&self) -> Vec3 {
        self.extent
    }

    fn check_live(&self) -> BatchResult<()> {
        if self.released {
            return Err(BatchError::use_after_dispose("host culler"));
        }
        Ok(())
    }
}

impl Culler for HostCuller {
    fn upload(&mut self, chunks: &[Chunk]) -> BatchResult<()> {
        self.check_live()?;
        let records = self.records.get_or_insert_with(Vec::new);
        records.clear();
        records.extend(chunks.iter().map(Chunk::to_record));
        Ok(())
    }

    fn set_bounds(&mut self, extent: Vec3) {
        self.extent = extent;
    }

    fn dispatch(&mut self, camera: &Camera) -> BatchResult<DispatchSize> {
        self.check_live()?;
        let records = self.records.as_mut().ok_or(BatchError::ChunksNotUploaded)?;
        let size = DispatchSize::for_items(
            records.len(),
            self.settings.group_size,
            self.settings.squared_dispatch,
        )?;
        let constants = CullConstants::new(camera, self.extent, &self.settings, records.len(), size);
        let view_projection = constants.view_projection();

        for record in records.iter_mut() {
            let visible = chunk_visible(
                &view_projection,
                camera.position,
                Vec2::new(record.position_x, record.position_z),
                self.extent,
                constants.screen_allowed_size,
                constants.z_allowed_size,
            );
            record.is_on_view = i32::from(visible);
        }
        trace!(chunks = records.len(), "host culling pass");
        Ok(size)
    }

    fn readback(&mut self, chunks: &mut [Chunk]) -> BatchResult<()> {
        self.check_live()?;
        let records = self.records.as_ref().ok_or(BatchError::ChunksNotUploaded)?;
        if records.len() != chunks.len() {
            return Err(BatchError::ChunkCountMismatch {
                expected: records.len(),
                found: chunks.len(),
            });
        }
        for (chunk, record) in chunks.iter_mut().zip(records) {
            chunk.visible = record.is_visible();
        }
        Ok(())
    }

    fn release(&mut self) -> BatchResult<()> {
        if self.released {
            return Err(BatchError::already_disposed("host culler"));
        }
        self.records = None;
        self.released = true;
        Ok(())
    }
}
