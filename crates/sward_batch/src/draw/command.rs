//! The per-frame draw submission handed to the host renderer.

use crate::culling::DispatchSize;
use crate::registry::{BatchHandle, MaterialHandle, MeshHandle};

/// Handles and size of a batch registered with the host renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderBatch {
    /// Shared mesh.
    pub mesh: MeshHandle,
    /// Shared material.
    pub material: MaterialHandle,
    /// Metadata table plus instance buffer.
    pub batch: BatchHandle,
    /// Instances in the packed buffer.
    pub instance_count: u32,
}

/// Draw command flags. Only [`DrawFlags::NONE`] is ever emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DrawFlags(pub u32);

impl DrawFlags {
    /// No special handling.
    pub const NONE: Self = Self(0);
}

/// One instanced draw over a slice of the visible-instance array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    /// First entry of the visible-instance array this command reads.
    pub visible_offset: u32,
    /// Entries read from the visible-instance array.
    pub visible_count: u32,
    /// Batch registration.
    pub batch: BatchHandle,
    /// Material to draw with.
    pub material: MaterialHandle,
    /// Mesh to draw.
    pub mesh: MeshHandle,
    /// Submesh of `mesh`.
    pub submesh_index: u16,
    /// Views the command is submitted to.
    pub split_visibility_mask: u8,
    /// Special handling.
    pub flags: DrawFlags,
    /// Sort key.
    pub sorting_position: i32,
}

impl DrawCommand {
    /// Full-visibility command drawing the first `visible_count` entries.
    #[must_use]
    pub const fn for_batch(batch: &RenderBatch, visible_count: u32) -> Self {
        Self {
            visible_offset: 0,
            visible_count,
            batch: batch.batch,
            material: batch.material,
            mesh: batch.mesh,
            submesh_index: 0,
            split_visibility_mask: 0xff,
            flags: DrawFlags::NONE,
            sorting_position: 0,
        }
    }
}

/// A run of draw commands sharing one filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    /// First command index.
    pub begin: u32,
    /// Commands in the range.
    pub count: u32,
    /// Rendering layers the range is drawn on.
    pub rendering_layer_mask: u32,
}

impl DrawRange {
    /// A range holding only the first command, on every layer.
    #[must_use]
    pub const fn single() -> Self {
        Self {
            begin: 0,
            count: 1,
            rendering_layer_mask: u32::MAX,
        }
    }
}

/// Per-frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Chunks in the table.
    pub total_chunks: u32,
    /// Chunks marked visible. Equals `total_chunks` with culling off.
    pub visible_chunks: u32,
    /// Entries in the visible-instance array.
    pub visible_instances: u32,
    /// Culling dispatch size, `None` with culling off.
    pub dispatch: Option<DispatchSize>,
}

/// Everything one frame produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutput<'a> {
    /// The single draw command.
    pub command: DrawCommand,
    /// The range covering `command`.
    pub range: DrawRange,
    /// Buffer slots to draw, in ascending order.
    pub visible_instances: &'a [u32],
    /// Counters.
    pub stats: FrameStats,
}
