//! Compaction of chunk visibility into the visible-instance array.

use tracing::trace;

use super::command::{DrawCommand, DrawRange, RenderBatch};
use crate::partition::Chunk;

/// Where the assembler is within the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameState {
    /// Between frames.
    #[default]
    Idle,
    /// Culling dispatched, flags not yet read back.
    CullingRequested,
    /// Chunk flags refreshed and compacted.
    VisibilityReady,
    /// Draw command produced.
    CommandBuilt,
}

/// Writes the buffer slots of every visible chunk into `out`.
///
/// Chunks are walked in table order, which is their order in the packed
/// buffer. Every chunk advances the buffer cursor; only visible ones are
/// written. Returns the number of entries written.
pub fn compact_visible(chunks: &[Chunk], out: &mut Vec<u32>) -> u32 {
    out.clear();
    let mut buffer_cursor = 0u32;
    for chunk in chunks {
        if chunk.visible {
            out.extend(buffer_cursor..buffer_cursor + chunk.instance_count);
        }
        buffer_cursor += chunk.instance_count;
    }
    out.len() as u32
}

/// Writes `0..num_instances` into `out`.
pub fn identity_indices(num_instances: u32, out: &mut Vec<u32>) -> u32 {
    out.clear();
    out.extend(0..num_instances);
    num_instances
}

/// Builds the frame's draw command from chunk visibility.
///
/// The visible-instance array is kept between frames so steady-state
/// frames do not allocate.
#[derive(Debug, Clone, Default)]
pub struct DrawCommandAssembler {
    visible: Vec<u32>,
    state: FrameState,
}

impl DrawCommandAssembler {
    /// Creates an idle assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current frame state.
    #[must_use]
    pub const fn state(&self) -> FrameState {
        self.state
    }

    /// Visible-instance array of the last frame.
    #[must_use]
    pub fn visible_instances(&self) -> &[u32] {
        &self.visible
    }

    /// Starts a frame.
    pub fn begin_frame(&mut self) {
        self.transition(FrameState::Idle);
    }

    /// Records that culling was dispatched for this frame.
    pub fn culling_requested(&mut self) {
        self.transition(FrameState::CullingRequested);
    }

    /// Compacts freshly read-back chunk flags. Returns the visible count.
    pub fn visibility_ready(&mut self, chunks: &[Chunk]) -> u32 {
        let count = compact_visible(chunks, &mut self.visible);
        self.transition(FrameState::VisibilityReady);
        count
    }

    /// Marks every instance visible, skipping the culling states.
    pub fn all_visible(&mut self, num_instances: u32) -> u32 {
        identity_indices(num_instances, &mut self.visible)
    }

    /// Produces the single command and range for `batch`.
    pub fn build(&mut self, batch: &RenderBatch) -> (DrawCommand, DrawRange) {
        let command = DrawCommand::for_batch(batch, self.visible.len() as u32);
        self.transition(FrameState::CommandBuilt);
        (command, DrawRange::single())
    }

    fn transition(&mut self, next: FrameState) {
        trace!(from = ?self.state, to = ?next, "frame state");
        self.state = next;
    }
}
