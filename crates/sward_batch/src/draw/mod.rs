//! Per-frame draw assembly.
//!
//! Culling works on whole chunks. Because chunks own contiguous runs of the
//! packed buffer, the visible set is a concatenation of index ranges and the
//! frame always ends in exactly one draw command over that set.

mod assembler;
mod command;

pub use assembler::{compact_visible, identity_indices, DrawCommandAssembler, FrameState};
pub use command::{DrawCommand, DrawFlags, DrawRange, FrameOutput, FrameStats, RenderBatch};
