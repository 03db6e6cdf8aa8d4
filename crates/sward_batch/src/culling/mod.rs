//! Chunk visibility culling.
//!
//! Each frame the chunk table is uploaded, a compute kernel tests every
//! chunk's bounding box against the camera, and the visibility flags are
//! read back into the host table.
//!
//! Two backends implement [`Culler`]:
//!
//! - `CullingDispatcher` runs the WGSL kernel through wgpu (feature `gpu`).
//! - [`HostCuller`] evaluates the same test on the CPU, for headless runs
//!   and as the reference the GPU kernel is checked against.

mod dispatch;
#[cfg(feature = "gpu")]
mod gpu;
mod host;
mod kernel;

pub use dispatch::{CullConstants, DispatchSize};
#[cfg(feature = "gpu")]
pub use gpu::CullingDispatcher;
pub use host::{chunk_visible, HostCuller};
pub use kernel::kernel_source;

use glam::Vec3;

use crate::camera::Camera;
use crate::error::BatchResult;
use crate::partition::Chunk;

/// A backend that decides which chunks the camera can see.
///
/// Calls follow `upload`, `dispatch`, `readback` once per frame.
/// `set_bounds` is called whenever the chunk grid changes.
pub trait Culler {
    /// Copies the chunk table into the backend's chunk buffer.
    ///
    /// The buffer is reused across frames and only reallocated when the
    /// chunk count changes.
    ///
    /// # Errors
    ///
    /// Fails after [`Culler::release`].
    fn upload(&mut self, chunks: &[Chunk]) -> BatchResult<()>;

    /// Sets the half extents of every chunk's bounding box.
    fn set_bounds(&mut self, extent: Vec3);

    /// Runs the visibility test for `camera`.
    ///
    /// # Errors
    ///
    /// Fails when nothing was uploaded or after release.
    fn dispatch(&mut self, camera: &Camera) -> BatchResult<DispatchSize>;

    /// Writes the visibility flags of the last dispatch into `chunks`.
    ///
    /// Blocks until the dispatch has completed.
    ///
    /// # Errors
    ///
    /// Fails when `chunks` does not match the uploaded table.
    fn readback(&mut self, chunks: &mut [Chunk]) -> BatchResult<()>;

    /// Frees the chunk buffer. A second call is an error.
    ///
    /// # Errors
    ///
    /// [`crate::BatchError::AlreadyDisposed`] on a second call.
    fn release(&mut self) -> BatchResult<()>;
}
