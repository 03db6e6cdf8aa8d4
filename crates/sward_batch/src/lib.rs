//! # SWARD Batch
//!
//! Draws a very large number of identical instances (grass blades over a
//! terrain) from one shared instance buffer, culling whole chunks of them on
//! the GPU before the draw.
//!
//! ## Pipeline
//!
//! ```text
//! positions ─► ChunkPartitioner ─► InstanceBufferPacker ─► buffer + metadata
//!                    │ chunk table
//!                    ▼ (every frame)
//!              Culler: upload → dispatch → readback
//!                    │ chunk visibility
//!                    ▼
//!              DrawCommandAssembler ─► visible instances + one DrawCommand
//! ```
//!
//! [`Batch`] owns all of it. [`Batch::rebuild`] replaces partition and buffer
//! together; [`Batch::on_frame`] runs the per-frame half; [`Batch::dispose`]
//! releases everything the batch registered.
//!
//! ## Rules
//!
//! - Chunks own contiguous runs of the buffer, in ascending id order
//! - Every per-instance array follows that order
//! - Culling runs on chunks, never on single instances

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod batch;
pub mod camera;
pub mod config;
pub mod culling;
pub mod draw;
pub mod error;
pub mod instancing;
pub mod partition;
pub mod registry;

pub use batch::Batch;
#[cfg(feature = "gpu")]
pub use batch::GpuContext;
pub use camera::Camera;
pub use config::{BatchConfig, BufferSettings, BufferTarget, ChunkPartitionSettings, CullingSettings};
pub use culling::{Culler, DispatchSize, HostCuller};
#[cfg(feature = "gpu")]
pub use culling::CullingDispatcher;
pub use draw::{DrawCommand, DrawCommandAssembler, DrawRange, FrameOutput, FrameStats, RenderBatch};
pub use error::{BatchError, BatchResult};
pub use instancing::{InstanceBufferPacker, PackedInstanceBuffer, PackedMatrix, PER_INSTANCE_FLAG};
pub use partition::{Chunk, ChunkPartitioner, Partition, Partitioner};
pub use registry::RenderRegistry;
