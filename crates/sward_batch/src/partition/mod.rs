//! Spatial partitioning of instances into chunks.
//!
//! Chunks serve two purposes: they fix the ordering of instances in the
//! packed buffer, and they coarsen culling to whole buckets.

mod chunk;
mod partitioner;

pub use chunk::{Chunk, ChunkRecord};
pub use partitioner::{ChunkPartitioner, Partition, Partitioner, MAX_CHUNKS};
