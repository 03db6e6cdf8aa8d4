//! Shared instance buffer: packed matrices, property layout and upload.
//!
//! ## Key Concepts
//!
//! - **Packed matrix**: 12-float affine transform, the constant row dropped
//! - **Property**: one per-instance array, packed back to back after a
//!   reserved header
//! - **Metadata**: `flag | byte_address` per property, registered with the
//!   buffer handle

#[cfg(feature = "gpu")]
mod gpu_buffer;
mod layout;
mod packed_matrix;
mod packer;

#[cfg(feature = "gpu")]
pub use gpu_buffer::GpuInstanceBuffer;
pub use layout::{
    align16, buffer_count_for_instances, property_addresses, BufferLayout, MetadataValue,
    ShaderPropertyDescriptor, PER_INSTANCE_FLAG,
};
pub use packed_matrix::{pack_matrices, PackedMatrix};
pub use packer::{InstanceBufferPacker, PackedInstanceBuffer};
