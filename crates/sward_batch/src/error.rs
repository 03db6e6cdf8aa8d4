//! # Batch Error Types
//!
//! All errors that can occur while partitioning, packing, culling or
//! disposing a batch. None of them are retried: configuration and resource
//! errors are programmer errors and surface immediately.

use thiserror::Error;

/// Errors that can occur in the batch pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// The grid would hold more chunks than a 16-bit signed id can address.
    #[error("chunk count {requested} exceeds the maximum of {max}")]
    ChunkCountOutOfRange {
        /// Chunks the settings asked for.
        requested: usize,
        /// Largest supported chunk count.
        max: usize,
    },

    /// A grid needs at least one chunk per line.
    #[error("chunks per line must be at least 1")]
    InvalidChunksPerLine,

    /// Terrain extent must be finite and positive on both axes.
    #[error("invalid terrain size {x} x {y}")]
    InvalidTerrainSize {
        /// Extent along X.
        x: String,
        /// Extent along Z.
        y: String,
    },

    /// Compute group size of zero would divide by zero in dispatch sizing.
    #[error("invalid compute group size {0}")]
    InvalidGroupSize(u32),

    /// Buffer stride must be a non-zero multiple of 4 bytes.
    #[error("invalid buffer stride {0}")]
    InvalidStride(u32),

    /// A property's data array does not hold one element per instance.
    #[error("property `{name}` has {found} elements, expected {expected}")]
    PropertyLengthMismatch {
        /// Property name.
        name: String,
        /// Instance count of the batch.
        expected: usize,
        /// Elements supplied.
        found: usize,
    },

    /// Element-indexed upload cannot land on a byte address that is not a
    /// multiple of the element size.
    #[error("property `{name}` at byte {address} is not aligned to its {element_size}-byte elements")]
    MisalignedProperty {
        /// Property name.
        name: String,
        /// Assigned byte address.
        address: u64,
        /// Element size in bytes.
        element_size: usize,
    },

    /// Rounding the buffer down to 16 bytes clipped real instance data.
    #[error("instance buffer holds {available} bytes but the layout needs {required}")]
    BufferTooSmall {
        /// Bytes needed by the last property's end.
        required: u64,
        /// Bytes the buffer actually holds.
        available: u64,
    },

    /// A byte address reaches into the metadata flag bits.
    #[error("byte address {address} overlaps the metadata flag bits")]
    MetadataOverflow {
        /// Offending address.
        address: u64,
    },

    /// A resource was released twice.
    #[error("{resource} was already disposed")]
    AlreadyDisposed {
        /// Description of the resource.
        resource: String,
    },

    /// A resource was used after it was released.
    #[error("{resource} used after dispose")]
    UseAfterDispose {
        /// Description of the resource.
        resource: String,
    },

    /// A handle that the registry never issued.
    #[error("unknown handle: {resource}")]
    UnknownHandle {
        /// Description of the resource.
        resource: String,
    },

    /// The host chunk table and the GPU chunk buffer disagree in length.
    #[error("chunk table has {found} chunks, GPU buffer holds {expected}")]
    ChunkCountMismatch {
        /// Chunks in the GPU buffer.
        expected: usize,
        /// Chunks in the host table.
        found: usize,
    },

    /// A frame was requested before the first rebuild.
    #[error("batch has not been built")]
    BatchNotBuilt,

    /// Culling was dispatched before any chunk table was uploaded.
    #[error("no chunk table uploaded")]
    ChunksNotUploaded,

    /// Mapping a GPU buffer for readback failed.
    #[error("buffer mapping failed: {0}")]
    BufferMap(String),

    /// No GPU adapter matched the request.
    #[error("no suitable GPU adapter")]
    NoAdapter,

    /// The adapter refused to create a device.
    #[error("device request failed: {0}")]
    DeviceRequest(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BatchError {
    /// Shorthand for an already-disposed resource.
    pub(crate) fn already_disposed(resource: impl Into<String>) -> Self {
        Self::AlreadyDisposed {
            resource: resource.into(),
        }
    }

    /// Shorthand for a use-after-dispose.
    pub(crate) fn use_after_dispose(resource: impl Into<String>) -> Self {
        Self::UseAfterDispose {
            resource: resource.into(),
        }
    }
}

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;
