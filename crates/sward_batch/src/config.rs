//! Batch configuration, loaded once at startup from TOML.
//!
//! ```toml
//! [partition]
//! chunks_per_line = 16
//! terrain_size = [256.0, 256.0]
//! vertical_bound = 4.0
//!
//! [buffer]
//! stride = 4
//! free_space_bytes = 96
//! extra_bytes = 16
//! target = "raw"
//!
//! [culling]
//! enabled = true
//! kernel = "cull_chunks"
//! group_size = 64
//! squared_dispatch = false
//! ```

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, BatchResult};
use crate::partition::MAX_CHUNKS;

/// Screen-space tolerance used when no value is configured.
pub const DEFAULT_SCREEN_ALLOWED_SIZE: f32 = 1.25;
/// Near-plane tolerance used when no value is configured.
pub const DEFAULT_Z_ALLOWED_SIZE: f32 = -1.0;
/// Reserved bytes at the head of the instance buffer.
pub const DEFAULT_FREE_SPACE_BYTES: u32 = 96;
/// Tail headroom absorbing the 16-byte round-down.
pub const DEFAULT_EXTRA_BYTES: u32 = 16;

/// Grid settings for one partition run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkPartitionSettings {
    /// Chunks along each side of the square grid.
    pub chunks_per_line: u32,
    /// Terrain extent on X and Z.
    pub terrain_size: Vec2,
    /// Vertical half-extent of every chunk's bounding box.
    pub vertical_bound: f32,
}

impl ChunkPartitionSettings {
    /// Creates partition settings.
    #[must_use]
    pub const fn new(chunks_per_line: u32, terrain_size: Vec2, vertical_bound: f32) -> Self {
        Self {
            chunks_per_line,
            terrain_size,
            vertical_bound,
        }
    }

    /// Total chunks in the grid.
    #[must_use]
    pub const fn chunk_count(&self) -> usize {
        self.chunks_per_line as usize * self.chunks_per_line as usize
    }

    /// Rejects grids that cannot be addressed or that have no area.
    ///
    /// # Errors
    ///
    /// Returns an error for zero chunks per line, more than [`MAX_CHUNKS`]
    /// chunks, or a non-positive terrain size.
    pub fn validate(&self) -> BatchResult<()> {
        if self.chunks_per_line == 0 {
            return Err(BatchError::InvalidChunksPerLine);
        }
        let requested = self.chunk_count();
        if requested > MAX_CHUNKS {
            return Err(BatchError::ChunkCountOutOfRange {
                requested,
                max: MAX_CHUNKS,
            });
        }
        let size = self.terrain_size;
        if !(size.x.is_finite() && size.y.is_finite() && size.x > 0.0 && size.y > 0.0) {
            return Err(BatchError::InvalidTerrainSize {
                x: size.x.to_string(),
                y: size.y.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ChunkPartitionSettings {
    fn default() -> Self {
        Self::new(16, Vec2::splat(256.0), 4.0)
    }
}

/// Which kind of GPU buffer backs the instance data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferTarget {
    /// Raw byte-addressed storage buffer.
    #[default]
    Raw,
    /// Constant (uniform) buffer, for platforms without storage buffers.
    Constant,
}

/// Instance buffer sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Bytes per buffer element.
    pub stride: u32,
    /// Reserved bytes at the head of the buffer, before the first property.
    pub free_space_bytes: u32,
    /// Extra headroom added to the size before the 16-byte round-down, so
    /// the truncation never clips the last property.
    pub extra_bytes: u32,
    /// Buffer kind.
    pub target: BufferTarget,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            stride: 4,
            free_space_bytes: DEFAULT_FREE_SPACE_BYTES,
            extra_bytes: DEFAULT_EXTRA_BYTES,
            target: BufferTarget::Raw,
        }
    }
}

impl BufferSettings {
    /// Rejects strides that cannot address 32-bit words.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidStride`] for a zero or unaligned stride.
    pub fn validate(&self) -> BatchResult<()> {
        if self.stride == 0 || self.stride % 4 != 0 {
            return Err(BatchError::InvalidStride(self.stride));
        }
        Ok(())
    }
}

/// Culling kernel and dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingSettings {
    /// Whether chunks are culled at all. Disabled draws every instance.
    pub enabled: bool,
    /// Entry point of the culling kernel.
    pub kernel: String,
    /// Threads per workgroup along X.
    pub group_size: u32,
    /// Dispatch a square 2D grid instead of a 1D line.
    pub squared_dispatch: bool,
    /// Screen-space margin around normalized device coordinates.
    pub screen_allowed_size: f32,
    /// Lowest accepted NDC depth.
    pub z_allowed_size: f32,
}

impl Default for CullingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kernel: "cull_chunks".to_owned(),
            group_size: 64,
            squared_dispatch: false,
            screen_allowed_size: DEFAULT_SCREEN_ALLOWED_SIZE,
            z_allowed_size: DEFAULT_Z_ALLOWED_SIZE,
        }
    }
}

impl CullingSettings {
    /// Rejects a zero group size.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidGroupSize`].
    pub fn validate(&self) -> BatchResult<()> {
        if self.group_size == 0 {
            return Err(BatchError::InvalidGroupSize(self.group_size));
        }
        Ok(())
    }
}

/// Complete batch configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Chunk grid.
    pub partition: ChunkPartitionSettings,
    /// Instance buffer sizing.
    pub buffer: BufferSettings,
    /// Culling kernel and dispatch.
    pub culling: CullingSettings,
}

impl BatchConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Config`] on malformed TOML, or the validation
    /// error of the first invalid section.
    pub fn from_toml_str(text: &str) -> BatchResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| BatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> BatchResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BatchError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first section error found.
    pub fn validate(&self) -> BatchResult<()> {
        self.partition.validate()?;
        self.buffer.validate()?;
        self.culling.validate()
    }
}
