//! Grid partitioning of instance positions.
//!
//! The partitioner splits the terrain's XZ extent into an N x N grid and
//! buckets every position into exactly one chunk. Buckets are concatenated in
//! ascending chunk id, and that concatenation is the canonical instance
//! ordering of the packed buffer.

use glam::{Vec2, Vec3};
use tracing::{debug, warn};

use super::chunk::Chunk;
use crate::config::ChunkPartitionSettings;
use crate::error::BatchResult;

/// Largest chunk count a 16-bit signed id can address.
pub const MAX_CHUNKS: usize = i16::MAX as usize;

/// Splits positions into chunks.
pub trait Partitioner {
    /// Buckets `positions` into chunks and returns them in canonical order.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings describe an invalid grid.
    fn partition(&mut self, positions: &[Vec3]) -> BatchResult<Partition>;

    /// Half-extents of one chunk's bounding box: half-width, vertical
    /// extent, half-depth.
    fn chunk_extent(&self) -> Vec3;
}

/// Result of one partition run.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Positions regrouped by ascending chunk id.
    pub positions: Vec<Vec3>,
    /// For each reordered position, its index in the caller's input.
    ///
    /// Use this to reorder any per-instance array built before partitioning.
    pub source_indices: Vec<u32>,
    /// One entry per grid cell, indexed by id.
    pub chunks: Vec<Chunk>,
}

impl Partition {
    /// Number of partitioned instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.positions.len()
    }

    /// Reorders a per-instance array from input order into canonical order.
    ///
    /// # Panics
    ///
    /// Panics if `data` is shorter than the partitioned input.
    #[must_use]
    pub fn reorder<T: Copy>(&self, data: &[T]) -> Vec<T> {
        self.source_indices
            .iter()
            .map(|&source| data[source as usize])
            .collect()
    }
}

/// XZ rectangle owned by one chunk.
///
/// Bounds are closed, so a point on a shared grid line matches both
/// neighbours and the ascending-id scan hands it to the lower id.
#[derive(Debug, Clone, Copy)]
struct ChunkRect {
    x_min: f32,
    y_min: f32,
    x_max: f32,
    y_max: f32,
}

impl ChunkRect {
    #[inline]
    fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.x_min && x <= self.x_max && z >= self.y_min && z <= self.y_max
    }
}

/// Chunk table and rectangles, computed once per settings.
#[derive(Debug, Clone)]
struct ChunkGrid {
    chunks: Vec<Chunk>,
    rects: Vec<ChunkRect>,
}

impl ChunkGrid {
    fn compute(settings: &ChunkPartitionSettings) -> Self {
        let per_line = settings.chunks_per_line;
        let chunk_size = settings.terrain_size / per_line as f32;
        let count = settings.chunk_count();

        let mut chunks = Vec::with_capacity(count);
        let mut rects = Vec::with_capacity(count);

        for y in 0..per_line {
            for x in 0..per_line {
                // Validated against MAX_CHUNKS, fits in u16.
                let id = (x + y * per_line) as u16;
                let offset = Vec2::new(x as f32, y as f32) * chunk_size;
                let center = chunk_size * 0.5 + offset;

                // Positions exactly on the far terrain edge still need a home.
                let edge_x = if x == per_line - 1 { 1.0 } else { 0.0 };
                let edge_y = if y == per_line - 1 { 1.0 } else { 0.0 };

                chunks.push(Chunk::new(id, center));
                rects.push(ChunkRect {
                    x_min: offset.x,
                    y_min: offset.y,
                    x_max: offset.x + chunk_size.x + edge_x,
                    y_max: offset.y + chunk_size.y + edge_y,
                });
            }
        }

        Self { chunks, rects }
    }

    /// First rectangle containing the point, in ascending id order.
    /// Points outside the terrain fall back to chunk 0.
    fn locate(&self, position: Vec3) -> usize {
        self.rects
            .iter()
            .position(|rect| rect.contains(position.x, position.z))
            .unwrap_or(0)
    }
}

/// Partitions positions over a square chunk grid.
#[derive(Debug, Clone)]
pub struct ChunkPartitioner {
    settings: ChunkPartitionSettings,
    grid: Option<ChunkGrid>,
}

impl ChunkPartitioner {
    /// Creates a partitioner. The grid is computed lazily on first use.
    #[must_use]
    pub const fn new(settings: ChunkPartitionSettings) -> Self {
        Self {
            settings,
            grid: None,
        }
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &ChunkPartitionSettings {
        &self.settings
    }

    /// Replaces the settings. The cached grid is dropped only if they changed.
    pub fn set_settings(&mut self, settings: ChunkPartitionSettings) {
        if settings != self.settings {
            self.settings = settings;
            self.grid = None;
        }
    }

    /// The chunk table with zero instance counts.
    ///
    /// Computed once and served from cache while the settings are unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid.
    pub fn chunks(&mut self) -> BatchResult<&[Chunk]> {
        Ok(&self.grid()?.chunks)
    }

    /// Whether the grid has already been computed.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        self.grid.is_some()
    }

    fn grid(&mut self) -> BatchResult<&ChunkGrid> {
        let grid = match self.grid.take() {
            Some(grid) => grid,
            None => {
                self.settings.validate()?;
                debug!(
                    chunks_per_line = self.settings.chunks_per_line,
                    "computing chunk grid"
                );
                ChunkGrid::compute(&self.settings)
            }
        };
        Ok(self.grid.insert(grid))
    }
}

impl Partitioner for ChunkPartitioner {
    fn partition(&mut self, positions: &[Vec3]) -> BatchResult<Partition> {
        let grid = self.grid()?;
        let chunk_count = grid.chunks.len();

        let assigned: Vec<usize> = positions.iter().map(|&p| grid.locate(p)).collect();

        let mut counts = vec![0u32; chunk_count];
        for &chunk in &assigned {
            counts[chunk] += 1;
        }

        // Exclusive prefix sum: each chunk's base offset in canonical order.
        let mut cursor = Vec::with_capacity(chunk_count);
        let mut running = 0u32;
        for &count in &counts {
            cursor.push(running);
            running += count;
        }

        let mut ordered = vec![Vec3::ZERO; positions.len()];
        let mut source_indices = vec![0u32; positions.len()];
        for (source, (&position, &chunk)) in positions.iter().zip(&assigned).enumerate() {
            let slot = cursor[chunk] as usize;
            ordered[slot] = position;
            source_indices[slot] = source as u32;
            cursor[chunk] += 1;
        }

        let chunks: Vec<Chunk> = grid
            .chunks
            .iter()
            .zip(&counts)
            .map(|(chunk, &count)| Chunk {
                instance_count: count,
                ..*chunk
            })
            .collect();

        if positions.is_empty() {
            warn!("partitioning an empty position set");
        }
        debug!(
            instances = positions.len(),
            chunks = chunk_count,
            occupied = counts.iter().filter(|&&c| c > 0).count(),
            "partitioned instances"
        );

        Ok(Partition {
            positions: ordered,
            source_indices,
            chunks,
        })
    }

    fn chunk_extent(&self) -> Vec3 {
        let size = self.settings.terrain_size / self.settings.chunks_per_line.max(1) as f32;
        Vec3::new(size.x * 0.5, self.settings.vertical_bound, size.y * 0.5)
    }
}
