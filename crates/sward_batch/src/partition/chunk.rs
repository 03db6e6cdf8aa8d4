//! Chunk table entries and their GPU wire format.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// A spatial bucket of instances.
///
/// `id` is derived from grid coordinates (`x + y * chunks_per_line`) and is
/// also the chunk's index in the table. `instance_count` is fixed at
/// partition time; only `visible` changes from frame to frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk {
    /// Grid-derived id.
    pub id: u16,
    /// Center of the chunk on the XZ plane.
    pub center: Vec2,
    /// Contiguous instances owned by this chunk in the packed buffer.
    pub instance_count: u32,
    /// Result of the last culling pass.
    pub visible: bool,
}

impl Chunk {
    /// Creates an empty, invisible chunk.
    #[must_use]
    pub const fn new(id: u16, center: Vec2) -> Self {
        Self {
            id,
            center,
            instance_count: 0,
            visible: false,
        }
    }

    /// Converts to the record uploaded to the culling kernel.
    #[must_use]
    pub fn to_record(&self) -> ChunkRecord {
        ChunkRecord {
            id: i32::from(self.id),
            position_x: self.center.x,
            position_z: self.center.y,
            instance_count: self.instance_count as i32,
            is_on_view: i32::from(self.visible),
        }
    }
}

/// Chunk as it crosses the host/GPU boundary.
///
/// Field order and sizes are fixed: the kernel reads these bytes directly.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ChunkRecord {
    /// Chunk id.
    pub id: i32,
    /// Center X.
    pub position_x: f32,
    /// Center Z.
    pub position_z: f32,
    /// Instances in the chunk.
    pub instance_count: i32,
    /// Non-zero when the kernel found the chunk on screen.
    pub is_on_view: i32,
}

impl ChunkRecord {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Whether the kernel marked this chunk visible.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.is_on_view > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(ChunkRecord::SIZE, 20);
        assert_eq!(std::mem::align_of::<ChunkRecord>(), 4);
    }

    #[test]
    fn test_record_field_order() {
        let mut chunk = Chunk::new(7, Vec2::new(1.5, -2.0));
        chunk.instance_count = 42;
        chunk.visible = true;

        let record = chunk.to_record();
        let words: &[u32] = bytemuck::cast_slice(bytemuck::bytes_of(&record));

        assert_eq!(words[0], 7);
        assert_eq!(f32::from_bits(words[1]), 1.5);
        assert_eq!(f32::from_bits(words[2]), -2.0);
        assert_eq!(words[3], 42);
        assert_eq!(words[4], 1);
    }
}
