//! Grass field scatter and per-blade attributes.
//!
//! Positions come out on a regular grid. Attributes are generated afterwards
//! from the partitioner's reordered positions, so they are born in buffer
//! order and never need reordering.

use std::f32::consts::TAU;

use glam::{Mat4, Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sward_batch::instancing::InstanceBufferPacker;
use sward_batch::PackedMatrix;

use crate::config::FieldSettings;

/// Object-to-world transform property.
pub const OBJECT_TO_WORLD: &str = "object_to_world";
/// World-to-object transform property.
pub const WORLD_TO_OBJECT: &str = "world_to_object";
/// Blade height property.
pub const HEIGHT: &str = "height";

/// Blade roots on a regular grid over `terrain_size`, one per cell center.
#[must_use]
pub fn scatter_positions(settings: &FieldSettings, terrain_size: Vec2) -> Vec<Vec3> {
    let per_axis = settings.instances_per_axis;
    if per_axis == 0 {
        return Vec::new();
    }
    let spacing = terrain_size / per_axis as f32;
    let mut positions = Vec::with_capacity(per_axis as usize * per_axis as usize);
    for z in 0..per_axis {
        for x in 0..per_axis {
            let cell = (Vec2::new(x as f32, z as f32) + 0.5) * spacing;
            positions.push(Vec3::new(cell.x, 0.0, cell.y));
        }
    }
    positions
}

/// Per-blade shader inputs, one entry per instance in buffer order.
#[derive(Debug, Clone, PartialEq)]
pub struct GrassAttributes {
    /// Jittered translation.
    pub object_to_world: Vec<PackedMatrix>,
    /// Inverse of `object_to_world`.
    pub world_to_object: Vec<PackedMatrix>,
    /// Blade height.
    pub heights: Vec<f32>,
}

impl GrassAttributes {
    /// Generates attributes for `positions`, which must be in buffer order.
    ///
    /// Each blade is moved on XZ to a uniform point in a disc of radius
    /// `randomize_position_multiplier` around its root.
    #[must_use]
    pub fn generate(positions: &[Vec3], settings: &FieldSettings) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
        let [low, high] = settings.min_max_height.to_array();

        let mut object_to_world = Vec::with_capacity(positions.len());
        let mut world_to_object = Vec::with_capacity(positions.len());
        let mut heights = Vec::with_capacity(positions.len());

        for &position in positions {
            let jitter = random_in_unit_disc(&mut rng) * settings.randomize_position_multiplier;
            let transform = Mat4::from_translation(position + Vec3::new(jitter.x, 0.0, jitter.y));
            object_to_world.push(PackedMatrix::from_mat4(&transform));
            world_to_object.push(PackedMatrix::from_mat4(&transform.inverse()));
            heights.push(rng.gen_range(low..=high));
        }

        Self {
            object_to_world,
            world_to_object,
            heights,
        }
    }

    /// Blades described.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heights.len()
    }

    /// Whether there are no blades.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Queues the three properties: both transforms, then heights.
    pub fn describe(&self, packer: &mut InstanceBufferPacker) {
        packer
            .add_instanced(OBJECT_TO_WORLD, &self.object_to_world)
            .add_instanced(WORLD_TO_OBJECT, &self.world_to_object)
            .add_instanced(HEIGHT, &self.heights);
    }
}

fn random_in_unit_disc(rng: &mut impl Rng) -> Vec2 {
    let angle = rng.gen_range(0.0..TAU);
    let radius = rng.gen::<f32>().sqrt();
    Vec2::from_angle(angle) * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scatter_grid() {
        let settings = FieldSettings {
            instances_per_axis: 4,
            ..FieldSettings::default()
        };
        let positions = scatter_positions(&settings, Vec2::splat(8.0));
        assert_eq!(positions.len(), 16);
        assert_eq!(positions[0], Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(positions[15], Vec3::new(7.0, 0.0, 7.0));
    }

    #[test]
    fn test_empty_scatter() {
        let settings = FieldSettings {
            instances_per_axis: 0,
            ..FieldSettings::default()
        };
        assert!(scatter_positions(&settings, Vec2::splat(8.0)).is_empty());
    }

    #[test]
    fn test_attributes_stay_in_range() {
        let settings = FieldSettings {
            randomize_position_multiplier: 0.5,
            min_max_height: Vec2::new(0.6, 1.2),
            ..FieldSettings::default()
        };
        let positions = scatter_positions(&settings, Vec2::splat(64.0));
        let attributes = GrassAttributes::generate(&positions, &settings);
        assert_eq!(attributes.len(), positions.len());

        for (i, &root) in positions.iter().enumerate() {
            let transform = attributes.object_to_world[i].to_mat4();
            let inverse = attributes.world_to_object[i].to_mat4();
            let blade = transform.w_axis.truncate();

            assert!(Vec2::new(blade.x - root.x, blade.z - root.z).length() <= 0.5 + 1e-5);
            assert_eq!(blade.y, root.y);
            assert!((transform * inverse).abs_diff_eq(Mat4::IDENTITY, 1e-4));
            assert!((0.6..=1.2).contains(&attributes.heights[i]));
        }
    }

    #[test]
    fn test_attributes_are_deterministic() {
        let settings = FieldSettings::default();
        let positions = scatter_positions(&settings, Vec2::splat(32.0));
        assert_eq!(
            GrassAttributes::generate(&positions, &settings),
            GrassAttributes::generate(&positions, &settings)
        );
    }

    #[test]
    fn test_fixed_height() {
        let settings = FieldSettings {
            min_max_height: Vec2::splat(0.8),
            ..FieldSettings::default()
        };
        let attributes = GrassAttributes::generate(&[Vec3::ZERO; 8], &settings);
        assert!(attributes.heights.iter().all(|&h| h == 0.8));
    }
}
