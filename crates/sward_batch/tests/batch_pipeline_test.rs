//! # Batch Pipeline Tests
//!
//! End-to-end runs of partition → pack → cull → compact through [`Batch`],
//! using the host culler or a scripted one so no GPU adapter is needed.

use std::collections::HashSet;

use glam::{Mat4, Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use sward_batch::culling::{Culler, DispatchSize};
use sward_batch::instancing::pack_matrices;
use sward_batch::{
    Batch, BatchConfig, BatchError, BatchResult, Camera, Chunk, ChunkPartitionSettings,
    ChunkPartitioner, HostCuller, InstanceBufferPacker, PackedMatrix, Partition, Partitioner,
    RenderRegistry,
};

/// Culler that marks a fixed set of chunk ids visible.
struct ScriptedCuller {
    visible: Vec<u16>,
    uploaded: Option<usize>,
    released: bool,
}

impl ScriptedCuller {
    fn new(visible: &[u16]) -> Self {
        Self {
            visible: visible.to_vec(),
            uploaded: None,
            released: false,
        }
    }
}

impl Culler for ScriptedCuller {
    fn upload(&mut self, chunks: &[Chunk]) -> BatchResult<()> {
        self.uploaded = Some(chunks.len());
        Ok(())
    }

    fn set_bounds(&mut self, _extent: Vec3) {}

    fn dispatch(&mut self, _camera: &Camera) -> BatchResult<DispatchSize> {
        let count = self.uploaded.ok_or(BatchError::ChunksNotUploaded)?;
        DispatchSize::for_items(count, 64, false)
    }

    fn readback(&mut self, chunks: &mut [Chunk]) -> BatchResult<()> {
        for chunk in chunks {
            chunk.visible = self.visible.contains(&chunk.id);
        }
        Ok(())
    }

    fn release(&mut self) -> BatchResult<()> {
        if self.released {
            return Err(BatchError::AlreadyDisposed {
                resource: "scripted culler".into(),
            });
        }
        self.released = true;
        Ok(())
    }
}

fn small_grid_config() -> BatchConfig {
    let mut config = BatchConfig::default();
    config.partition = ChunkPartitionSettings::new(2, Vec2::splat(10.0), 2.0);
    config
}

/// 10 positions split 3/2/4/1 over the four chunks of a 2x2 grid, shuffled.
fn scenario_positions() -> Vec<Vec3> {
    vec![
        Vec3::new(7.0, 0.0, 8.0), // 3
        Vec3::new(1.0, 0.0, 1.0), // 0
        Vec3::new(2.0, 0.0, 7.0), // 2
        Vec3::new(6.0, 0.0, 1.0), // 1
        Vec3::new(2.0, 0.0, 2.0), // 0
        Vec3::new(3.0, 0.0, 9.0), // 2
        Vec3::new(8.0, 0.0, 3.0), // 1
        Vec3::new(1.0, 0.0, 6.0), // 2
        Vec3::new(4.0, 0.0, 4.0), // 0
        Vec3::new(4.5, 0.0, 5.5), // 2
    ]
}

fn describe_transforms(partition: &Partition, packer: &mut InstanceBufferPacker) -> BatchResult<()> {
    let object_to_world: Vec<Mat4> = partition
        .positions
        .iter()
        .map(|&p| Mat4::from_translation(p))
        .collect();
    let world_to_object: Vec<Mat4> = object_to_world.iter().map(Mat4::inverse).collect();
    packer
        .add_instanced("object_to_world", &pack_matrices(&object_to_world))
        .add_instanced("world_to_object", &pack_matrices(&world_to_object));
    Ok(())
}

fn random_positions(seed: u64, count: usize, extent: f32) -> Vec<Vec3> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Vec3::new(
                rng.gen_range(0.0..=extent),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(0.0..=extent),
            )
        })
        .collect()
}

fn overhead_camera() -> Camera {
    Camera::look_at(
        Vec3::new(5.0, 30.0, 5.0),
        Vec3::new(5.0, 0.0, 5.01),
        60f32.to_radians(),
        1.0,
        0.1,
        100.0,
    )
}

#[test]
fn test_scenario_two_of_four_chunks_visible() {
    let mut registry = RenderRegistry::new();
    let mesh = registry.register_mesh("blade");
    let material = registry.register_material("grass");
    let mut batch =
        Batch::with_grid(small_grid_config(), mesh, material, ScriptedCuller::new(&[0, 2])).unwrap();

    batch
        .rebuild(&mut registry, &scenario_positions(), describe_transforms)
        .unwrap();
    let counts: Vec<u32> = batch.chunks().iter().map(|c| c.instance_count).collect();
    assert_eq!(counts, vec![3, 2, 4, 1]);

    let frame = batch.on_frame(&overhead_camera()).unwrap();
    assert_eq!(frame.visible_instances, &[0, 1, 2, 5, 6, 7, 8]);
    assert_eq!(frame.command.visible_count, 7);
    assert_eq!(frame.command.visible_offset, 0);
    assert_eq!(frame.stats.visible_chunks, 2);
    assert_eq!(frame.stats.total_chunks, 4);
    assert_eq!(frame.stats.dispatch, Some(DispatchSize { x: 1, y: 1, z: 1 }));
    assert_eq!(frame.range.count, 1);

    batch.dispose(&mut registry).unwrap();
}

#[test]
fn test_packed_buffer_follows_chunk_order() {
    let mut registry = RenderRegistry::new();
    let mesh = registry.register_mesh("blade");
    let material = registry.register_material("grass");
    let mut batch =
        Batch::with_grid(small_grid_config(), mesh, material, ScriptedCuller::new(&[])).unwrap();
    batch
        .rebuild(&mut registry, &scenario_positions(), describe_transforms)
        .unwrap();

    let packed = batch.instance_buffer().unwrap();
    let mut partitioner = ChunkPartitioner::new(small_grid_config().partition);
    let partition = partitioner.partition(&scenario_positions()).unwrap();

    for (slot, position) in partition.positions.iter().enumerate() {
        let matrix: PackedMatrix = packed.read("object_to_world", slot).unwrap();
        assert_eq!(matrix.to_mat4().w_axis.truncate(), *position);
    }

    // The first chunk's instances sit in the first slots.
    let first: PackedMatrix = packed.read("object_to_world", 0).unwrap();
    let translation = first.to_mat4().w_axis;
    assert!(translation.x < 5.0 && translation.z < 5.0);

    batch.dispose(&mut registry).unwrap();
}

#[test]
fn test_culling_disabled_draws_everything() {
    let mut config = small_grid_config();
    config.culling.enabled = false;

    let mut registry = RenderRegistry::new();
    let mesh = registry.register_mesh("blade");
    let material = registry.register_material("grass");
    let mut batch = Batch::with_grid(config, mesh, material, ScriptedCuller::new(&[])).unwrap();
    batch
        .rebuild(&mut registry, &scenario_positions(), describe_transforms)
        .unwrap();

    let frame = batch.on_frame(&overhead_camera()).unwrap();
    assert_eq!(frame.visible_instances, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(frame.command.visible_count, 10);
    assert_eq!(frame.stats.dispatch, None);

    batch.dispose(&mut registry).unwrap();
}

#[test]
fn test_partition_coverage_and_determinism() {
    for (seed, per_line) in [(1u64, 1u32), (2, 3), (3, 16), (4, 64)] {
        let positions = random_positions(seed, 5_000, 256.0);
        let settings = ChunkPartitionSettings::new(per_line, Vec2::splat(256.0), 4.0);

        let first = ChunkPartitioner::new(settings).partition(&positions).unwrap();
        let second = ChunkPartitioner::new(settings).partition(&positions).unwrap();
        assert_eq!(first, second, "partition must be deterministic");

        let total: u32 = first.chunks.iter().map(|c| c.instance_count).sum();
        assert_eq!(total as usize, positions.len());

        let unique: HashSet<u32> = first.source_indices.iter().copied().collect();
        assert_eq!(unique.len(), positions.len(), "every input placed exactly once");
    }
}

#[test]
fn test_host_culling_end_to_end() {
    let mut config = small_grid_config();
    config.partition = ChunkPartitionSettings::new(8, Vec2::splat(256.0), 4.0);

    let mut registry = RenderRegistry::new();
    let mesh = registry.register_mesh("blade");
    let material = registry.register_material("grass");
    let culler = HostCuller::new(config.culling.clone());
    let mut batch = Batch::with_grid(config, mesh, material, culler).unwrap();

    let positions = random_positions(7, 4_000, 256.0);
    batch.rebuild(&mut registry, &positions, describe_transforms).unwrap();

    // Low camera in one corner looking along the diagonal.
    let camera = Camera::look_at(
        Vec3::new(4.0, 3.0, 4.0),
        Vec3::new(60.0, 0.0, 60.0),
        50f32.to_radians(),
        1.0,
        0.1,
        120.0,
    );
    let frame = batch.on_frame(&camera).unwrap();

    assert!(frame.stats.visible_chunks > 0);
    assert!(frame.stats.visible_chunks < frame.stats.total_chunks);

    let unique: HashSet<u32> = frame.visible_instances.iter().copied().collect();
    assert_eq!(unique.len(), frame.visible_instances.len());
    assert!(frame.visible_instances.iter().all(|&i| (i as usize) < positions.len()));
    assert!(frame.visible_instances.windows(2).all(|w| w[0] < w[1]));

    let expected: u32 = batch
        .chunks()
        .iter()
        .filter(|c| c.visible)
        .map(|c| c.instance_count)
        .sum();
    let frame = batch.on_frame(&camera).unwrap();
    assert_eq!(frame.command.visible_count, expected);

    // The far corner is out of range.
    assert!(!batch.chunks()[63].visible);

    batch.dispose(&mut registry).unwrap();
}

#[test]
fn test_rebuild_releases_previous_resources() {
    let mut registry = RenderRegistry::new();
    let mesh = registry.register_mesh("blade");
    let material = registry.register_material("grass");
    let mut batch =
        Batch::with_grid(small_grid_config(), mesh, material, ScriptedCuller::new(&[1])).unwrap();

    for seed in 0..5 {
        let positions = random_positions(seed, 100 + seed as usize * 10, 10.0);
        batch.rebuild(&mut registry, &positions, describe_transforms).unwrap();
        assert_eq!(registry.live_buffers(), 1);
        assert_eq!(registry.live_batches(), 1);
        assert_eq!(batch.render_batch().unwrap().instance_count as usize, positions.len());
    }
    // Old and new build overlap during a rebuild; slots are reused after.
    assert_eq!(registry.slot_capacity(), (2, 2));

    batch.dispose(&mut registry).unwrap();
    assert_eq!(registry.live_buffers(), 0);
    assert_eq!(registry.live_batches(), 0);
    assert!(batch.is_disposed());
}

#[test]
fn test_failed_rebuild_keeps_previous_build() {
    let mut registry = RenderRegistry::new();
    let mesh = registry.register_mesh("blade");
    let material = registry.register_material("grass");
    let mut batch =
        Batch::with_grid(small_grid_config(), mesh, material, ScriptedCuller::new(&[0])).unwrap();
    batch
        .rebuild(&mut registry, &scenario_positions(), describe_transforms)
        .unwrap();
    let before = batch.render_batch().unwrap();

    let result = batch.rebuild(&mut registry, &scenario_positions(), |_, packer| {
        packer.add_instanced("heights", &[1.0f32; 3]);
        Ok(())
    });
    assert!(matches!(result, Err(BatchError::PropertyLengthMismatch { .. })));
    assert_eq!(batch.render_batch().unwrap(), before);
    assert_eq!(registry.live_buffers(), 1);
    assert_eq!(registry.live_batches(), 1);

    batch.dispose(&mut registry).unwrap();
}

#[test]
fn test_failed_release_of_old_build_keeps_chunks_and_buffer_together() {
    let mut registry = RenderRegistry::new();
    let mesh = registry.register_mesh("blade");
    let material = registry.register_material("grass");
    let mut batch =
        Batch::with_grid(small_grid_config(), mesh, material, ScriptedCuller::new(&[3])).unwrap();

    let corner: Vec<Vec3> = (0..4).map(|i| Vec3::new(1.0 + i as f32, 0.0, 1.0)).collect();
    batch.rebuild(&mut registry, &corner, describe_transforms).unwrap();
    let old = batch.render_batch().unwrap().batch;
    registry.remove_batch(old).unwrap();

    // Ten instances in each chunk of the 2x2 grid.
    let centers = [(2.5, 2.5), (7.5, 2.5), (2.5, 7.5), (7.5, 7.5)];
    let spread: Vec<Vec3> = (0..40)
        .map(|i| {
            let (x, z) = centers[i % 4];
            Vec3::new(x + (i / 4) as f32 * 0.1, 0.0, z)
        })
        .collect();
    let result = batch.rebuild(&mut registry, &spread, describe_transforms);
    assert!(matches!(result, Err(BatchError::AlreadyDisposed { .. })));

    let render_batch = batch.render_batch().unwrap();
    assert_eq!(render_batch.instance_count, 40);
    let table_total: u32 = batch.chunks().iter().map(|c| c.instance_count).sum();
    assert_eq!(table_total, render_batch.instance_count);
    assert_eq!(registry.live_buffers(), 1);
    assert_eq!(registry.live_batches(), 1);

    let frame = batch.on_frame(&overhead_camera()).unwrap();
    assert_eq!(frame.visible_instances, (30..40).collect::<Vec<u32>>().as_slice());

    batch.dispose(&mut registry).unwrap();
    assert_eq!(registry.live_buffers(), 0);
    assert_eq!(registry.live_batches(), 0);
}

#[test]
fn test_dispose_twice_and_use_after_dispose() {
    let mut registry = RenderRegistry::new();
    let mesh = registry.register_mesh("blade");
    let material = registry.register_material("grass");
    let mut batch =
        Batch::with_grid(small_grid_config(), mesh, material, ScriptedCuller::new(&[])).unwrap();
    batch
        .rebuild(&mut registry, &scenario_positions(), describe_transforms)
        .unwrap();

    batch.dispose(&mut registry).unwrap();
    assert!(matches!(
        batch.dispose(&mut registry),
        Err(BatchError::AlreadyDisposed { .. })
    ));
    assert!(matches!(
        batch.on_frame(&overhead_camera()),
        Err(BatchError::UseAfterDispose { .. })
    ));
    assert!(matches!(
        batch.rebuild(&mut registry, &scenario_positions(), describe_transforms),
        Err(BatchError::UseAfterDispose { .. })
    ));
}

#[test]
fn test_frame_before_rebuild() {
    let mut registry = RenderRegistry::new();
    let mesh = registry.register_mesh("blade");
    let material = registry.register_material("grass");
    let mut batch =
        Batch::with_grid(small_grid_config(), mesh, material, ScriptedCuller::new(&[])).unwrap();
    assert_eq!(
        batch.on_frame(&overhead_camera()).err(),
        Some(BatchError::BatchNotBuilt)
    );
    batch.dispose(&mut registry).unwrap();
}

#[test]
fn test_empty_rebuild() {
    let mut registry = RenderRegistry::new();
    let mesh = registry.register_mesh("blade");
    let material = registry.register_material("grass");
    let mut batch =
        Batch::with_grid(small_grid_config(), mesh, material, ScriptedCuller::new(&[0, 1, 2, 3]))
            .unwrap();
    batch.rebuild(&mut registry, &[], describe_transforms).unwrap();

    let frame = batch.on_frame(&overhead_camera()).unwrap();
    assert!(frame.visible_instances.is_empty());
    assert_eq!(frame.command.visible_count, 0);

    batch.dispose(&mut registry).unwrap();
}
