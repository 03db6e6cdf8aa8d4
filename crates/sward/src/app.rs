//! One complete run: scatter, build, render frames, dispose.

use sward_batch::{
    Batch, BatchResult, Culler, FrameStats, HostCuller, InstanceBufferPacker, Partition,
    RenderRegistry,
};
use tracing::{info, warn};

use crate::config::{AppConfig, Backend};
use crate::error::{AppError, AppResult};
use crate::field::{scatter_positions, GrassAttributes};

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Blades in the batch.
    pub instances: usize,
    /// Instance buffer size.
    pub buffer_bytes: u64,
    /// Counters of every frame, in order.
    pub frames: Vec<FrameStats>,
    /// Buffers still registered after shutdown.
    pub leaked_buffers: usize,
    /// Batches still registered after shutdown.
    pub leaked_batches: usize,
}

/// Runs the configured field through the configured backend.
///
/// # Errors
///
/// Any configuration, build, culling or disposal failure. Resources are
/// released before a frame error is returned.
pub fn run(config: &AppConfig) -> AppResult<RunReport> {
    config.validate()?;
    let mut registry = RenderRegistry::new();

    match config.run.backend {
        Backend::Host => {
            let culler = HostCuller::new(config.batch.culling.clone());
            drive(config, &mut registry, culler, |batch| batch)
        }
        Backend::Gpu => run_gpu(config, &mut registry),
    }
}

#[cfg(feature = "gpu")]
fn run_gpu(config: &AppConfig, registry: &mut RenderRegistry) -> AppResult<RunReport> {
    let gpu = crate::gpu::request_context()?;
    let culler = sward_batch::CullingDispatcher::new(
        gpu.device.clone(),
        gpu.queue.clone(),
        config.batch.culling.clone(),
    )?;
    drive(config, registry, culler, |batch| batch.with_gpu_upload(gpu))
}

#[cfg(not(feature = "gpu"))]
fn run_gpu(_config: &AppConfig, _registry: &mut RenderRegistry) -> AppResult<RunReport> {
    Err(AppError::GpuDisabled)
}

fn drive<C: Culler>(
    config: &AppConfig,
    registry: &mut RenderRegistry,
    culler: C,
    attach: impl FnOnce(Batch<C>) -> Batch<C>,
) -> AppResult<RunReport> {
    let mesh = registry.register_mesh("grass_blade");
    let material = registry.register_material("grass");

    let mut batch = attach(Batch::with_grid(config.batch.clone(), mesh, material, culler)?);

    let positions = scatter_positions(&config.field, config.batch.partition.terrain_size);
    let field = config.field;
    let built = batch.rebuild(
        registry,
        &positions,
        |partition: &Partition, packer: &mut InstanceBufferPacker| -> BatchResult<()> {
            GrassAttributes::generate(&partition.positions, &field).describe(packer);
            Ok(())
        },
    );

    let frames = built
        .map_err(AppError::from)
        .and_then(|()| render_frames(config, &mut batch));
    let buffer_bytes = batch
        .instance_buffer()
        .map_or(0, |buffer| buffer.layout().size_bytes());

    // Released on every path, including a failed build or frame.
    let disposed = batch.dispose(registry);
    let frames = frames?;
    disposed?;
    registry.unregister_mesh(mesh)?;
    registry.unregister_material(material)?;

    let report = RunReport {
        instances: positions.len(),
        buffer_bytes,
        frames,
        leaked_buffers: registry.live_buffers(),
        leaked_batches: registry.live_batches(),
    };
    if report.leaked_buffers + report.leaked_batches > 0 {
        warn!(
            buffers = report.leaked_buffers,
            batches = report.leaked_batches,
            "registry entries left after shutdown"
        );
    }
    Ok(report)
}

fn render_frames<C: Culler>(config: &AppConfig, batch: &mut Batch<C>) -> AppResult<Vec<FrameStats>> {
    let mut frames = Vec::with_capacity(config.run.frames as usize);
    for frame in 0..config.run.frames {
        let camera = config.camera.camera_at(frame);
        let output = batch.on_frame(&camera)?;
        info!(
            frame,
            visible_chunks = output.stats.visible_chunks,
            total_chunks = output.stats.total_chunks,
            visible_instances = output.stats.visible_instances,
            "frame"
        );
        frames.push(output.stats);
    }
    Ok(frames)
}
