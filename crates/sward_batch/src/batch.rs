//! One instanced batch: partition, packed buffer, culling and draw assembly.
//!
//! A [`Batch`] owns every resource that must change together. The chunk
//! table and the packed buffer's instance order only ever come from the same
//! [`Batch::rebuild`] call, so visible indices can never point at slots laid
//! out by a different partition.

#[cfg(feature = "gpu")]
use std::sync::Arc;

use glam::Vec3;
use tracing::{debug, info, trace, warn};

use crate::camera::Camera;
use crate::config::BatchConfig;
use crate::culling::Culler;
use crate::draw::{DrawCommandAssembler, FrameOutput, FrameStats, RenderBatch};
use crate::error::{BatchError, BatchResult};
use crate::instancing::{InstanceBufferPacker, PackedInstanceBuffer};
#[cfg(feature = "gpu")]
use crate::instancing::GpuInstanceBuffer;
use crate::partition::{Chunk, ChunkPartitioner, Partition, Partitioner};
use crate::registry::{BatchHandle, MaterialHandle, MeshHandle, RenderRegistry};

/// Device and queue used to mirror the instance buffer on the GPU.
#[cfg(feature = "gpu")]
#[derive(Debug, Clone)]
pub struct GpuContext {
    /// Device buffers are created on.
    pub device: Arc<wgpu::Device>,
    /// Queue used for uploads.
    pub queue: Arc<wgpu::Queue>,
}

/// Resources produced by one rebuild. Released as a unit.
struct BuiltResources {
    packed: PackedInstanceBuffer,
    batch: BatchHandle,
    #[cfg(feature = "gpu")]
    gpu: Option<GpuInstanceBuffer>,
}

impl BuiltResources {
    /// Releases everything, reporting the first failure after attempting all.
    fn release(self, registry: &mut RenderRegistry) -> BatchResult<()> {
        #[cfg(feature = "gpu")]
        let gpu = self.gpu.map_or(Ok(()), |mut gpu| gpu.release());
        #[cfg(not(feature = "gpu"))]
        let gpu = Ok(());
        let batch = registry.remove_batch(self.batch);
        let buffer = registry.release_buffer(self.packed.handle());
        gpu.and(batch).and(buffer)
    }
}

/// A homogeneous instanced batch over a chunk grid.
pub struct Batch<C: Culler, P: Partitioner = ChunkPartitioner> {
    config: BatchConfig,
    mesh: MeshHandle,
    material: MaterialHandle,
    partitioner: P,
    culler: C,
    #[cfg(feature = "gpu")]
    gpu: Option<GpuContext>,
    assembler: DrawCommandAssembler,
    chunks: Vec<Chunk>,
    built: Option<BuiltResources>,
    disposed: bool,
}

impl<C: Culler> Batch<C, ChunkPartitioner> {
    /// Batch over the square grid described by `config.partition`.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn with_grid(
        config: BatchConfig,
        mesh: MeshHandle,
        material: MaterialHandle,
        culler: C,
    ) -> BatchResult<Self> {
        let partitioner = ChunkPartitioner::new(config.partition);
        Self::new(config, mesh, material, partitioner, culler)
    }
}

impl<C: Culler, P: Partitioner> Batch<C, P> {
    /// Creates an empty batch. Nothing is allocated until [`Batch::rebuild`].
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn new(
        config: BatchConfig,
        mesh: MeshHandle,
        material: MaterialHandle,
        partitioner: P,
        culler: C,
    ) -> BatchResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            mesh,
            material,
            partitioner,
            culler,
            #[cfg(feature = "gpu")]
            gpu: None,
            assembler: DrawCommandAssembler::new(),
            chunks: Vec::new(),
            built: None,
            disposed: false,
        })
    }

    /// Mirrors every future instance buffer on `gpu`.
    #[cfg(feature = "gpu")]
    #[must_use]
    pub fn with_gpu_upload(mut self, gpu: GpuContext) -> Self {
        self.gpu = Some(gpu);
        self
    }

    /// Configuration the batch was created with.
    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Chunk table of the last rebuild, with the last frame's flags.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Host image of the current instance buffer.
    #[must_use]
    pub fn instance_buffer(&self) -> Option<&PackedInstanceBuffer> {
        self.built.as_ref().map(|built| &built.packed)
    }

    /// GPU copy of the current instance buffer, when uploading.
    #[cfg(feature = "gpu")]
    #[must_use]
    pub fn gpu_instance_buffer(&self) -> Option<&GpuInstanceBuffer> {
        self.built.as_ref().and_then(|built| built.gpu.as_ref())
    }

    /// Registration the host renderer draws.
    #[must_use]
    pub fn render_batch(&self) -> Option<RenderBatch> {
        self.built.as_ref().map(|built| RenderBatch {
            mesh: self.mesh,
            material: self.material,
            batch: built.batch,
            instance_count: built.packed.layout().num_instances as u32,
        })
    }

    /// The culling backend.
    #[must_use]
    pub const fn culler(&self) -> &C {
        &self.culler
    }

    /// Whether [`Batch::dispose`] has run.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Repartitions `positions` and rebuilds the instance buffer from them.
    ///
    /// `describe` receives the partition and adds every property to the
    /// packer. Arrays must follow `partition.positions` order; arrays built
    /// in input order can be brought into it with [`Partition::reorder`].
    ///
    /// The new buffer and batch are registered before the old ones are
    /// released, so a failure leaves the previous build in place. Once the
    /// new chunk table is uploaded it is committed with the new buffer; an
    /// error releasing the old build is returned after that commit.
    ///
    /// # Errors
    ///
    /// Fails after dispose, or with any partition, packing or culling error,
    /// or when the previous build cannot be released.
    pub fn rebuild<F>(
        &mut self,
        registry: &mut RenderRegistry,
        positions: &[Vec3],
        describe: F,
    ) -> BatchResult<()>
    where
        F: FnOnce(&Partition, &mut InstanceBufferPacker) -> BatchResult<()>,
    {
        if self.disposed {
            return Err(BatchError::use_after_dispose("batch"));
        }

        let partition = self.partitioner.partition(positions)?;
        let mut packer = InstanceBufferPacker::new(partition.instance_count());
        describe(&partition, &mut packer)?;
        let packed = packer.build(registry, &self.config.buffer)?;

        let batch = match registry.add_batch(packed.metadata(), packed.handle()) {
            Ok(batch) => batch,
            Err(e) => {
                registry.release_buffer(packed.handle())?;
                return Err(e);
            }
        };
        let fresh = BuiltResources {
            #[cfg(feature = "gpu")]
            gpu: self
                .gpu
                .as_ref()
                .map(|gpu| GpuInstanceBuffer::upload(&gpu.device, &packed)),
            packed,
            batch,
        };

        self.culler.set_bounds(self.partitioner.chunk_extent());
        if let Err(e) = self.culler.upload(&partition.chunks) {
            fresh.release(registry)?;
            return Err(e);
        }

        // Chunk table and buffer swap together; the old build goes afterwards.
        let old = self.built.replace(fresh);
        self.chunks = partition.chunks;

        info!(
            instances = partition.positions.len(),
            chunks = self.chunks.len(),
            size_bytes = self.instance_buffer().map_or(0, |b| b.layout().size_bytes()),
            "rebuilt batch"
        );
        old.map_or(Ok(()), |old| old.release(registry))
    }

    /// Runs one frame: cull if enabled, then compact and build the command.
    ///
    /// # Errors
    ///
    /// Fails before the first rebuild, after dispose, or when the culling
    /// round trip fails.
    pub fn on_frame(&mut self, camera: &Camera) -> BatchResult<FrameOutput<'_>> {
        if self.disposed {
            return Err(BatchError::use_after_dispose("batch"));
        }
        let render_batch = self.render_batch().ok_or(BatchError::BatchNotBuilt)?;
        let total_chunks = self.chunks.len() as u32;

        self.assembler.begin_frame();
        let stats = if self.config.culling.enabled {
            self.culler.upload(&self.chunks)?;
            let dispatch = self.culler.dispatch(camera)?;
            self.assembler.culling_requested();
            self.culler.readback(&mut self.chunks)?;
            let visible_instances = self.assembler.visibility_ready(&self.chunks);
            FrameStats {
                total_chunks,
                visible_chunks: self.chunks.iter().filter(|c| c.visible).count() as u32,
                visible_instances,
                dispatch: Some(dispatch),
            }
        } else {
            FrameStats {
                total_chunks,
                visible_chunks: total_chunks,
                visible_instances: self.assembler.all_visible(render_batch.instance_count),
                dispatch: None,
            }
        };

        let (command, range) = self.assembler.build(&render_batch);
        trace!(
            visible_chunks = stats.visible_chunks,
            visible_instances = stats.visible_instances,
            "frame assembled"
        );
        Ok(FrameOutput {
            command,
            range,
            visible_instances: self.assembler.visible_instances(),
            stats,
        })
    }

    /// Releases the instance buffer, batch registration and culler together.
    ///
    /// Every release is attempted even if an earlier one fails; the first
    /// failure is returned.
    ///
    /// # Errors
    ///
    /// [`BatchError::AlreadyDisposed`] on a second call.
    pub fn dispose(&mut self, registry: &mut RenderRegistry) -> BatchResult<()> {
        if self.disposed {
            return Err(BatchError::already_disposed("batch"));
        }
        self.disposed = true;

        let built = self.built.take().map_or(Ok(()), |built| built.release(registry));
        let culler = self.culler.release();
        self.chunks.clear();
        debug!("batch disposed");
        built.and(culler)
    }
}

impl<C: Culler, P: Partitioner> Drop for Batch<C, P> {
    fn drop(&mut self) {
        if !self.disposed && self.built.is_some() {
            warn!("batch dropped without dispose; registry entries leaked");
        }
    }
}
