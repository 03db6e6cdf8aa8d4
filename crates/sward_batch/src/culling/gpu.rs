//! wgpu backend for chunk culling.

use std::sync::Arc;

use glam::Vec3;
use tracing::{debug, info};

use super::dispatch::{CullConstants, DispatchSize};
use super::kernel::kernel_source;
use super::Culler;
use crate::camera::Camera;
use crate::config::CullingSettings;
use crate::error::{BatchError, BatchResult};
use crate::partition::{Chunk, ChunkRecord};

/// Chunk storage plus its readback staging copy. Both live until the chunk
/// count changes or the dispatcher is released.
struct ChunkBuffers {
    storage: wgpu::Buffer,
    staging: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    count: usize,
}

impl ChunkBuffers {
    fn destroy(self) {
        self.storage.destroy();
        self.staging.destroy();
    }
}

/// Runs the chunk culling kernel on a wgpu device.
pub struct CullingDispatcher {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    settings: CullingSettings,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    constants: Option<wgpu::Buffer>,
    chunks: Option<ChunkBuffers>,
    extent: Vec3,
    dispatched: bool,
}

impl CullingDispatcher {
    /// Compiles the kernel and creates the constants buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidGroupSize`] for a zero group size.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        settings: CullingSettings,
    ) -> BatchResult<Self> {
        settings.validate()?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Chunk Cull Shader"),
            source: wgpu::ShaderSource::Wgsl(kernel_source(&settings).into()),
        });

        let buffer_entry = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Chunk Cull Bind Group Layout"),
            entries: &[
                buffer_entry(0, wgpu::BufferBindingType::Uniform),
                buffer_entry(1, wgpu::BufferBindingType::Storage { read_only: false }),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Chunk Cull Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Chunk Cull Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: &settings.kernel,
        });

        let constants = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Chunk Cull Constants"),
            size: std::mem::size_of::<CullConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        info!(
            kernel = %settings.kernel,
            group_size = settings.group_size,
            "culling pipeline ready"
        );

        Ok(Self {
            device,
            queue,
            settings,
            pipeline,
            bind_group_layout,
            constants: Some(constants),
            chunks: None,
            extent: Vec3::ZERO,
            dispatched: false,
        })
    }

    /// Chunks held by the current chunk buffer.
    #[must_use]
    pub fn uploaded_chunks(&self) -> usize {
        self.chunks.as_ref().map_or(0, |buffers| buffers.count)
    }

    fn constants_buffer(&self) -> BatchResult<&wgpu::Buffer> {
        self.constants
            .as_ref()
            .ok_or_else(|| BatchError::use_after_dispose("culling dispatcher"))
    }

    fn allocate(&self, count: usize, constants: &wgpu::Buffer) -> ChunkBuffers {
        let size = (count.max(1) * ChunkRecord::SIZE) as u64;
        let storage = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Chunk Buffer"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Chunk Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Chunk Cull Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: constants.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: storage.as_entire_binding(),
                },
            ],
        });
        ChunkBuffers {
            storage,
            staging,
            bind_group,
            count,
        }
    }
}

impl Culler for CullingDispatcher {
    fn upload(&mut self, chunks: &[Chunk]) -> BatchResult<()> {
        let constants = self.constants_buffer()?;

        if self.uploaded_chunks() != chunks.len() || self.chunks.is_none() {
            let buffers = self.allocate(chunks.len(), constants);
            if let Some(old) = self.chunks.replace(buffers) {
                old.destroy();
            }
            debug!(chunks = chunks.len(), "allocated chunk buffer");
        }

        let records: Vec<ChunkRecord> = chunks.iter().map(Chunk::to_record).collect();
        if let Some(buffers) = &self.chunks {
            self.queue
                .write_buffer(&buffers.storage, 0, bytemuck::cast_slice(&records));
        }
        self.dispatched = false;
        Ok(())
    }

    fn set_bounds(&mut self, extent: Vec3) {
        self.extent = extent;
    }

    fn dispatch(&mut self, camera: &Camera) -> BatchResult<DispatchSize> {
        let constants_buffer = self.constants_buffer()?;
        let buffers = self.chunks.as_ref().ok_or(BatchError::ChunksNotUploaded)?;

        let size = DispatchSize::for_items(
            buffers.count,
            self.settings.group_size,
            self.settings.squared_dispatch,
        )?;
        let constants = CullConstants::new(camera, self.extent, &self.settings, buffers.count, size);
        self.queue
            .write_buffer(constants_buffer, 0, bytemuck::bytes_of(&constants));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Chunk Cull Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Chunk Cull Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &buffers.bind_group, &[]);
            pass.dispatch_workgroups(size.x, size.y, size.z);
        }
        encoder.copy_buffer_to_buffer(
            &buffers.storage,
            0,
            &buffers.staging,
            0,
            buffers.storage.size(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        self.dispatched = true;
        Ok(size)
    }

    fn readback(&mut self, chunks: &mut [Chunk]) -> BatchResult<()> {
        self.constants_buffer()?;
        let buffers = self.chunks.as_ref().ok_or(BatchError::ChunksNotUploaded)?;
        if buffers.count != chunks.len() {
            return Err(BatchError::ChunkCountMismatch {
                expected: buffers.count,
                found: chunks.len(),
            });
        }
        if !self.dispatched {
            return Ok(());
        }

        let slice = buffers.staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the poll below.
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| BatchError::BufferMap(e.to_string()))?
            .map_err(|e| BatchError::BufferMap(e.to_string()))?;

        {
            let data = slice.get_mapped_range();
            let byte_len = chunks.len() * ChunkRecord::SIZE;
            let records: &[ChunkRecord] = bytemuck::cast_slice(&data[..byte_len]);
            for (chunk, record) in chunks.iter_mut().zip(records) {
                chunk.visible = record.is_visible();
            }
        }
        buffers.staging.unmap();
        Ok(())
    }

    fn release(&mut self) -> BatchResult<()> {
        let constants = self
            .constants
            .take()
            .ok_or_else(|| BatchError::already_disposed("culling dispatcher"))?;
        constants.destroy();
        if let Some(buffers) = self.chunks.take() {
            buffers.destroy();
        }
        debug!("culling dispatcher released");
        Ok(())
    }
}
