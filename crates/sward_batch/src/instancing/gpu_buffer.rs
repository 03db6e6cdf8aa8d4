//! Upload of the packed instance buffer to the GPU.

use wgpu::util::DeviceExt;

use super::packer::PackedInstanceBuffer;
use crate::config::BufferTarget;
use crate::error::{BatchError, BatchResult};
use crate::registry::BufferHandle;

/// GPU-resident copy of a [`PackedInstanceBuffer`].
///
/// Released explicitly with [`GpuInstanceBuffer::release`]; a second
/// release or any use afterwards is an error.
pub struct GpuInstanceBuffer {
    buffer: Option<wgpu::Buffer>,
    handle: BufferHandle,
    size: u64,
}

impl GpuInstanceBuffer {
    /// Creates the GPU buffer and fills it with the packed bytes.
    #[must_use]
    pub fn upload(device: &wgpu::Device, packed: &PackedInstanceBuffer) -> Self {
        let usage = match packed.target() {
            BufferTarget::Raw => wgpu::BufferUsages::STORAGE,
            BufferTarget::Constant => wgpu::BufferUsages::UNIFORM,
        } | wgpu::BufferUsages::COPY_DST;

        // Zero-sized bindings are invalid; keep one 16-byte row at minimum.
        let min_row = [0u8; 16];
        let contents = if packed.as_bytes().is_empty() {
            &min_row[..]
        } else {
            packed.as_bytes()
        };

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents,
            usage,
        });

        Self {
            size: contents.len() as u64,
            buffer: Some(buffer),
            handle: packed.handle(),
        }
    }

    /// Registry handle this upload mirrors.
    #[must_use]
    pub const fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// The wgpu buffer, for binding.
    ///
    /// # Errors
    ///
    /// Fails after [`GpuInstanceBuffer::release`].
    pub fn buffer(&self) -> BatchResult<&wgpu::Buffer> {
        self.buffer
            .as_ref()
            .ok_or_else(|| BatchError::use_after_dispose(self.handle.to_string()))
    }

    /// Destroys the GPU buffer.
    ///
    /// # Errors
    ///
    /// Fails loudly on a second release.
    pub fn release(&mut self) -> BatchResult<()> {
        let buffer = self
            .buffer
            .take()
            .ok_or_else(|| BatchError::already_disposed(self.handle.to_string()))?;
        buffer.destroy();
        Ok(())
    }
}
