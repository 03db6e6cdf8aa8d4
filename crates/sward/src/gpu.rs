//! Headless wgpu device for the GPU backend.

use std::sync::Arc;

use sward_batch::{BatchError, GpuContext};
use tracing::info;

use crate::error::AppResult;

/// Requests a compute-capable device, falling back to a software adapter.
///
/// # Errors
///
/// [`BatchError::NoAdapter`] when no adapter exists,
/// [`BatchError::DeviceRequest`] when the adapter refuses a device.
pub fn request_context() -> AppResult<GpuContext> {
    pollster::block_on(request_context_async())
}

async fn request_context_async() -> AppResult<GpuContext> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

    let adapter = match instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
    {
        Some(adapter) => adapter,
        None => instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: true,
            })
            .await
            .ok_or(BatchError::NoAdapter)?,
    };
    info!(adapter = ?adapter.get_info().name, "using GPU adapter");

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("sward_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        )
        .await
        .map_err(|e| BatchError::DeviceRequest(e.to_string()))?;

    Ok(GpuContext {
        device: Arc::new(device),
        queue: Arc::new(queue),
    })
}
