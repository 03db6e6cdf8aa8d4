//! Packs per-instance property arrays into one flat buffer image.

use bytemuck::Pod;
use tracing::{debug, info};

use super::layout::{
    buffer_count_for_instances, property_addresses, BufferLayout, MetadataValue,
    ShaderPropertyDescriptor, PER_INSTANCE_FLAG,
};
use crate::config::{BufferSettings, BufferTarget};
use crate::error::{BatchError, BatchResult};
use crate::registry::{BufferHandle, RenderRegistry};

/// A property queued for packing.
#[derive(Debug, Clone)]
struct PendingProperty {
    name: String,
    metadata_flag: u32,
    element_size: usize,
    elements: usize,
    data: Vec<u8>,
}

/// Collects property arrays and lays them out in call order.
///
/// Every array must already follow the partitioner's canonical ordering.
#[derive(Debug, Clone)]
pub struct InstanceBufferPacker {
    num_instances: usize,
    properties: Vec<PendingProperty>,
}

impl InstanceBufferPacker {
    /// Creates a packer for `num_instances` instances.
    #[must_use]
    pub const fn new(num_instances: usize) -> Self {
        Self {
            num_instances,
            properties: Vec::new(),
        }
    }

    /// Instances per property.
    #[must_use]
    pub const fn num_instances(&self) -> usize {
        self.num_instances
    }

    /// Properties queued so far.
    #[must_use]
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Appends a property. Call order is packing order.
    pub fn add_property<T: Pod>(
        &mut self,
        name: impl Into<String>,
        metadata_flag: u32,
        data: &[T],
    ) -> &mut Self {
        self.properties.push(PendingProperty {
            name: name.into(),
            metadata_flag,
            element_size: std::mem::size_of::<T>(),
            elements: data.len(),
            data: bytemuck::cast_slice(data).to_vec(),
        });
        self
    }

    /// Appends a per-instance property (high metadata bit set).
    pub fn add_instanced<T: Pod>(&mut self, name: impl Into<String>, data: &[T]) -> &mut Self {
        self.add_property(name, PER_INSTANCE_FLAG, data)
    }

    /// Computes the layout without materializing the buffer.
    ///
    /// # Errors
    ///
    /// Fails on length mismatches, misaligned addresses, addresses that
    /// reach the flag bits, or a buffer too small after 16-byte truncation.
    pub fn layout(
        &self,
        registry: &mut RenderRegistry,
        settings: &BufferSettings,
    ) -> BatchResult<BufferLayout> {
        settings.validate()?;
        let n = self.num_instances;

        for property in &self.properties {
            if property.elements != n {
                return Err(BatchError::PropertyLengthMismatch {
                    name: property.name.clone(),
                    expected: n,
                    found: property.elements,
                });
            }
        }

        let free_space = u64::from(settings.free_space_bytes);
        let reserved = free_space + u64::from(settings.extra_bytes);
        let stride = u64::from(settings.stride);
        let sizes: Vec<usize> = self.properties.iter().map(|p| p.element_size).collect();
        let addresses = property_addresses(&sizes, n, free_space);

        let mut descriptors = Vec::with_capacity(self.properties.len());
        for (property, &address) in self.properties.iter().zip(&addresses) {
            if property.element_size != 0 && address % property.element_size as u64 != 0 {
                return Err(BatchError::MisalignedProperty {
                    name: property.name.clone(),
                    address,
                    element_size: property.element_size,
                });
            }
            if address & u64::from(PER_INSTANCE_FLAG) != 0 || address > u64::from(u32::MAX) {
                return Err(BatchError::MetadataOverflow { address });
            }
            debug!(
                property = %property.name,
                address,
                element_size = property.element_size,
                "assigned property address"
            );
            descriptors.push(ShaderPropertyDescriptor {
                property_id: registry.property_id(&property.name),
                name: property.name.clone(),
                metadata_flag: property.metadata_flag,
                element_size: property.element_size,
                byte_address: address,
            });
        }

        let bytes_per_instance: u64 = sizes.iter().map(|&s| s as u64).sum();
        let layout = BufferLayout {
            properties: descriptors,
            num_instances: n,
            free_space_bytes: free_space,
            stride,
            size_elements: buffer_count_for_instances(bytes_per_instance, n as u64, stride, reserved),
        };

        let required = layout.data_end();
        if required > layout.size_bytes() {
            return Err(BatchError::BufferTooSmall {
                required,
                available: layout.size_bytes(),
            });
        }
        Ok(layout)
    }

    /// Lays out, allocates and fills the instance buffer.
    ///
    /// # Errors
    ///
    /// See [`InstanceBufferPacker::layout`].
    pub fn build(
        &self,
        registry: &mut RenderRegistry,
        settings: &BufferSettings,
    ) -> BatchResult<PackedInstanceBuffer> {
        let layout = self.layout(registry, settings)?;
        let mut bytes = vec![0u8; layout.size_bytes() as usize];

        for (property, descriptor) in self.properties.iter().zip(&layout.properties) {
            if descriptor.element_size == 0 {
                continue;
            }
            // Element-indexed destination, validated aligned by `layout`.
            let element = descriptor.byte_address as usize / descriptor.element_size;
            let start = element * descriptor.element_size;
            bytes[start..start + property.data.len()].copy_from_slice(&property.data);
        }

        let handle = registry.allocate_buffer("instance buffer", layout.size_bytes());
        info!(
            instances = layout.num_instances,
            properties = layout.properties.len(),
            size_bytes = layout.size_bytes(),
            "built instance buffer"
        );

        Ok(PackedInstanceBuffer {
            handle,
            target: settings.target,
            layout,
            bytes,
        })
    }
}

/// Host image of the instance buffer plus its layout.
#[derive(Debug, Clone)]
pub struct PackedInstanceBuffer {
    handle: BufferHandle,
    target: BufferTarget,
    layout: BufferLayout,
    bytes: Vec<u8>,
}

impl PackedInstanceBuffer {
    /// Registry handle of the buffer.
    #[must_use]
    pub const fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Buffer kind.
    #[must_use]
    pub const fn target(&self) -> BufferTarget {
        self.target
    }

    /// Layout the bytes follow.
    #[must_use]
    pub const fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    /// Buffer contents, ready for upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Metadata words to register alongside the buffer handle.
    #[must_use]
    pub fn metadata(&self) -> Vec<MetadataValue> {
        self.layout.metadata()
    }

    /// Reads back one instance's value of a property.
    #[must_use]
    pub fn read<T: Pod>(&self, name: &str, instance: usize) -> Option<T> {
        let property = self.layout.property(name)?;
        if property.element_size != std::mem::size_of::<T>() || instance >= self.layout.num_instances {
            return None;
        }
        let start = property.byte_address as usize + instance * property.element_size;
        let bytes = self.bytes.get(start..start + property.element_size)?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }
}
