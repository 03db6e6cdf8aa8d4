//! Byte layout of per-instance properties inside the shared buffer.
//!
//! ```text
//! 0             free_space        a1 = a0 + s0*n     a2 = a1 + s1*n
//! | reserved    | property 0      | property 1       | property 2 | ... |
//! ```
//!
//! Addresses are plain byte offsets. The total is rounded down to 16 bytes
//! before being expressed in stride units, so callers must reserve enough
//! free space that the truncation never reaches real data.

use bytemuck::{Pod, Zeroable};

use crate::registry::PropertyId;

/// Metadata flag marking a property as one value per instance.
pub const PER_INSTANCE_FLAG: u32 = 0x8000_0000;

/// Rounds a byte count down to a multiple of 16.
#[inline]
#[must_use]
pub const fn align16(bytes: u64) -> u64 {
    bytes & !15
}

/// Buffer length in stride-sized elements for `num_instances` instances of
/// `bytes_per_instance` bytes plus `extra_bytes` of reserved space.
#[must_use]
pub const fn buffer_count_for_instances(
    bytes_per_instance: u64,
    num_instances: u64,
    stride: u64,
    extra_bytes: u64,
) -> u64 {
    align16(bytes_per_instance * num_instances + extra_bytes) / stride
}

/// Sequential, non-overlapping byte addresses for properties of the given
/// element sizes, starting right after `free_space` reserved bytes.
#[must_use]
pub fn property_addresses(element_sizes: &[usize], num_instances: usize, free_space: u64) -> Vec<u64> {
    let mut next = free_space;
    element_sizes
        .iter()
        .map(|&size| {
            let address = next;
            next += (size * num_instances) as u64;
            address
        })
        .collect()
}

/// One 32-bit metadata word per property, keyed by property id.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MetadataValue {
    /// Interned property name.
    pub name_id: u32,
    /// `metadata_flag | byte_address`.
    pub value: u32,
}

impl MetadataValue {
    /// Byte address encoded in the word.
    #[must_use]
    pub const fn address(&self) -> u32 {
        self.value & !PER_INSTANCE_FLAG
    }

    /// Whether the property holds one value per instance.
    #[must_use]
    pub const fn is_per_instance(&self) -> bool {
        self.value & PER_INSTANCE_FLAG != 0
    }
}

/// A laid-out property. `byte_address` never changes after the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPropertyDescriptor {
    /// Property name.
    pub name: String,
    /// Interned id of `name`.
    pub property_id: PropertyId,
    /// High-bit flags or'ed into the metadata word.
    pub metadata_flag: u32,
    /// Bytes per element.
    pub element_size: usize,
    /// Start of this property's region in the buffer.
    pub byte_address: u64,
}

impl ShaderPropertyDescriptor {
    /// Metadata word for the GPU.
    #[must_use]
    pub const fn metadata(&self) -> MetadataValue {
        MetadataValue {
            name_id: self.property_id.0,
            value: self.metadata_flag | self.byte_address as u32,
        }
    }

    /// Bytes spanned for `num_instances` instances.
    #[must_use]
    pub const fn region_len(&self, num_instances: usize) -> u64 {
        (self.element_size * num_instances) as u64
    }
}

/// The authoritative map from logical property to physical offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferLayout {
    /// Properties in packing order.
    pub properties: Vec<ShaderPropertyDescriptor>,
    /// Instances per property.
    pub num_instances: usize,
    /// Bytes reserved before the first property.
    pub free_space_bytes: u64,
    /// Bytes per buffer element.
    pub stride: u64,
    /// Buffer length in stride units.
    pub size_elements: u64,
}

impl BufferLayout {
    /// Buffer length in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_elements * self.stride
    }

    /// Sum of element sizes of all properties.
    #[must_use]
    pub fn bytes_per_instance(&self) -> u64 {
        self.properties.iter().map(|p| p.element_size as u64).sum()
    }

    /// End of the last property's region.
    #[must_use]
    pub fn data_end(&self) -> u64 {
        self.properties
            .last()
            .map_or(self.free_space_bytes, |p| {
                p.byte_address + p.region_len(self.num_instances)
            })
    }

    /// Metadata words in packing order.
    #[must_use]
    pub fn metadata(&self) -> Vec<MetadataValue> {
        self.properties.iter().map(ShaderPropertyDescriptor::metadata).collect()
    }

    /// Looks a property up by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&ShaderPropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align16_rounds_down() {
        assert_eq!(align16(0), 0);
        assert_eq!(align16(15), 0);
        assert_eq!(align16(16), 16);
        assert_eq!(align16(1023), 1008);
    }

    #[test]
    fn test_addresses_are_tightly_packed() {
        let sizes = [48, 48, 4];
        let n = 1000;
        let addresses = property_addresses(&sizes, n, 96);

        assert_eq!(addresses, vec![96, 96 + 48_000, 96 + 96_000]);
        for (i, window) in addresses.windows(2).enumerate() {
            assert_eq!(window[1], window[0] + (sizes[i] * n) as u64);
        }
    }

    #[test]
    fn test_buffer_count() {
        // 100 bytes per instance, 10 instances, 96 reserved -> 1096 -> 1088 bytes
        assert_eq!(buffer_count_for_instances(100, 10, 4, 96), 272);
        assert_eq!(buffer_count_for_instances(0, 0, 4, 0), 0);
        assert_eq!(align16(100 * 10 + 96) % 16, 0);
    }

    #[test]
    fn test_metadata_word() {
        let descriptor = ShaderPropertyDescriptor {
            name: "_Height".to_owned(),
            property_id: PropertyId(5),
            metadata_flag: PER_INSTANCE_FLAG,
            element_size: 4,
            byte_address: 192,
        };
        let word = descriptor.metadata();
        assert_eq!(word.name_id, 5);
        assert_eq!(word.value, 0x8000_00C0);
        assert_eq!(word.address(), 192);
        assert!(word.is_per_instance());
    }
}
