//! Handle tables for everything a batch registers with the host renderer.
//!
//! The registry is an ordinary value owned by the composition root and passed
//! by reference to whoever needs to register or release a resource. Handles
//! are generational indices into per-kind slot tables. Released slots are
//! reused, and the generation bump makes a stale handle report a second
//! release or a use after release instead of hitting the new occupant.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace};

use crate::error::{BatchError, BatchResult};
use crate::instancing::MetadataValue;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl $name {
            const fn from_key(key: SlotKey) -> Self {
                Self {
                    index: key.index,
                    generation: key.generation,
                }
            }

            const fn key(self) -> SlotKey {
                SlotKey {
                    index: self.index,
                    generation: self.generation,
                }
            }

            /// Slot index.
            #[must_use]
            pub const fn index(self) -> u32 {
                self.index
            }

            /// How many times the slot was reused before this handle.
            #[must_use]
            pub const fn generation(self) -> u32 {
                self.generation
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.generation == 0 {
                    write!(f, "{} #{}", $kind, self.index)
                } else {
                    write!(f, "{} #{}v{}", $kind, self.index, self.generation)
                }
            }
        }
    };
}

handle!(
    /// A registered mesh.
    MeshHandle,
    "mesh"
);
handle!(
    /// A registered material.
    MaterialHandle,
    "material"
);
handle!(
    /// A registered batch: metadata table plus instance buffer.
    BatchHandle,
    "batch"
);
handle!(
    /// An allocated instance buffer.
    BufferHandle,
    "buffer"
);

/// Interned shader property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId(pub u32);

#[derive(Debug, Clone, Copy)]
struct SlotKey {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
struct SlotTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> SlotTable<T> {
    const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, value: T) -> SlotKey {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return SlotKey {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        SlotKey {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    fn get(&self, key: SlotKey, what: &dyn fmt::Display) -> BatchResult<&T> {
        let slot = self
            .slots
            .get(key.index as usize)
            .ok_or_else(|| BatchError::UnknownHandle {
                resource: what.to_string(),
            })?;
        match &slot.value {
            Some(value) if slot.generation == key.generation => Ok(value),
            _ => Err(BatchError::use_after_dispose(what.to_string())),
        }
    }

    fn remove(&mut self, key: SlotKey, what: &dyn fmt::Display) -> BatchResult<T> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .ok_or_else(|| BatchError::UnknownHandle {
                resource: what.to_string(),
            })?;
        if slot.generation != key.generation {
            return Err(BatchError::already_disposed(what.to_string()));
        }
        let value = slot
            .value
            .take()
            .ok_or_else(|| BatchError::already_disposed(what.to_string()))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        Ok(value)
    }

    fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Instance buffer bookkeeping.
#[derive(Debug, Clone)]
pub struct BufferEntry {
    /// Debug label.
    pub label: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// A batch as the host renderer sees it.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// Property address table.
    pub metadata: Vec<MetadataValue>,
    /// Instance buffer the metadata addresses point into.
    pub buffer: BufferHandle,
}

/// Engine-side handle tables.
#[derive(Debug)]
pub struct RenderRegistry {
    meshes: SlotTable<String>,
    materials: SlotTable<String>,
    buffers: SlotTable<BufferEntry>,
    batches: SlotTable<BatchEntry>,
    properties: HashMap<String, PropertyId>,
}

impl RenderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meshes: SlotTable::new(),
            materials: SlotTable::new(),
            buffers: SlotTable::new(),
            batches: SlotTable::new(),
            properties: HashMap::new(),
        }
    }

    /// Stable id for a shader property name.
    pub fn property_id(&mut self, name: &str) -> PropertyId {
        if let Some(&id) = self.properties.get(name) {
            return id;
        }
        let id = PropertyId(self.properties.len() as u32);
        self.properties.insert(name.to_owned(), id);
        id
    }

    /// Registers an opaque mesh.
    pub fn register_mesh(&mut self, name: impl Into<String>) -> MeshHandle {
        MeshHandle::from_key(self.meshes.insert(name.into()))
    }

    /// Registers an opaque material.
    pub fn register_material(&mut self, name: impl Into<String>) -> MaterialHandle {
        MaterialHandle::from_key(self.materials.insert(name.into()))
    }

    /// Name a mesh was registered with.
    ///
    /// # Errors
    ///
    /// Fails for unknown or released handles.
    pub fn mesh(&self, handle: MeshHandle) -> BatchResult<&str> {
        self.meshes.get(handle.key(), &handle).map(String::as_str)
    }

    /// Name a material was registered with.
    ///
    /// # Errors
    ///
    /// Fails for unknown or released handles.
    pub fn material(&self, handle: MaterialHandle) -> BatchResult<&str> {
        self.materials.get(handle.key(), &handle).map(String::as_str)
    }

    /// Releases a mesh.
    ///
    /// # Errors
    ///
    /// Fails if the mesh was already released.
    pub fn unregister_mesh(&mut self, handle: MeshHandle) -> BatchResult<()> {
        self.meshes.remove(handle.key(), &handle).map(drop)
    }

    /// Releases a material.
    ///
    /// # Errors
    ///
    /// Fails if the material was already released.
    pub fn unregister_material(&mut self, handle: MaterialHandle) -> BatchResult<()> {
        self.materials.remove(handle.key(), &handle).map(drop)
    }

    /// Records a new instance buffer allocation.
    pub fn allocate_buffer(&mut self, label: impl Into<String>, size_bytes: u64) -> BufferHandle {
        let label = label.into();
        let handle = BufferHandle::from_key(self.buffers.insert(BufferEntry {
            label: label.clone(),
            size_bytes,
        }));
        debug!(%handle, %label, size_bytes, "allocated buffer");
        handle
    }

    /// Looks up a live buffer.
    ///
    /// # Errors
    ///
    /// Fails for unknown or released handles.
    pub fn buffer(&self, handle: BufferHandle) -> BatchResult<&BufferEntry> {
        self.buffers.get(handle.key(), &handle)
    }

    /// Releases an instance buffer.
    ///
    /// # Errors
    ///
    /// Fails loudly on a double release.
    pub fn release_buffer(&mut self, handle: BufferHandle) -> BatchResult<()> {
        self.buffers.remove(handle.key(), &handle)?;
        trace!(%handle, "released buffer");
        Ok(())
    }

    /// Registers a batch over a live buffer.
    ///
    /// # Errors
    ///
    /// Fails if `buffer` was released or never allocated.
    pub fn add_batch(
        &mut self,
        metadata: Vec<MetadataValue>,
        buffer: BufferHandle,
    ) -> BatchResult<BatchHandle> {
        self.buffer(buffer)?;
        let handle = BatchHandle::from_key(self.batches.insert(BatchEntry { metadata, buffer }));
        debug!(%handle, %buffer, "registered batch");
        Ok(handle)
    }

    /// Looks up a live batch.
    ///
    /// # Errors
    ///
    /// Fails for unknown or released handles.
    pub fn batch(&self, handle: BatchHandle) -> BatchResult<&BatchEntry> {
        self.batches.get(handle.key(), &handle)
    }

    /// Removes a batch.
    ///
    /// # Errors
    ///
    /// Fails loudly on a double removal.
    pub fn remove_batch(&mut self, handle: BatchHandle) -> BatchResult<()> {
        self.batches.remove(handle.key(), &handle)?;
        trace!(%handle, "removed batch");
        Ok(())
    }

    /// Buffers not yet released.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.live()
    }

    /// Batches not yet removed.
    #[must_use]
    pub fn live_batches(&self) -> usize {
        self.batches.live()
    }

    /// Buffer and batch slots ever allocated, live or free for reuse.
    #[must_use]
    pub fn slot_capacity(&self) -> (usize, usize) {
        (self.buffers.capacity(), self.batches.capacity())
    }
}

impl Default for RenderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
