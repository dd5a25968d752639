//! Remote object cache
//!
//! Owns the lifecycle of tracked objects keyed by address. Each tick every
//! object is re-read through the overlay reader, self-checked, reset when its
//! address changed, recomputed, and published as an immutable snapshot.
//! Failures stay local to the object and tick they happened in.

mod object;
mod snapshot;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::ReadMemory;
use crate::node::Parameters;
use crate::schema::{DecodeKind, StructSchema};

use object::{Link, TrackedObject};
pub use object::ObjectStatus;
pub use snapshot::*;

pub struct RemoteObjectCache {
    objects: BTreeMap<ObjectHandle, TrackedObject>,
    by_address: HashMap<u64, ObjectHandle>,
    by_slot: HashMap<IdentitySlot, ObjectHandle>,
    tick: u64,
    store: Arc<SnapshotStore>,
}

impl Default for RemoteObjectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteObjectCache {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            by_address: HashMap::new(),
            by_slot: HashMap::new(),
            tick: 0,
            store: Arc::new(SnapshotStore::default()),
        }
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(Arc::clone(&self.store))
    }

    /// Completed refresh passes
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn handle_at(&self, address: u64) -> Option<ObjectHandle> {
        self.by_address.get(&address).copied()
    }

    pub fn handle_for(&self, slot: IdentitySlot) -> Option<ObjectHandle> {
        self.by_slot.get(&slot).copied()
    }

    pub fn status(&self, handle: ObjectHandle) -> Option<&ObjectStatus> {
        self.objects.get(&handle).map(|object| &object.status)
    }

    /// Start tracking `address` for `slot`.
    ///
    /// A slot that already tracks a different address (or schema) is moved,
    /// which counts as an address change. An address tracked under another
    /// slot is rejected with `AlreadyTracked`.
    pub fn track(
        &mut self,
        address: u64,
        schema: Arc<StructSchema>,
        slot: IdentitySlot,
    ) -> Result<ObjectHandle> {
        if address == 0 {
            return Err(Error::AddressInvalid { address });
        }

        if let Some(&handle) = self.by_slot.get(&slot) {
            self.retarget(handle, address, Some(schema))?;
            return Ok(handle);
        }

        if let Some(&other) = self.by_address.get(&address) {
            return Err(Error::AlreadyTracked {
                address,
                handle: other.0,
            });
        }

        let handle = self.insert(address, schema, slot);
        debug!("Tracking {} at {:#x} as {}", handle, address, slot.0);
        Ok(handle)
    }

    /// Track an object whose address is read from an address field of `parent`.
    ///
    /// The child resolves immediately when the parent already has a valid
    /// record, and follows the pointer after every later tick.
    pub fn follow(
        &mut self,
        parent: ObjectHandle,
        field: &str,
        schema: Arc<StructSchema>,
        slot: IdentitySlot,
    ) -> Result<ObjectHandle> {
        let parent_object = self.objects.get(&parent).ok_or(Error::UnknownObject(parent.0))?;
        match parent_object.schema.field(field) {
            Some(def) if def.kind == DecodeKind::Address => {}
            _ => {
                return Err(Error::SchemaMismatch {
                    schema: parent_object.schema.name.clone(),
                    reason: format!("no address field '{}' to follow", field),
                });
            }
        }
        let target = parent_object.pointer(field).unwrap_or(0);
        let link = Link {
            parent,
            field: field.to_string(),
        };

        let handle = match self.by_slot.get(&slot) {
            Some(&handle) => {
                if target != 0 {
                    self.retarget(handle, target, Some(schema))?;
                } else if let Some(object) = self.objects.get_mut(&handle) {
                    let address = object.address;
                    object.retarget(address, schema);
                }
                handle
            }
            None => {
                let address = match self.by_address.get(&target) {
                    Some(_) => 0,
                    None => target,
                };
                self.insert(address, schema, slot)
            }
        };

        if let Some(object) = self.objects.get_mut(&handle) {
            object.link = Some(link);
        }
        debug!("{} follows {}.{}", handle, parent, field);
        Ok(handle)
    }

    /// Signal that the object now represents a different logical entity
    pub fn mark_changed(&mut self, handle: ObjectHandle) -> Result<()> {
        let object = self
            .objects
            .get_mut(&handle)
            .ok_or(Error::UnknownObject(handle.0))?;
        object.changed = true;
        Ok(())
    }

    /// Stop tracking; the handle reports `Cleared` from now on
    pub fn untrack(&mut self, handle: ObjectHandle) -> Result<()> {
        let object = self
            .objects
            .remove(&handle)
            .ok_or(Error::UnknownObject(handle.0))?;
        if object.address != 0 {
            self.by_address.remove(&object.address);
        }
        self.by_slot.remove(&object.slot);
        self.store.remove(handle);
        Ok(())
    }

    /// Drop every object (attach/detach boundary)
    pub fn clear(&mut self) {
        self.objects.clear();
        self.by_address.clear();
        self.by_slot.clear();
        self.store.remove_all();
        debug!("Object cache cleared");
    }

    pub fn snapshot(&self, handle: ObjectHandle) -> Result<SnapshotView> {
        if let Some(object) = self.objects.get(&handle) {
            return Ok(object.view());
        }
        self.store.get(handle).ok_or(Error::UnknownObject(handle.0))
    }

    /// One full refresh pass over every tracked object.
    ///
    /// Pointer links are re-evaluated after all refreshes, so a moved child
    /// is read at its new address on the next pass.
    pub fn refresh<R: ReadMemory + ?Sized>(&mut self, reader: &R, params: &Parameters) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        let mut report = TickReport {
            tick,
            ..Default::default()
        };
        let mut published = Vec::with_capacity(self.objects.len());

        for object in self.objects.values_mut() {
            if object.address == 0 {
                continue;
            }
            match object.refresh(reader, params, tick) {
                Ok(_) => report.refreshed += 1,
                Err(failure) => {
                    debug!("{} invalid this tick: {}", object.handle, failure.message);
                    report.failures.push((object.handle, failure));
                }
            }
            published.push((object.handle, object.view()));
        }

        report.retargeted = self.update_links();

        self.store.publish(published);

        report
    }

    fn insert(&mut self, address: u64, schema: Arc<StructSchema>, slot: IdentitySlot) -> ObjectHandle {
        let handle = self.store.issue();

        if address != 0 {
            self.by_address.insert(address, handle);
        }
        self.by_slot.insert(slot, handle);
        self.objects
            .insert(handle, TrackedObject::new(handle, slot, address, schema));
        handle
    }

    fn retarget(
        &mut self,
        handle: ObjectHandle,
        address: u64,
        schema: Option<Arc<StructSchema>>,
    ) -> Result<()> {
        if let Some(&other) = self.by_address.get(&address) {
            if other != handle {
                return Err(Error::AlreadyTracked {
                    address,
                    handle: other.0,
                });
            }
        }

        let object = self
            .objects
            .get_mut(&handle)
            .ok_or(Error::UnknownObject(handle.0))?;
        let schema = schema.unwrap_or_else(|| Arc::clone(&object.schema));
        if object.address == address && object.schema.name == schema.name {
            return Ok(());
        }

        if object.address != 0 {
            self.by_address.remove(&object.address);
        }
        debug!(
            "{} moved from {:#x} to {:#x}",
            handle, object.address, address
        );
        object.retarget(address, schema);
        self.by_address.insert(address, handle);
        Ok(())
    }

    /// Follow every pointer link; returns how many objects moved
    fn update_links(&mut self) -> usize {
        let moves: Vec<(ObjectHandle, u64)> = self
            .objects
            .values()
            .filter_map(|object| {
                let link = object.link.as_ref()?;
                let target = self.objects.get(&link.parent)?.pointer(&link.field)?;
                (target != 0 && target != object.address).then_some((object.handle, target))
            })
            .collect();

        let mut moved = 0;
        for (handle, target) in moves {
            match self.retarget(handle, target, None) {
                Ok(()) => moved += 1,
                Err(e) => debug!("{} keeps its address: {}", handle, e),
            }
        }
        moved
    }
}
