use std::sync::Arc;

use super::{IdentitySlot, ObjectHandle, ObjectSnapshot, SnapshotView, TickFailure};
use crate::error::{Error, Result};
use crate::memory::ReadMemory;
use crate::node::{Node, NodeDescriptor, Parameters, descriptor_for};
use crate::overlay::{Record, decode};
use crate::schema::StructSchema;

/// Per-tick status of a tracked object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectStatus {
    Uninitialized,
    Valid,
    Invalid(TickFailure),
    Cleared,
}

/// Pointer link: the object's address is read from a parent field
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Link {
    pub parent: ObjectHandle,
    pub field: String,
}

/// Working state of one object, owned by the cache
pub(crate) struct TrackedObject {
    pub handle: ObjectHandle,
    pub slot: IdentitySlot,
    /// Zero while a linked object has no resolved address
    pub address: u64,
    pub schema: Arc<StructSchema>,
    pub descriptor: &'static NodeDescriptor,
    pub node: Node,
    pub status: ObjectStatus,
    pub last_valid: Option<Arc<ObjectSnapshot>>,
    /// Derived state must be reset before the next apply
    pub changed: bool,
    pub generation: u64,
    pub link: Option<Link>,
}

impl TrackedObject {
    pub fn new(
        handle: ObjectHandle,
        slot: IdentitySlot,
        address: u64,
        schema: Arc<StructSchema>,
    ) -> Self {
        let descriptor = descriptor_for(&schema.name);
        Self {
            handle,
            slot,
            address,
            schema,
            descriptor,
            node: descriptor.create(),
            status: ObjectStatus::Uninitialized,
            last_valid: None,
            changed: true,
            generation: 0,
            link: None,
        }
    }

    /// Point this identity at a new address and/or schema
    pub fn retarget(&mut self, address: u64, schema: Arc<StructSchema>) {
        if schema.name != self.schema.name {
            self.descriptor = descriptor_for(&schema.name);
            self.node = self.descriptor.create();
        }
        self.schema = schema;
        self.address = address;
        self.changed = true;
    }

    /// Decode, check self-consistency, reset on address change, then apply
    pub fn refresh<R: ReadMemory + ?Sized>(
        &mut self,
        reader: &R,
        params: &Parameters,
        tick: u64,
    ) -> std::result::Result<Arc<ObjectSnapshot>, TickFailure> {
        let record = match self.read_checked(reader) {
            Ok(record) => record,
            Err(e) => {
                if matches!(e, Error::SelfConsistencyFailure { .. }) {
                    self.changed = true;
                }
                let failure = TickFailure::new(tick, self.address, &e);
                self.status = ObjectStatus::Invalid(failure.clone());
                return Err(failure);
            }
        };

        if self.changed {
            self.node.reset();
            self.generation += 1;
            self.changed = false;
        }
        (self.descriptor.apply)(&mut self.node, &record, params);

        let snapshot = Arc::new(ObjectSnapshot {
            handle: self.handle,
            slot: self.slot,
            address: self.address,
            tick,
            generation: self.generation,
            record,
            node: self.node.clone(),
        });
        self.status = ObjectStatus::Valid;
        self.last_valid = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    fn read_checked<R: ReadMemory + ?Sized>(&self, reader: &R) -> Result<Record> {
        let record = decode(reader, &self.schema, self.address)?;

        if let Some(field) = &self.schema.self_field {
            let found = record.address(field).unwrap_or_default();
            if found != self.address {
                return Err(Error::SelfConsistencyFailure {
                    address: self.address,
                    found,
                });
            }
        }

        Ok(record)
    }

    /// Address read from `field` of the latest valid record
    pub fn pointer(&self, field: &str) -> Option<u64> {
        self.last_valid
            .as_ref()
            .and_then(|snapshot| snapshot.record.address(field))
    }

    pub fn view(&self) -> SnapshotView {
        match &self.status {
            ObjectStatus::Uninitialized => SnapshotView::Uninitialized,
            ObjectStatus::Cleared => SnapshotView::Cleared,
            ObjectStatus::Valid => match &self.last_valid {
                Some(snapshot) => SnapshotView::Valid(Arc::clone(snapshot)),
                None => SnapshotView::Uninitialized,
            },
            ObjectStatus::Invalid(failure) => SnapshotView::Stale {
                last: self.last_valid.clone(),
                failure: failure.clone(),
            },
        }
    }
}
