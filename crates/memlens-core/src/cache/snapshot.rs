use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use strum::Display;

use crate::error::Error;
use crate::node::{Node, descriptor_for};
use crate::overlay::Record;

/// Stable reference to a tracked object; never reused within one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObjectHandle(pub(crate) u32);

impl ObjectHandle {
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Consumer-chosen logical identity of a tracked object.
///
/// Re-tracking a slot at a different address is an address change for the
/// object behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IdentitySlot(pub u64);

impl IdentitySlot {
    /// Slot for the `index`-th child of a container slot
    pub fn child(parent: IdentitySlot, index: u32) -> Self {
        let mixed = (parent.0 ^ 0xcbf2_9ce4_8422_2325).wrapping_mul(0x0000_0100_0000_01b3);
        IdentitySlot(mixed.wrapping_add(index as u64 + 1))
    }

    /// Slot derived from a name (FNV-1a)
    pub fn from_name(name: &str) -> Self {
        let hash = name.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
        });
        IdentitySlot(hash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    AddressInvalid,
    AccessDenied,
    PartialRead,
    ReadTooLarge,
    Detached,
    SelfConsistency,
    ProcessExited,
    Other,
}

impl From<&Error> for FailureKind {
    fn from(error: &Error) -> Self {
        match error {
            Error::AddressInvalid { .. } => FailureKind::AddressInvalid,
            Error::AccessDenied { .. } => FailureKind::AccessDenied,
            Error::PartialRead { .. } => FailureKind::PartialRead,
            Error::ReadTooLarge { .. } => FailureKind::ReadTooLarge,
            Error::Detached => FailureKind::Detached,
            Error::SelfConsistencyFailure { .. } => FailureKind::SelfConsistency,
            Error::ProcessExited => FailureKind::ProcessExited,
            _ => FailureKind::Other,
        }
    }
}

/// Why an object is invalid for one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickFailure {
    pub tick: u64,
    pub address: u64,
    pub kind: FailureKind,
    pub message: String,
}

impl TickFailure {
    pub fn new(tick: u64, address: u64, error: &Error) -> Self {
        Self {
            tick,
            address,
            kind: FailureKind::from(error),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for TickFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {}: {}", self.tick, self.message)
    }
}

/// Immutable published state of one object after a successful refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSnapshot {
    pub handle: ObjectHandle,
    pub slot: IdentitySlot,
    pub address: u64,
    pub tick: u64,
    /// Incremented on every address change of the object
    pub generation: u64,
    pub record: Record,
    pub node: Node,
}

impl ObjectSnapshot {
    /// Human-readable rendering through the node registry
    pub fn describe(&self) -> String {
        (descriptor_for(self.record.schema_name()).describe)(&self.node, &self.record)
    }
}

/// What a consumer sees for one handle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SnapshotView {
    Valid(Arc<ObjectSnapshot>),
    /// The latest refresh failed; `last` is the previous valid state, if any
    Stale {
        last: Option<Arc<ObjectSnapshot>>,
        failure: TickFailure,
    },
    Uninitialized,
    Cleared,
}

impl SnapshotView {
    /// Latest valid snapshot, stale or not
    pub fn latest(&self) -> Option<&Arc<ObjectSnapshot>> {
        match self {
            SnapshotView::Valid(snapshot) => Some(snapshot),
            SnapshotView::Stale { last, .. } => last.as_ref(),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, SnapshotView::Valid(_))
    }

    pub fn failure(&self) -> Option<&TickFailure> {
        match self {
            SnapshotView::Stale { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

/// Views of live objects plus the count of handles ever issued.
///
/// Untracked handles keep no entry; any issued handle without one reports
/// `Cleared`.
#[derive(Debug, Default)]
pub(crate) struct SnapshotStore {
    views: RwLock<HashMap<ObjectHandle, SnapshotView>>,
    issued: AtomicU32,
}

impl SnapshotStore {
    /// Issue the next handle and publish it as `Uninitialized`
    pub(crate) fn issue(&self) -> ObjectHandle {
        let mut views = self.views.write();
        let handle = ObjectHandle(self.issued.fetch_add(1, Ordering::AcqRel) + 1);
        views.insert(handle, SnapshotView::Uninitialized);
        handle
    }

    pub(crate) fn get(&self, handle: ObjectHandle) -> Option<SnapshotView> {
        let views = self.views.read();
        match views.get(&handle) {
            Some(view) => Some(view.clone()),
            None if self.was_issued(handle) => Some(SnapshotView::Cleared),
            None => None,
        }
    }

    pub(crate) fn publish(&self, updates: Vec<(ObjectHandle, SnapshotView)>) {
        let mut views = self.views.write();
        for (handle, view) in updates {
            views.insert(handle, view);
        }
    }

    pub(crate) fn remove(&self, handle: ObjectHandle) {
        self.views.write().remove(&handle);
    }

    pub(crate) fn remove_all(&self) {
        self.views.write().clear();
    }

    /// Published entries, live handles only
    pub(crate) fn len(&self) -> usize {
        self.views.read().len()
    }

    fn was_issued(&self, handle: ObjectHandle) -> bool {
        handle.0 != 0 && handle.0 <= self.issued.load(Ordering::Acquire)
    }
}

/// Cloneable read handle on the published snapshots.
///
/// A tick publishes all of its updates under one write lock, so readers see
/// either the previous tick or the new one.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    store: Arc<SnapshotStore>,
}

impl SnapshotReader {
    pub(crate) fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    /// Latest view; `Cleared` for untracked handles, `None` for handles
    /// this cache never issued
    pub fn get(&self, handle: ObjectHandle) -> Option<SnapshotView> {
        self.store.get(handle)
    }

    /// Live handles in ascending order
    pub fn handles(&self) -> Vec<ObjectHandle> {
        let mut handles: Vec<ObjectHandle> = self.store.views.read().keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Every live object with a valid or stale snapshot
    pub fn latest_all(&self) -> Vec<Arc<ObjectSnapshot>> {
        let views = self.store.views.read();
        let mut all: Vec<Arc<ObjectSnapshot>> =
            views.values().filter_map(|view| view.latest().cloned()).collect();
        all.sort_by_key(|snapshot| snapshot.handle);
        all
    }
}

/// Outcome of one refresh pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub refreshed: usize,
    pub failures: Vec<(ObjectHandle, TickFailure)>,
    /// Objects whose pointer link moved them to a new address
    pub retargeted: usize,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_slots_differ() {
        let root = IdentitySlot::from_name("map");
        let a = IdentitySlot::child(root, 0);
        let b = IdentitySlot::child(root, 1);
        assert_ne!(a, b);
        assert_ne!(a, root);
        assert_eq!(a, IdentitySlot::child(root, 0));
        assert_ne!(IdentitySlot::child(a, 0), IdentitySlot::child(b, 0));
    }

    #[test]
    fn test_from_name_is_stable() {
        assert_eq!(IdentitySlot::from_name("a"), IdentitySlot::from_name("a"));
        assert_ne!(IdentitySlot::from_name("a"), IdentitySlot::from_name("b"));
    }

    #[test]
    fn test_failure_kind_mapping() {
        let failure = TickFailure::new(
            3,
            0x1000,
            &Error::SelfConsistencyFailure {
                address: 0x1000,
                found: 0x2000,
            },
        );
        assert_eq!(failure.kind, FailureKind::SelfConsistency);
        assert!(failure.to_string().starts_with("tick 3: "));
        assert_eq!(
            FailureKind::from(&Error::NotAttached),
            FailureKind::Other
        );
    }

    #[test]
    fn test_store_reports_cleared_for_removed_handles() {
        let store = Arc::new(SnapshotStore::default());
        let reader = SnapshotReader::new(Arc::clone(&store));
        let a = store.issue();
        let b = store.issue();
        assert_eq!(a, ObjectHandle(1));
        assert_eq!(b, ObjectHandle(2));
        assert_eq!(reader.get(a), Some(SnapshotView::Uninitialized));

        store.remove(a);
        assert_eq!(reader.get(a), Some(SnapshotView::Cleared));
        assert_eq!(reader.handles(), vec![b]);
        assert_eq!(store.len(), 1);

        store.remove_all();
        assert_eq!(reader.get(b), Some(SnapshotView::Cleared));
        assert_eq!(reader.get(ObjectHandle(0)), None);
        assert_eq!(reader.get(ObjectHandle(3)), None);
        assert!(reader.handles().is_empty());
    }

    #[test]
    fn test_view_accessors() {
        let failure = TickFailure::new(1, 0x10, &Error::Detached);
        let stale = SnapshotView::Stale {
            last: None,
            failure: failure.clone(),
        };
        assert!(!stale.is_valid());
        assert!(stale.latest().is_none());
        assert_eq!(stale.failure(), Some(&failure));
        assert!(SnapshotView::Cleared.failure().is_none());
    }
}
