//! Typed, group-scoped handles.
//!
//! Every manager in this crate owns a [`HandleGroup`]: a process-unique
//! [`GroupId`] plus an upper bound on indices. Handles minted by a manager
//! carry the group id, so a handle from one manager instance is rejected
//! by another even when the index happens to be in range.
//!
//! Handles never own anything. They are plain `Copy` values that must be
//! validated against their manager before use.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Index of a slot as transmitted through the shared-memory queues.
pub type SlotIndex = u32;

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of the manager instance a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    /// Allocate a fresh, process-unique group id.
    pub fn next() -> Self {
        Self(NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value, for diagnostics.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Marker for handles that reference slots.
#[derive(Debug)]
pub enum SlotTag {}

/// Marker for handles that reference receiver classes.
#[derive(Debug)]
pub enum ClassTag {}

/// Marker for handles that reference receivers.
#[derive(Debug)]
pub enum ReceiverTag {}

/// A validated-on-use reference into a manager's index space.
///
/// `Tag` only distinguishes handle kinds at compile time.
pub struct Handle<Tag> {
    group: GroupId,
    index: u32,
    _tag: PhantomData<fn() -> Tag>,
}

impl<Tag> Handle<Tag> {
    pub(crate) const fn new(group: GroupId, index: u32) -> Self {
        Self {
            group,
            index,
            _tag: PhantomData,
        }
    }

    /// Group the handle was minted in.
    pub const fn group(&self) -> GroupId {
        self.group
    }

    /// Index within the group.
    pub const fn index(&self) -> u32 {
        self.index
    }
}

impl<Tag> Clone for Handle<Tag> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag> Copy for Handle<Tag> {}

impl<Tag> PartialEq for Handle<Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group && self.index == other.index
    }
}

impl<Tag> Eq for Handle<Tag> {}

impl<Tag> Hash for Handle<Tag> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group.hash(state);
        self.index.hash(state);
    }
}

impl<Tag> fmt::Debug for Handle<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("group", &self.group.0)
            .field("index", &self.index)
            .finish()
    }
}

/// Handle to a slot owned by a [`crate::SlotManager`].
pub type SlotHandle = Handle<SlotTag>;

/// Handle to a [`crate::borrowed::ReceiverClass`] owned by a
/// [`crate::borrowed::ClassManager`].
pub type ClassHandle = Handle<ClassTag>;

/// Handle to a registered receiver.
///
/// Receiver indices are recycled after removal, so the handle also carries
/// the registration id of the receiver it was issued for. The id is not
/// unique over the lifetime of the process; it only has to differ from the
/// id of whichever receiver reuses the index next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverHandle {
    handle: Handle<ReceiverTag>,
    id: u32,
}

impl ReceiverHandle {
    pub(crate) const fn new(group: GroupId, index: u32, id: u32) -> Self {
        Self {
            handle: Handle::new(group, index),
            id,
        }
    }

    /// Group the handle was minted in.
    pub const fn group(&self) -> GroupId {
        self.handle.group()
    }

    /// Index of the receiver; also its bit position in a borrow bitmap.
    pub const fn index(&self) -> u32 {
        self.handle.index()
    }

    /// Registration id used to detect reuse of the index.
    pub const fn id(&self) -> u32 {
        self.id
    }
}

/// Group id plus index bound of one manager instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleGroup {
    id: GroupId,
    bound: u32,
}

impl HandleGroup {
    /// Create a group with a fresh id covering indices `0..bound`.
    pub fn new(bound: u32) -> Self {
        Self {
            id: GroupId::next(),
            bound,
        }
    }

    /// The group's id.
    pub const fn id(&self) -> GroupId {
        self.id
    }

    /// Exclusive upper bound on indices in this group.
    pub const fn bound(&self) -> u32 {
        self.bound
    }

    /// Whether a handle with this group id and index belongs here.
    pub fn is_compatible(&self, group: GroupId, index: u32) -> bool {
        group == self.id && index < self.bound
    }

    /// Mint a handle for `index`.
    ///
    /// Panics if `index` is outside the group's bound.
    pub fn handle<Tag>(&self, index: u32) -> Handle<Tag> {
        assert!(
            index < self.bound,
            "handle index {index} outside group bound {}",
            self.bound
        );
        Handle::new(self.id, index)
    }

    /// Mint a handle only if `index` is within bound.
    pub fn try_handle<Tag>(&self, index: u32) -> Option<Handle<Tag>> {
        (index < self.bound).then(|| Handle::new(self.id, index))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_group_ids_are_unique() {
        let a = GroupId::next();
        let b = GroupId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_compatibility_requires_group_and_bound() {
        let group = HandleGroup::new(4);
        let other = HandleGroup::new(4);

        let h: SlotHandle = group.handle(3);
        assert!(group.is_compatible(h.group(), h.index()));
        assert!(!other.is_compatible(h.group(), h.index()));
        assert!(!group.is_compatible(h.group(), 4));
    }

    #[test]
    fn test_try_handle_out_of_bound() {
        let group = HandleGroup::new(2);
        assert!(group.try_handle::<SlotTag>(1).is_some());
        assert!(group.try_handle::<SlotTag>(2).is_none());
    }

    #[test]
    #[should_panic(expected = "outside group bound")]
    fn test_handle_out_of_bound_panics() {
        let group = HandleGroup::new(2);
        let _: ClassHandle = group.handle(2);
    }

    #[test]
    fn test_receiver_handle_equality_includes_id() {
        let group = HandleGroup::new(8);
        let a = ReceiverHandle::new(group.id(), 1, 10);
        let b = ReceiverHandle::new(group.id(), 1, 11);
        assert_ne!(a, b);
        assert_eq!(a.index(), b.index());
    }

    #[test]
    fn test_handles_hash_by_value() {
        use std::collections::HashSet;

        let group = HandleGroup::new(8);
        let mut set: HashSet<SlotHandle> = HashSet::new();
        set.insert(group.handle(1));
        set.insert(group.handle(1));
        set.insert(group.handle(2));
        assert_eq!(set.len(), 2);
    }
}
