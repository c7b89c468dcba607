//! Slot ownership.
//!
//! The [`SlotManager`] owns one descriptor per slot together with that
//! slot's single [`SlotToken`]. A token is the only authorization to
//! touch a slot's content or to release/send it. While no caller holds
//! the token it rests inside the manager, so at most one token per slot
//! is ever live.
//!
//! Passing an invalid handle or token is a contract violation and
//! panics. Callers that hold data of unknown provenance (for example an
//! index read from a queue) must go through
//! [`SlotManager::slot_handle_from_index`] first.

use crate::handle::{HandleGroup, SlotHandle, SlotIndex};

/// Move-only capability for one slot.
///
/// Not `Clone`: giving a token away gives the access right away with it.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dropped token leaves its slot unusable until the manager is rebuilt"]
pub struct SlotToken {
    handle: SlotHandle,
}

impl SlotToken {
    pub(crate) const fn new(handle: SlotHandle) -> Self {
        Self { handle }
    }

    /// The slot this token grants access to.
    pub const fn handle(&self) -> SlotHandle {
        self.handle
    }

    /// The slot's queue index.
    pub const fn index(&self) -> SlotIndex {
        self.handle.index()
    }
}

#[derive(Debug)]
struct SlotEntry<D> {
    descriptor: D,
    token: Option<SlotToken>,
}

/// Owner of slot descriptors and their access tokens.
#[derive(Debug)]
pub struct SlotManager<D> {
    group: HandleGroup,
    slots: Vec<SlotEntry<D>>,
}

impl<D> SlotManager<D> {
    /// Create a manager with room for `capacity` slots.
    pub fn new(capacity: u32) -> Self {
        Self {
            group: HandleGroup::new(capacity),
            slots: Vec::with_capacity(capacity as usize),
        }
    }

    /// Add a slot descriptor. Panics if the manager is full.
    pub fn add_slot(&mut self, descriptor: D) -> SlotHandle {
        let index = self.slot_count();
        assert!(
            index < self.capacity(),
            "slot manager capacity of {} exceeded",
            self.capacity()
        );
        let handle = self.group.handle(index);
        self.slots.push(SlotEntry {
            descriptor,
            token: Some(SlotToken::new(handle)),
        });
        handle
    }

    /// Maximum number of slots.
    pub const fn capacity(&self) -> u32 {
        self.group.bound()
    }

    /// Number of slots added so far.
    pub fn slot_count(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Whether every slot has been added.
    pub fn is_full(&self) -> bool {
        self.slot_count() == self.capacity()
    }

    /// The manager's handle group.
    pub const fn group(&self) -> HandleGroup {
        self.group
    }

    /// Whether `handle` refers to an added slot of this manager.
    pub fn is_slot_handle_valid(&self, handle: &SlotHandle) -> bool {
        self.group.is_compatible(handle.group(), handle.index()) && handle.index() < self.slot_count()
    }

    /// Whether `token` belongs to this manager and is currently checked out.
    pub fn is_slot_token_valid(&self, token: &SlotToken) -> bool {
        self.is_slot_handle_valid(&token.handle)
            && self.slots[token.handle.index() as usize].token.is_none()
    }

    /// Resolve a queue-transmitted index to a handle.
    pub fn slot_handle_from_index(&self, index: SlotIndex) -> Option<SlotHandle> {
        (index < self.slot_count()).then(|| self.group.handle(index))
    }

    /// Whether the slot's token is currently held by a caller.
    pub fn is_token_checked_out(&self, handle: &SlotHandle) -> bool {
        self.slots[self.checked_index(handle)].token.is_none()
    }

    /// Descriptor of a slot.
    pub fn slot_descriptor(&self, handle: &SlotHandle) -> &D {
        &self.slots[self.checked_index(handle)].descriptor
    }

    /// Mutable descriptor of a slot.
    pub fn slot_descriptor_mut(&mut self, handle: &SlotHandle) -> &mut D {
        let index = self.checked_index(handle);
        &mut self.slots[index].descriptor
    }

    /// Descriptor of the slot a token grants access to.
    pub fn token_descriptor(&self, token: &SlotToken) -> &D {
        &self.slots[self.checked_token_index(token)].descriptor
    }

    /// Mutable descriptor of the slot a token grants access to.
    pub fn token_descriptor_mut(&mut self, token: &SlotToken) -> &mut D {
        let index = self.checked_token_index(token);
        &mut self.slots[index].descriptor
    }

    /// Check out a slot's token. `None` if it is already checked out.
    pub fn get_slot_access_token(&mut self, handle: &SlotHandle) -> Option<SlotToken> {
        let index = self.checked_index(handle);
        self.slots[index].token.take()
    }

    /// Hand a token back to the manager.
    pub fn return_slot_access_token(&mut self, token: SlotToken) {
        let index = self.checked_token_index(&token);
        self.slots[index].token = Some(token);
    }

    /// Iterate over every slot handle.
    pub fn handles(&self) -> impl Iterator<Item = SlotHandle> + '_ {
        (0..self.slot_count()).map(|index| self.group.handle(index))
    }

    /// Iterate over every descriptor mutably.
    pub fn descriptors_mut(&mut self) -> impl Iterator<Item = &mut D> {
        self.slots.iter_mut().map(|entry| &mut entry.descriptor)
    }

    fn checked_index(&self, handle: &SlotHandle) -> usize {
        assert!(
            self.is_slot_handle_valid(handle),
            "invalid slot handle {handle:?} for {}",
            self.group.id()
        );
        handle.index() as usize
    }

    fn checked_token_index(&self, token: &SlotToken) -> usize {
        assert!(
            self.is_slot_token_valid(token),
            "invalid slot token {:?} for {}",
            token.handle,
            self.group.id()
        );
        token.handle.index() as usize
    }
}
