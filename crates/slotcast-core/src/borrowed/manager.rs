//! Borrow tracking for all slots of one server.

use super::bitmap::BorrowedBitmap;
use super::class::{ClassManager, ReceiverClass, ReceiverSlotAcquisition};
use crate::handle::{ClassHandle, HandleGroup, ReceiverHandle, SlotHandle};

/// Tracks which party holds which slot and applies class limits.
///
/// This is a cache of the acquire/release calls made against it, not an
/// independent source of truth: every acquire must be paired with the
/// matching release by the caller.
#[derive(Debug)]
pub struct BorrowedManager {
    slot_group: HandleGroup,
    slots: Vec<BorrowedBitmap>,
    classes: ClassManager,
    next_send_slot: u32,
}

impl BorrowedManager {
    /// Track every slot of `slot_group`, with room for `class_capacity` classes.
    pub fn new(slot_group: HandleGroup, class_capacity: u32) -> Self {
        Self {
            slot_group,
            slots: vec![BorrowedBitmap::EMPTY; slot_group.bound() as usize],
            classes: ClassManager::new(class_capacity),
            next_send_slot: 0,
        }
    }

    /// Number of tracked slots.
    pub fn slot_count(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Find a slot nobody holds and give it to the sender.
    ///
    /// The scan starts after the previously acquired slot so that slots
    /// are reused round-robin.
    pub fn acquire_send_slot(&mut self) -> Option<SlotHandle> {
        let count = self.slot_count();
        let start = self.next_send_slot;
        let index = (0..count)
            .map(|offset| (start + offset) % count)
            .find(|&index| self.slots[index as usize].is_empty())?;

        self.slots[index as usize].set_sender();
        self.next_send_slot = (index + 1) % count;
        Some(self.slot_group.handle(index))
    }

    /// Take a slot back from the sender. Panics if the sender does not hold it.
    pub fn release_send_slot(&mut self, slot: &SlotHandle) {
        let bitmap = self.bitmap_mut(slot);
        assert!(
            bitmap.is_sender_set(),
            "slot {} released by sender without being acquired",
            slot.index()
        );
        bitmap.clear_sender();
    }

    /// Whether the sender holds the slot.
    pub fn is_slot_borrowed_by_sender(&self, slot: &SlotHandle) -> bool {
        self.bitmap(slot).is_sender_set()
    }

    /// Give a slot to a receiver, subject to its class limit.
    pub fn acquire_receiver_slot(
        &mut self,
        receiver: &ReceiverHandle,
        slot: &SlotHandle,
    ) -> ReceiverSlotAcquisition {
        let index = self.checked_index(slot);
        self.classes
            .acquire_receiver_slot(receiver.index(), &mut self.slots[index])
    }

    /// Take a slot back from a receiver. No-op if it does not hold it.
    pub fn release_receiver_slot(&mut self, receiver: &ReceiverHandle, slot: &SlotHandle) {
        let index = self.checked_index(slot);
        self.classes
            .release_receiver_slot(receiver.index(), &mut self.slots[index]);
    }

    /// Whether a receiver holds the slot.
    pub fn is_slot_borrowed_by_receiver(&self, receiver: &ReceiverHandle, slot: &SlotHandle) -> bool {
        self.bitmap(slot).is_receiver_set(receiver.index())
    }

    /// Whether nobody, sender or receiver, holds the slot.
    pub fn is_slot_free(&self, slot: &SlotHandle) -> bool {
        self.bitmap(slot).is_empty()
    }

    /// Borrow flags of a slot.
    pub fn slot_bitmap(&self, slot: &SlotHandle) -> BorrowedBitmap {
        self.bitmap(slot)
    }

    /// Slots currently held by a receiver.
    pub fn slots_borrowed_by_receiver(&self, receiver: &ReceiverHandle) -> Vec<SlotHandle> {
        (0..self.slot_count())
            .filter(|&index| self.slots[index as usize].is_receiver_set(receiver.index()))
            .map(|index| self.slot_group.handle(index))
            .collect()
    }

    /// Number of slots nobody holds.
    pub fn free_slot_count(&self) -> u32 {
        self.slots.iter().filter(|bitmap| bitmap.is_empty()).count() as u32
    }

    /// Create a receiver class.
    pub fn create_class(&mut self, class_limit: u32) -> ClassHandle {
        self.classes.create_class(class_limit)
    }

    /// Put a receiver into a class.
    pub fn register_receiver(&mut self, receiver: &ReceiverHandle, class: &ClassHandle) {
        self.classes.register_receiver(receiver.index(), class);
    }

    /// Take a receiver out of its class.
    ///
    /// Every slot the receiver held must have been released first.
    pub fn remove_receiver(&mut self, receiver: &ReceiverHandle) {
        debug_assert!(
            self.slots_borrowed_by_receiver(receiver).is_empty(),
            "receiver {} removed while still holding slots",
            receiver.index()
        );
        self.classes.remove_receiver(receiver.index());
    }

    /// Class of a registered receiver.
    pub fn class_of(&self, receiver: &ReceiverHandle) -> Option<ClassHandle> {
        self.classes.class_of(receiver.index())
    }

    /// A class by handle.
    pub fn class(&self, class: &ClassHandle) -> &ReceiverClass {
        self.classes.class(class)
    }

    /// The underlying class manager.
    pub const fn classes(&self) -> &ClassManager {
        &self.classes
    }

    fn bitmap(&self, slot: &SlotHandle) -> BorrowedBitmap {
        self.slots[self.checked_index(slot)]
    }

    fn bitmap_mut(&mut self, slot: &SlotHandle) -> &mut BorrowedBitmap {
        let index = self.checked_index(slot);
        &mut self.slots[index]
    }

    fn checked_index(&self, slot: &SlotHandle) -> usize {
        assert!(
            self.slot_group.is_compatible(slot.group(), slot.index()),
            "invalid slot handle {slot:?} for borrow tracking"
        );
        slot.index() as usize
    }
}
