//! Receiver classes and their slot limits.
//!
//! Receivers are grouped into classes. A class caps how many distinct
//! slots its members may hold at once; a slot held by two members of the
//! same class counts once. The count is maintained incrementally: on
//! acquire, the slot only needs counting if no other member already holds
//! it (`slot & members` is empty), and on release it is uncounted when the
//! last member lets go.

use tracing::debug;

use super::bitmap::{BorrowedBitmap, MAX_RECEIVERS};
use crate::handle::{ClassHandle, HandleGroup};

/// Outcome of trying to give a slot to a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverSlotAcquisition {
    /// The receiver now holds the slot.
    NotLimited,
    /// The receiver's class is at its limit; nothing changed.
    ClassLimited(ClassHandle),
}

/// A rate-limiting group of receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverClass {
    class_limit: u32,
    slots_held: u32,
    members: BorrowedBitmap,
}

impl ReceiverClass {
    /// Create an empty class allowing `class_limit` concurrently held slots.
    pub const fn new(class_limit: u32) -> Self {
        Self {
            class_limit,
            slots_held: 0,
            members: BorrowedBitmap::EMPTY,
        }
    }

    /// Maximum number of slots the class may hold at once.
    pub const fn class_limit(&self) -> u32 {
        self.class_limit
    }

    /// Number of distinct slots held by members right now.
    pub const fn slots_held(&self) -> u32 {
        self.slots_held
    }

    /// Receiver membership set.
    pub const fn members(&self) -> BorrowedBitmap {
        self.members
    }

    /// Whether the receiver belongs to this class.
    pub const fn is_member(&self, receiver: u32) -> bool {
        self.members.is_receiver_set(receiver)
    }

    fn add_member(&mut self, receiver: u32) {
        self.members.set_receiver(receiver);
    }

    fn remove_member(&mut self, receiver: u32) {
        self.members.clear_receiver(receiver);
    }

    /// Set the receiver's flag in `slot` if the class limit allows it.
    ///
    /// Returns `false` (and leaves everything untouched) when the class is
    /// at its limit and the slot is not yet held by another member.
    fn acquire(&mut self, receiver: u32, slot: &mut BorrowedBitmap) -> bool {
        if slot.is_receiver_set(receiver) {
            return true;
        }
        if !slot.intersects(self.members) {
            if self.slots_held >= self.class_limit {
                return false;
            }
            self.slots_held += 1;
        }
        slot.set_receiver(receiver);
        true
    }

    fn release(&mut self, receiver: u32, slot: &mut BorrowedBitmap) {
        if !slot.is_receiver_set(receiver) {
            return;
        }
        slot.clear_receiver(receiver);
        if !slot.intersects(self.members) {
            debug_assert!(self.slots_held > 0, "class slot count underflow");
            self.slots_held = self.slots_held.saturating_sub(1);
        }
    }
}

/// Owner of all receiver classes and the receiver→class mapping.
#[derive(Debug)]
pub struct ClassManager {
    group: HandleGroup,
    classes: Vec<ReceiverClass>,
    receiver_classes: [Option<ClassHandle>; MAX_RECEIVERS as usize],
}

impl ClassManager {
    /// Create a manager with room for `capacity` classes.
    pub fn new(capacity: u32) -> Self {
        Self {
            group: HandleGroup::new(capacity),
            classes: Vec::with_capacity(capacity as usize),
            receiver_classes: [None; MAX_RECEIVERS as usize],
        }
    }

    /// Create a class. Panics if the manager is full.
    pub fn create_class(&mut self, class_limit: u32) -> ClassHandle {
        let index = self.class_count();
        assert!(
            index < self.group.bound(),
            "class manager capacity of {} exceeded",
            self.group.bound()
        );
        self.classes.push(ReceiverClass::new(class_limit));
        self.group.handle(index)
    }

    /// Number of classes created so far.
    pub fn class_count(&self) -> u32 {
        self.classes.len() as u32
    }

    /// Maximum number of classes.
    pub const fn capacity(&self) -> u32 {
        self.group.bound()
    }

    /// Whether `handle` refers to a created class of this manager.
    pub fn is_class_handle_valid(&self, handle: &ClassHandle) -> bool {
        self.group.is_compatible(handle.group(), handle.index())
            && handle.index() < self.class_count()
    }

    /// A class by handle.
    pub fn class(&self, handle: &ClassHandle) -> &ReceiverClass {
        &self.classes[self.checked_index(handle)]
    }

    /// Iterate over all class handles.
    pub fn class_handles(&self) -> impl Iterator<Item = ClassHandle> + '_ {
        (0..self.class_count()).map(|index| self.group.handle(index))
    }

    /// Put a receiver into a class.
    ///
    /// The receiver must not be registered already.
    pub fn register_receiver(&mut self, receiver: u32, class: &ClassHandle) {
        let index = self.checked_index(class);
        let entry = &mut self.receiver_classes[Self::receiver_slot(receiver)];
        assert!(entry.is_none(), "receiver {receiver} registered twice");
        *entry = Some(*class);
        self.classes[index].add_member(receiver);
        debug!("Receiver {} joined class {}", receiver, class.index());
    }

    /// Take a receiver out of its class.
    ///
    /// The caller must already have released every slot the receiver
    /// held; otherwise the class keeps counting them.
    pub fn remove_receiver(&mut self, receiver: u32) {
        if let Some(class) = self.receiver_classes[Self::receiver_slot(receiver)].take() {
            self.classes[class.index() as usize].remove_member(receiver);
        }
    }

    /// Class of a registered receiver.
    pub fn class_of(&self, receiver: u32) -> Option<ClassHandle> {
        self.receiver_classes[Self::receiver_slot(receiver)]
    }

    /// Give `slot` to `receiver`, subject to its class limit.
    ///
    /// A receiver that already holds the slot is reported as not limited.
    /// Panics if the receiver is not registered.
    pub fn acquire_receiver_slot(
        &mut self,
        receiver: u32,
        slot: &mut BorrowedBitmap,
    ) -> ReceiverSlotAcquisition {
        let class = self.registered_class(receiver);
        if self.classes[class.index() as usize].acquire(receiver, slot) {
            ReceiverSlotAcquisition::NotLimited
        } else {
            ReceiverSlotAcquisition::ClassLimited(class)
        }
    }

    /// Take `slot` away from `receiver`. No-op if it does not hold it.
    pub fn release_receiver_slot(&mut self, receiver: u32, slot: &mut BorrowedBitmap) {
        let class = self.registered_class(receiver);
        self.classes[class.index() as usize].release(receiver, slot);
    }

    #[allow(clippy::panic)]
    fn registered_class(&self, receiver: u32) -> ClassHandle {
        let Some(class) = self.class_of(receiver) else {
            panic!("receiver {receiver} is not registered with a class");
        };
        class
    }

    fn receiver_slot(receiver: u32) -> usize {
        assert!(
            receiver < MAX_RECEIVERS,
            "receiver index {receiver} exceeds the limit of {MAX_RECEIVERS}"
        );
        receiver as usize
    }

    fn checked_index(&self, handle: &ClassHandle) -> usize {
        assert!(
            self.is_class_handle_valid(handle),
            "invalid class handle {handle:?} for {}",
            self.group.id()
        );
        handle.index() as usize
    }
}
