//! Producer side of the slot protocol.
//!
//! A slot moves through `Free → acquired by the sender → sent to 0..N
//! receivers → reclaimed → Free`. The server tracks each step in its
//! [`BorrowedManager`] and only clears a slot's visibility flag once
//! nobody holds it any more.
//!
//! A failure on one receiver's queue corrupts that receiver only; the
//! other receivers keep operating.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::borrowed::{BorrowedManager, ReceiverSlotAcquisition};
use crate::descriptor::WritableSlot;
use crate::error::{Error, Result};
use crate::handle::{ClassHandle, ReceiverHandle};
use crate::queue::{QueueReader, QueueWriter};
use crate::receiver::{ConnectionState, Receiver, ReceiverManager};
use crate::slot::{SlotManager, SlotToken};

/// Classes that dropped a slot during [`Server::send_slot`].
///
/// Each class appears at most once, in the order it first dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DroppedInfo {
    classes: Vec<ClassHandle>,
}

impl DroppedInfo {
    /// Empty record.
    pub const fn new() -> Self {
        Self {
            classes: Vec::new(),
        }
    }

    /// Record a dropping class. Returns `false` if it was already recorded.
    pub fn record(&mut self, class: ClassHandle) -> bool {
        if self.contains(&class) {
            return false;
        }
        self.classes.push(class);
        true
    }

    /// Whether `class` dropped a slot.
    pub fn contains(&self, class: &ClassHandle) -> bool {
        self.classes.contains(class)
    }

    /// Recorded classes.
    pub fn iter(&self) -> impl Iterator<Item = &ClassHandle> {
        self.classes.iter()
    }

    /// Number of recorded classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether nothing was dropped.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Forget all recorded classes.
    pub fn clear(&mut self) {
        self.classes.clear();
    }
}

impl<'a> IntoIterator for &'a DroppedInfo {
    type Item = &'a ClassHandle;
    type IntoIter = std::slice::Iter<'a, ClassHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.classes.iter()
    }
}

/// Point-in-time view of a server's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    /// Total slots.
    pub slot_count: u32,
    /// Slots held by nobody.
    pub free_slots: u32,
    /// Registered receivers.
    pub receivers: u32,
    /// Registered receivers in the corrupted state.
    pub corrupted_receivers: u32,
}

/// Publishes slots to any number of receivers.
///
/// Created through [`crate::ServerBuilder`]. Not internally synchronized:
/// drive it from one thread.
#[derive(Debug)]
pub struct Server<D, R, W> {
    slots: SlotManager<D>,
    borrowed: BorrowedManager,
    receivers: ReceiverManager<R, W>,
}

impl<D, R, W> Server<D, R, W>
where
    D: WritableSlot,
    R: QueueReader,
    W: QueueWriter,
{
    pub(crate) const fn from_parts(
        slots: SlotManager<D>,
        borrowed: BorrowedManager,
        receivers: ReceiverManager<R, W>,
    ) -> Self {
        Self {
            slots,
            borrowed,
            receivers,
        }
    }

    /// Take a free slot for writing. `None` if every slot is in use.
    #[allow(clippy::panic)]
    pub fn acquire_slot(&mut self) -> Option<SlotToken> {
        let slot = self.borrowed.acquire_send_slot()?;
        let Some(token) = self.slots.get_slot_access_token(&slot) else {
            panic!("slot {} is unborrowed but its token is checked out", slot.index());
        };
        self.slots.slot_descriptor_mut(&slot).on_acquire();
        debug!("Acquired slot {}", slot.index());
        Some(token)
    }

    /// Payload of an acquired slot.
    pub fn access_slot_content(&mut self, token: &SlotToken) -> &mut [u8] {
        self.slots.token_descriptor_mut(token).writable_data()
    }

    /// Give an acquired slot back without sending it.
    pub fn unacquire_slot(&mut self, token: SlotToken) {
        let slot = token.handle();
        self.slots.return_slot_access_token(token);
        self.borrowed.release_send_slot(&slot);
        if self.borrowed.is_slot_free(&slot) {
            self.slots.slot_descriptor_mut(&slot).clear_visibility_flag();
        }
        debug!("Unacquired slot {}", slot.index());
    }

    /// Send an acquired slot to every healthy receiver.
    ///
    /// Receivers whose class is at its limit are skipped and their class
    /// is recorded in `dropped`. A queue failure corrupts that receiver
    /// and the send continues with the rest. The token is consumed in
    /// every case.
    ///
    /// Returns [`Error::NoReceivers`] if no receiver was registered.
    pub fn send_slot(&mut self, token: SlotToken, dropped: &mut DroppedInfo) -> Result<()> {
        let slot = token.handle();
        assert!(
            self.slots.is_slot_token_valid(&token),
            "invalid slot token {slot:?} passed to send_slot"
        );
        assert!(
            self.borrowed.is_slot_borrowed_by_sender(&slot),
            "slot {} sent without being acquired",
            slot.index()
        );
        self.slots.token_descriptor_mut(&token).on_send();

        let had_receivers = !self.receivers.is_empty();
        let Self {
            slots,
            borrowed,
            receivers,
        } = self;
        let mut visible = false;
        let mut delivered = 0u32;

        receivers.for_each_receiver(|receiver| {
            if receiver.is_corrupted() {
                return;
            }
            let handle = receiver.handle();
            if let ReceiverSlotAcquisition::ClassLimited(class) =
                borrowed.acquire_receiver_slot(&handle, &slot)
            {
                if dropped.record(class) {
                    debug!(
                        "Class {} at its limit, dropping slot {}",
                        class.index(),
                        slot.index()
                    );
                }
                return;
            }

            if !visible {
                slots.slot_descriptor_mut(&slot).set_visibility_flag();
                visible = true;
            }

            let err = match receiver.available_queue().push(slot.index()) {
                Ok(true) => {
                    delivered += 1;
                    return;
                }
                Ok(false) => Error::QueueFull(slot.index()),
                Err(e) => Error::Queue(e),
            };
            borrowed.release_receiver_slot(&handle, &slot);
            receiver.set_corrupted();
            warn!("Receiver {} corrupted while sending: {err}", handle.index());
        });

        borrowed.release_send_slot(&slot);
        if borrowed.is_slot_free(&slot) {
            slots.slot_descriptor_mut(&slot).clear_visibility_flag();
        }
        slots.return_slot_access_token(token);

        if !had_receivers {
            debug!("Slot {} sent with no receivers registered", slot.index());
            return Err(Error::NoReceivers);
        }
        debug!("Sent slot {} to {delivered} receivers", slot.index());
        Ok(())
    }

    /// Collect every slot the healthy receivers have handed back.
    ///
    /// All receivers are drained even if one of them misbehaves; the
    /// first protocol error is returned afterwards and each offending
    /// receiver is corrupted.
    pub fn reclaim_slots(&mut self) -> Result<()> {
        let Self {
            slots,
            borrowed,
            receivers,
        } = self;
        let mut first_error = None;

        receivers.for_each_receiver(|receiver| {
            if receiver.is_corrupted() {
                return;
            }
            match reclaim_from(receiver, borrowed, slots) {
                Ok(0) => {}
                Ok(count) => debug!(
                    "Reclaimed {count} slots from receiver {}",
                    receiver.handle().index()
                ),
                Err(err) => {
                    receiver.set_corrupted();
                    warn!(
                        "Receiver {} corrupted while reclaiming: {err}",
                        receiver.handle().index()
                    );
                    first_error.get_or_insert(err);
                }
            }
        });

        first_error.map_or(Ok(()), Err)
    }

    /// Register a receiver in `class`. `None` if the receiver limit is reached.
    pub fn add_receiver(
        &mut self,
        class: &ClassHandle,
        free_queue: R,
        available_queue: W,
    ) -> Option<ReceiverHandle> {
        assert!(
            self.borrowed.classes().is_class_handle_valid(class),
            "invalid class handle {class:?} passed to add_receiver"
        );
        let Some(handle) = self.receivers.register_receiver(free_queue, available_queue) else {
            warn!(
                "Receiver limit of {} reached, registration refused",
                self.receivers.capacity()
            );
            return None;
        };
        self.borrowed.register_receiver(&handle, class);
        info!(
            "Registered receiver {} in class {}",
            handle.index(),
            class.index()
        );
        Some(handle)
    }

    /// Remove a receiver and release every slot it held.
    ///
    /// Returns `false` for an unknown handle. The peer must have stopped
    /// touching shared memory: its slots may be reused immediately.
    pub fn remove_receiver(&mut self, handle: &ReceiverHandle) -> bool {
        if self.receivers.remove_receiver(handle).is_none() {
            return false;
        }
        let held = self.borrowed.slots_borrowed_by_receiver(handle);
        for slot in &held {
            self.borrowed.release_receiver_slot(handle, slot);
            if self.borrowed.is_slot_free(slot) {
                self.slots.slot_descriptor_mut(slot).clear_visibility_flag();
            }
        }
        self.borrowed.remove_receiver(handle);
        info!(
            "Removed receiver {}, released {} slots",
            handle.index(),
            held.len()
        );
        true
    }

    /// Mark a receiver corrupted. Returns `false` for an unknown handle.
    pub fn set_communication_error(&mut self, handle: &ReceiverHandle) -> bool {
        self.receivers
            .for_one_receiver(handle, |receiver| {
                if !receiver.is_corrupted() {
                    receiver.set_corrupted();
                    warn!("Receiver {} marked corrupted by caller", handle.index());
                }
            })
            .is_some()
    }

    /// Connection state of a receiver. `None` for an unknown handle.
    pub fn receiver_connection_state(&self, handle: &ReceiverHandle) -> Option<ConnectionState> {
        self.receivers
            .receiver(handle)
            .map(Receiver::connection_state)
    }

    /// Class of a receiver. `None` for an unknown handle.
    pub fn receiver_class(&self, handle: &ReceiverHandle) -> Option<ClassHandle> {
        if !self.receivers.is_receiver_handle_valid(handle) {
            return None;
        }
        self.borrowed.class_of(handle)
    }

    /// Number of registered receivers.
    pub fn receiver_count(&self) -> usize {
        self.receivers.len()
    }

    /// Slots currently held by members of `class`.
    pub fn class_slots_held(&self, class: &ClassHandle) -> u32 {
        self.borrowed.class(class).slots_held()
    }

    /// Configured limit of `class`.
    pub fn class_limit(&self, class: &ClassHandle) -> u32 {
        self.borrowed.class(class).class_limit()
    }

    /// Number of slots.
    pub fn slot_count(&self) -> u32 {
        self.slots.slot_count()
    }

    /// Borrow tracking state.
    pub const fn borrowed(&self) -> &BorrowedManager {
        &self.borrowed
    }

    /// Occupancy snapshot.
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            slot_count: self.slots.slot_count(),
            free_slots: self.borrowed.free_slot_count(),
            receivers: self.receivers.len() as u32,
            corrupted_receivers: self
                .receivers
                .iter()
                .filter(|receiver| receiver.is_corrupted())
                .count() as u32,
        }
    }
}

/// Pop one receiver's free queue to exhaustion, releasing each slot.
fn reclaim_from<D, R, W>(
    receiver: &mut Receiver<R, W>,
    borrowed: &mut BorrowedManager,
    slots: &mut SlotManager<D>,
) -> Result<u32>
where
    D: WritableSlot,
    R: QueueReader,
{
    let handle = receiver.handle();
    let mut reclaimed = 0;
    while let Some(index) = receiver.free_queue().pop()? {
        let slot = slots
            .slot_handle_from_index(index)
            .ok_or(Error::InvalidSlotIndex(index))?;
        if !borrowed.is_slot_borrowed_by_receiver(&handle, &slot) {
            return Err(Error::UnheldSlotReleased {
                receiver: handle,
                slot: index,
            });
        }
        borrowed.release_receiver_slot(&handle, &slot);
        if borrowed.is_slot_free(&slot) {
            slots.slot_descriptor_mut(&slot).clear_visibility_flag();
        }
        reclaimed += 1;
    }
    Ok(reclaimed)
}
