//! Receiver registry.
//!
//! Each receiver owns the server's two ends of its queue pair: the
//! reading end of the free queue (slots coming back) and the writing end
//! of the available queue (slots going out). Receivers live in a
//! fixed-capacity array; removed indices go back to a pool and are
//! reused, with a fresh registration id stamped into the new handle.

use crate::borrowed::MAX_RECEIVERS;
use crate::handle::{HandleGroup, ReceiverHandle};

/// Health of a connection to one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Operating normally.
    #[default]
    Ok,
    /// A protocol error was detected; no further queue operations happen.
    Corrupted,
}

/// Server-side state of one receiver.
#[derive(Debug)]
pub struct Receiver<R, W> {
    handle: ReceiverHandle,
    state: ConnectionState,
    free_queue: R,
    available_queue: W,
}

impl<R, W> Receiver<R, W> {
    /// The receiver's handle.
    pub const fn handle(&self) -> ReceiverHandle {
        self.handle
    }

    /// Current connection state.
    pub const fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a protocol error was detected for this receiver.
    pub fn is_corrupted(&self) -> bool {
        self.state == ConnectionState::Corrupted
    }

    /// Mark the connection as corrupted. Irreversible.
    pub fn set_corrupted(&mut self) {
        self.state = ConnectionState::Corrupted;
    }

    /// Reading end of the free queue.
    pub fn free_queue(&mut self) -> &mut R {
        &mut self.free_queue
    }

    /// Writing end of the available queue.
    pub fn available_queue(&mut self) -> &mut W {
        &mut self.available_queue
    }

    /// Give up the queue ends.
    pub fn into_queues(self) -> (R, W) {
        (self.free_queue, self.available_queue)
    }
}

/// Fixed-capacity registry of receivers.
#[derive(Debug)]
pub struct ReceiverManager<R, W> {
    group: HandleGroup,
    receivers: Vec<Option<Receiver<R, W>>>,
    free_indices: Vec<u32>,
    next_id: u32,
}

impl<R, W> ReceiverManager<R, W> {
    /// Create a registry for up to `capacity` receivers.
    ///
    /// Panics if `capacity` exceeds [`MAX_RECEIVERS`].
    pub fn new(capacity: u32) -> Self {
        assert!(
            capacity <= MAX_RECEIVERS,
            "receiver capacity {capacity} exceeds the limit of {MAX_RECEIVERS}"
        );
        Self {
            group: HandleGroup::new(capacity),
            receivers: (0..capacity).map(|_| None).collect(),
            // Popped from the back, so lower indices are handed out first.
            free_indices: (0..capacity).rev().collect(),
            next_id: 0,
        }
    }

    /// Maximum number of receivers.
    pub const fn capacity(&self) -> u32 {
        self.group.bound()
    }

    /// Number of registered receivers.
    pub fn len(&self) -> usize {
        self.receivers.len() - self.free_indices.len()
    }

    /// Whether no receiver is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a receiver. `None` if the registry is full.
    pub fn register_receiver(&mut self, free_queue: R, available_queue: W) -> Option<ReceiverHandle> {
        let index = self.free_indices.pop()?;
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let handle = ReceiverHandle::new(self.group.id(), index, id);
        self.receivers[index as usize] = Some(Receiver {
            handle,
            state: ConnectionState::Ok,
            free_queue,
            available_queue,
        });
        Some(handle)
    }

    /// Remove a receiver, returning it. `None` for an unknown handle.
    pub fn remove_receiver(&mut self, handle: &ReceiverHandle) -> Option<Receiver<R, W>> {
        if !self.is_receiver_handle_valid(handle) {
            return None;
        }
        let receiver = self.receivers[handle.index() as usize].take();
        self.free_indices.push(handle.index());
        receiver
    }

    /// Whether `handle` refers to a currently registered receiver.
    pub fn is_receiver_handle_valid(&self, handle: &ReceiverHandle) -> bool {
        self.group.is_compatible(handle.group(), handle.index())
            && self.receivers[handle.index() as usize]
                .as_ref()
                .is_some_and(|receiver| receiver.handle.id() == handle.id())
    }

    /// A registered receiver.
    pub fn receiver(&self, handle: &ReceiverHandle) -> Option<&Receiver<R, W>> {
        if !self.is_receiver_handle_valid(handle) {
            return None;
        }
        self.receivers[handle.index() as usize].as_ref()
    }

    /// A registered receiver, mutably.
    pub fn receiver_mut(&mut self, handle: &ReceiverHandle) -> Option<&mut Receiver<R, W>> {
        if !self.is_receiver_handle_valid(handle) {
            return None;
        }
        self.receivers[handle.index() as usize].as_mut()
    }

    /// Apply `f` to one receiver. `None` for an unknown handle.
    ///
    /// The registry stays borrowed for the duration of the call, so `f`
    /// cannot register or remove receivers.
    pub fn for_one_receiver<T>(
        &mut self,
        handle: &ReceiverHandle,
        f: impl FnOnce(&mut Receiver<R, W>) -> T,
    ) -> Option<T> {
        self.receiver_mut(handle).map(f)
    }

    /// Apply `f` to every registered receiver, in index order.
    pub fn for_each_receiver(&mut self, mut f: impl FnMut(&mut Receiver<R, W>)) {
        for receiver in self.receivers.iter_mut().flatten() {
            f(receiver);
        }
    }

    /// Iterate over registered receivers.
    pub fn iter(&self) -> impl Iterator<Item = &Receiver<R, W>> {
        self.receivers.iter().flatten()
    }

    /// Handles of all registered receivers, in index order.
    pub fn handles(&self) -> Vec<ReceiverHandle> {
        self.iter().map(Receiver::handle).collect()
    }
}
