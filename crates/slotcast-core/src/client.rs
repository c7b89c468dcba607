//! Consumer side of the slot protocol.
//!
//! A client never trusts a queue entry on its own: it peeks an index,
//! checks that the slot's visibility flag is set, and only then pops.
//! The popped index must match the peeked one. Anything unexpected puts
//! the whole client into the corrupted state, after which no queue
//! operation is attempted again.

use tracing::{debug, trace, warn};

use crate::descriptor::ReadableSlot;
use crate::error::{Error, Result};
use crate::queue::{QueueReader, QueueWriter};
use crate::receiver::ConnectionState;
use crate::slot::{SlotManager, SlotToken};

/// Receives slots from one server.
///
/// Created through [`crate::ClientBuilder`].
#[derive(Debug)]
pub struct Client<D, R, W> {
    slots: SlotManager<D>,
    available_queue: R,
    free_queue: W,
    state: ConnectionState,
}

impl<D, R, W> Client<D, R, W>
where
    D: ReadableSlot,
    R: QueueReader,
    W: QueueWriter,
{
    pub(crate) const fn from_parts(slots: SlotManager<D>, available_queue: R, free_queue: W) -> Self {
        Self {
            slots,
            available_queue,
            free_queue,
            state: ConnectionState::Ok,
        }
    }

    /// Take the next published slot, if one is ready.
    ///
    /// `Ok(None)` means nothing is queued or the queued slot is not yet
    /// visible; calling again later is the retry.
    pub fn receive_slot(&mut self) -> Result<Option<SlotToken>> {
        if self.is_corrupted() {
            return Err(Error::Corrupted);
        }
        self.try_receive().map_err(|err| self.corrupt(err))
    }

    fn try_receive(&mut self) -> Result<Option<SlotToken>> {
        let Some(index) = self.available_queue.peek()? else {
            return Ok(None);
        };
        let slot = self
            .slots
            .slot_handle_from_index(index)
            .ok_or(Error::InvalidSlotIndex(index))?;
        if !self.slots.slot_descriptor(&slot).is_slot_visible() {
            trace!("Slot {index} queued but not yet visible");
            return Ok(None);
        }

        let popped = self.available_queue.pop()?;
        if popped != Some(index) {
            return Err(Error::IndexMismatch {
                peeked: index,
                popped,
            });
        }
        let token = self
            .slots
            .get_slot_access_token(&slot)
            .ok_or(Error::DuplicateReception(index))?;
        debug!("Received slot {index}");
        Ok(Some(token))
    }

    /// Payload of a received slot.
    pub fn access_slot_content(&self, token: &SlotToken) -> &[u8] {
        self.slots.token_descriptor(token).readable_data()
    }

    /// Hand a received slot back to the server.
    ///
    /// The token is consumed even when the connection is corrupted.
    /// Panics if the token is not currently held, or if the free queue
    /// is full: it is sized to the slot count, so that cannot happen
    /// while the protocol is intact.
    pub fn release_slot(&mut self, token: SlotToken) -> Result<()> {
        let index = token.index();
        self.slots.return_slot_access_token(token);
        if self.is_corrupted() {
            return Err(Error::Corrupted);
        }

        let pushed = match self.free_queue.push(index) {
            Ok(pushed) => pushed,
            Err(err) => return Err(self.corrupt(err.into())),
        };
        assert!(pushed, "free queue full while releasing slot {index}");
        debug!("Released slot {index}");
        Ok(())
    }

    /// Stop all further queue operations.
    pub fn set_communication_error(&mut self) {
        if !self.is_corrupted() {
            self.state = ConnectionState::Corrupted;
            warn!("Client connection marked corrupted by caller");
        }
    }

    /// Current connection state.
    pub const fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a protocol error was detected.
    pub fn is_corrupted(&self) -> bool {
        self.state == ConnectionState::Corrupted
    }

    /// Number of slots.
    pub fn slot_count(&self) -> u32 {
        self.slots.slot_count()
    }

    fn corrupt(&mut self, err: Error) -> Error {
        self.state = ConnectionState::Corrupted;
        warn!("Client connection corrupted: {err}");
        err
    }
}
