//! Error types for slot messaging.
//!
//! Only the recoverable tier lives here. Contract violations (invalid
//! handles or tokens, capacity overrun, incomplete builders, a full free
//! queue) panic instead of returning an error.

use thiserror::Error;

use crate::handle::{ReceiverHandle, SlotIndex};

/// Errors reported by queue implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue has been closed by either side.
    #[error("queue closed")]
    Closed,

    /// The queue's shared state failed a consistency check.
    #[error("queue corrupted: {0}")]
    Corrupted(String),
}

/// Errors that can occur while exchanging slots.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying queue reported an error.
    #[error("queue operation failed: {0}")]
    Queue(#[from] QueueError),

    /// The index popped from a queue differs from the index peeked just before.
    #[error("popped slot index {popped:?} does not match peeked index {peeked}")]
    IndexMismatch {
        /// Index returned by peek.
        peeked: SlotIndex,
        /// Index returned by the following pop.
        popped: Option<SlotIndex>,
    },

    /// A queue carried an index outside the slot manager's bounds.
    #[error("slot index {0} is out of bounds")]
    InvalidSlotIndex(SlotIndex),

    /// A slot arrived while the previous reception of it is still held.
    #[error("slot {0} received while still held by this client")]
    DuplicateReception(SlotIndex),

    /// A receiver returned a slot it was never given.
    #[error("receiver {} released slot {slot} it does not hold", receiver.index())]
    UnheldSlotReleased {
        /// Receiver that sent the index.
        receiver: ReceiverHandle,
        /// Index it sent back.
        slot: SlotIndex,
    },

    /// A receiver's available queue had no room for a slot it was admitted for.
    #[error("available queue full while sending slot {0}")]
    QueueFull(SlotIndex),

    /// The connection was already corrupted; nothing was attempted.
    #[error("connection is corrupted")]
    Corrupted,

    /// A slot was sent while no receiver was registered.
    #[error("no receivers registered")]
    NoReceivers,
}

impl Error {
    /// Whether this error is a detected protocol violation by the peer.
    ///
    /// Protocol violations move the affected connection into
    /// [`crate::ConnectionState::Corrupted`]. The remaining variants
    /// report a condition without changing any connection state.
    pub const fn is_protocol_violation(&self) -> bool {
        !matches!(self, Self::Corrupted | Self::NoReceivers)
    }
}

/// Result type for slot messaging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A slot count of zero was configured.
    #[error("slot_count must be greater than 0")]
    NoSlots,

    /// The receiver limit is outside `1..=MAX_RECEIVERS`.
    #[error("max_receivers must be between 1 and {max}, got {value}")]
    ReceiverLimit {
        /// Configured value.
        value: u32,
        /// Largest supported value.
        max: u32,
    },

    /// No receiver class was configured.
    #[error("at least one receiver class is required")]
    NoClasses,

    /// A class was configured with a limit of zero.
    #[error("class {0} has a limit of 0")]
    ZeroClassLimit(usize),
}
