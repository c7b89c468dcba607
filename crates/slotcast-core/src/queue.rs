//! Queue contracts.
//!
//! Slot indices travel between server and client through single-producer,
//! single-consumer queues living in shared memory. Each queue has exactly
//! one writing end and one reading end, held by different processes.
//!
//! Per receiver there are two queues:
//!
//! ```text
//!            available queue
//!   Server ──────────────────▶ Client     (slots ready to read)
//!          ◀──────────────────
//!              free queue                 (slots handed back)
//! ```
//!
//! Implementations must be non-blocking. A push must publish the index
//! with release semantics and peek/pop must observe it with acquire
//! semantics, so that anything the writer stored before the push is
//! visible to a reader that sees the index.

use crate::error::QueueError;
use crate::handle::SlotIndex;

/// Reading end of a slot-index queue.
pub trait QueueReader {
    /// Look at the oldest index without removing it.
    fn peek(&mut self) -> Result<Option<SlotIndex>, QueueError>;

    /// Remove and return the oldest index.
    fn pop(&mut self) -> Result<Option<SlotIndex>, QueueError>;
}

/// Writing end of a slot-index queue.
pub trait QueueWriter {
    /// Append an index. Returns `Ok(false)` if the queue is full.
    fn push(&mut self, index: SlotIndex) -> Result<bool, QueueError>;
}

impl<T: QueueReader + ?Sized> QueueReader for Box<T> {
    fn peek(&mut self) -> Result<Option<SlotIndex>, QueueError> {
        (**self).peek()
    }

    fn pop(&mut self) -> Result<Option<SlotIndex>, QueueError> {
        (**self).pop()
    }
}

impl<T: QueueWriter + ?Sized> QueueWriter for Box<T> {
    fn push(&mut self, index: SlotIndex) -> Result<bool, QueueError> {
        (**self).push(index)
    }
}
