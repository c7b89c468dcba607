//! Single-producer, single-consumer ring of slot indices.
//!
//! The ring holds monotonically increasing 64-bit head (consumer) and
//! tail (producer) positions plus one `AtomicU32` cell per entry. The
//! producer writes a cell and then publishes it with a `Release` store
//! of the tail; the consumer observes the tail with an `Acquire` load
//! before reading the cell. The same pairing in the other direction
//! hands cells back to the producer.
//!
//! Either end may [`close`](IndexQueueWriter::close) the ring, after
//! which every operation on both ends fails with [`QueueError::Closed`].
//!
//! The ring lives on the heap behind an `Arc`, so both ends must be in the
//! same process. Crossing a process boundary takes a queue laid out in a
//! shared mapping that implements the same traits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use slotcast_core::{QueueError, QueueReader, QueueWriter, SlotIndex};
use tracing::debug;

/// Shared state of one ring.
#[derive(Debug)]
pub struct IndexRing {
    head: AtomicU64,
    tail: AtomicU64,
    closed: AtomicBool,
    cells: Box<[AtomicU32]>,
}

impl IndexRing {
    fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "index ring capacity must be greater than 0");
        Self {
            head: AtomicU64::new(0),
            tail: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            cells: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Maximum number of queued indices.
    pub fn capacity(&self) -> u32 {
        self.cells.len() as u32
    }

    /// Number of queued indices, as seen by an observer.
    pub fn len(&self) -> u32 {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.saturating_sub(head).min(u64::from(self.capacity())) as u32
    }

    /// Whether no index is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether either end closed the ring.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed index ring of capacity {}", self.capacity());
        }
    }

    fn check_open(&self) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    fn cell(&self, position: u64) -> &AtomicU32 {
        &self.cells[(position % self.cells.len() as u64) as usize]
    }

    /// Distance between the positions, rejecting impossible values.
    fn occupancy(&self, head: u64, tail: u64) -> Result<u64, QueueError> {
        let capacity = u64::from(self.capacity());
        match tail.checked_sub(head) {
            Some(used) if used <= capacity => Ok(used),
            _ => Err(QueueError::Corrupted(format!(
                "head {head} and tail {tail} inconsistent with capacity {capacity}"
            ))),
        }
    }

    fn push(&self, index: SlotIndex) -> Result<bool, QueueError> {
        self.check_open()?;
        // Only the producer moves the tail.
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if self.occupancy(head, tail)? == u64::from(self.capacity()) {
            return Ok(false);
        }
        self.cell(tail).store(index, Ordering::Relaxed);
        self.tail.store(tail + 1, Ordering::Release);
        Ok(true)
    }

    fn peek(&self) -> Result<Option<(u64, SlotIndex)>, QueueError> {
        self.check_open()?;
        // Only the consumer moves the head.
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if self.occupancy(head, tail)? == 0 {
            return Ok(None);
        }
        Ok(Some((head, self.cell(head).load(Ordering::Relaxed))))
    }

    fn pop(&self) -> Result<Option<SlotIndex>, QueueError> {
        let Some((head, index)) = self.peek()? else {
            return Ok(None);
        };
        self.head.store(head + 1, Ordering::Release);
        Ok(Some(index))
    }
}

/// Create a ring and split it into its writing and reading ends.
///
/// Panics if `capacity` is zero.
pub fn index_queue(capacity: u32) -> (IndexQueueWriter, IndexQueueReader) {
    let ring = Arc::new(IndexRing::new(capacity));
    (
        IndexQueueWriter {
            ring: Arc::clone(&ring),
        },
        IndexQueueReader { ring },
    )
}

/// Producer end of an [`IndexRing`].
#[derive(Debug)]
pub struct IndexQueueWriter {
    ring: Arc<IndexRing>,
}

impl IndexQueueWriter {
    /// The shared ring.
    pub fn ring(&self) -> &IndexRing {
        &self.ring
    }

    /// Close the ring for both ends.
    pub fn close(&self) {
        self.ring.close();
    }
}

impl QueueWriter for IndexQueueWriter {
    fn push(&mut self, index: SlotIndex) -> Result<bool, QueueError> {
        self.ring.push(index)
    }
}

/// Consumer end of an [`IndexRing`].
#[derive(Debug)]
pub struct IndexQueueReader {
    ring: Arc<IndexRing>,
}

impl IndexQueueReader {
    /// The shared ring.
    pub fn ring(&self) -> &IndexRing {
        &self.ring
    }

    /// Close the ring for both ends.
    pub fn close(&self) {
        self.ring.close();
    }
}

impl QueueReader for IndexQueueReader {
    fn peek(&mut self) -> Result<Option<SlotIndex>, QueueError> {
        Ok(self.ring.peek()?.map(|(_, index)| index))
    }

    fn pop(&mut self) -> Result<Option<SlotIndex>, QueueError> {
        self.ring.pop()
    }
}
