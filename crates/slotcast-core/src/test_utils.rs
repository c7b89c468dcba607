//! In-process stand-ins for queues and slot descriptors.
//!
//! Both ends of a [`TestQueue`] share one `VecDeque`, and the two views
//! of a [`TestSlot`] pair share one visibility flag, which is enough to
//! drive a server and a client against each other in a single thread.
//! Failures can be injected to exercise the protocol-error paths.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use tracing::Level;

use crate::descriptor::{ReadableSlot, WritableSlot};
use crate::error::QueueError;
use crate::handle::SlotIndex;
use crate::queue::{QueueReader, QueueWriter};

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<SlotIndex>,
    capacity: usize,
    fail_next: Option<QueueError>,
    pop_override: Option<Option<SlotIndex>>,
    operations: usize,
}

/// Bounded FIFO whose clones all refer to the same queue.
#[derive(Debug, Clone)]
pub(crate) struct TestQueue(Rc<RefCell<QueueState>>);

impl TestQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self(Rc::new(RefCell::new(QueueState {
            capacity,
            ..QueueState::default()
        })))
    }

    /// Append without going through the writer contract.
    pub(crate) fn inject(&self, index: SlotIndex) {
        self.0.borrow_mut().items.push_back(index);
    }

    pub(crate) fn contents(&self) -> Vec<SlotIndex> {
        self.0.borrow().items.iter().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    /// Make the next operation fail with `err`.
    pub(crate) fn fail_next(&self, err: QueueError) {
        self.0.borrow_mut().fail_next = Some(err);
    }

    /// Make the next pop return `result` without touching the contents.
    pub(crate) fn override_next_pop(&self, result: Option<SlotIndex>) {
        self.0.borrow_mut().pop_override = Some(result);
    }

    /// Number of peek/pop/push calls observed.
    pub(crate) fn operations(&self) -> usize {
        self.0.borrow().operations
    }

    fn begin(&self) -> Result<(), QueueError> {
        let mut state = self.0.borrow_mut();
        state.operations += 1;
        state.fail_next.take().map_or(Ok(()), Err)
    }
}

impl QueueReader for TestQueue {
    fn peek(&mut self) -> Result<Option<SlotIndex>, QueueError> {
        self.begin()?;
        Ok(self.0.borrow().items.front().copied())
    }

    fn pop(&mut self) -> Result<Option<SlotIndex>, QueueError> {
        self.begin()?;
        let mut state = self.0.borrow_mut();
        if let Some(result) = state.pop_override.take() {
            return Ok(result);
        }
        Ok(state.items.pop_front())
    }
}

impl QueueWriter for TestQueue {
    fn push(&mut self, index: SlotIndex) -> Result<bool, QueueError> {
        self.begin()?;
        let mut state = self.0.borrow_mut();
        if state.items.len() >= state.capacity {
            return Ok(false);
        }
        state.items.push_back(index);
        Ok(true)
    }
}

/// Slot descriptor with a visibility flag shared between clones of the pair.
#[derive(Debug)]
pub(crate) struct TestSlot {
    pub(crate) data: Vec<u8>,
    visible: Rc<Cell<bool>>,
    pub(crate) sends: u32,
    pub(crate) acquires: u32,
    pub(crate) resets: u32,
}

impl TestSlot {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            data: vec![0xEE; size],
            visible: Rc::new(Cell::new(false)),
            sends: 0,
            acquires: 0,
            resets: 0,
        }
    }

    /// A second view sharing this slot's visibility flag.
    pub(crate) fn peer(&self) -> Self {
        Self {
            data: vec![0; self.data.len()],
            visible: Rc::clone(&self.visible),
            sends: 0,
            acquires: 0,
            resets: 0,
        }
    }
}

impl ReadableSlot for TestSlot {
    fn readable_data(&self) -> &[u8] {
        &self.data
    }

    fn is_slot_visible(&self) -> bool {
        self.visible.get()
    }
}

impl WritableSlot for TestSlot {
    fn writable_data(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn set_visibility_flag(&mut self) {
        self.visible.set(true);
    }

    fn clear_visibility_flag(&mut self) {
        self.visible.set(false);
    }

    fn reset_slot_memory(&mut self) {
        self.data.fill(0);
        self.visible.set(false);
        self.resets += 1;
    }

    fn on_send(&mut self) {
        self.sends += 1;
    }

    fn on_acquire(&mut self) {
        self.acquires += 1;
    }
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return everything it logged.
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .without_time()
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().map(|bytes| bytes.clone()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}
