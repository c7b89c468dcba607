//! Mapped slot memory.
//!
//! A [`SlotRegion`] is one anonymous mapping laid out as:
//!
//! ```text
//! +--------------------------+ 0
//! | visibility word, slot 0  | AtomicU32
//! | visibility word, slot 1  |
//! | ...                      |
//! +--------------------------+ flags_len (64-byte aligned)
//! | payload, slot 0          | slot_size bytes
//! | payload, slot 1          |
//! | ...                      |
//! +--------------------------+
//! ```
//!
//! The server takes the [`WriterSlot`] views once; each client takes its
//! own set of [`ReaderSlot`] views. Setting a visibility word is a
//! `Release` store and reading it an `Acquire` load, so payload bytes
//! written before the flag is set are visible to any reader that sees it.
//!
//! The views hand out plain byte slices over shared memory. Nothing in a
//! view stops a reader slice from living while the writer changes the same
//! bytes, so taking views is `unsafe`: the caller promises to drive them
//! only through a [`Server`](slotcast_core::Server) and its
//! [`Client`](slotcast_core::Client)s, whose slot protocol keeps a slot's
//! payload out of the writer's hands while any reader holds it.

use std::fmt;
use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use memmap2::MmapMut;
use slotcast_core::{ReadableSlot, WritableSlot};
use tracing::{debug, trace};

use crate::error::{RegionError, Result};

const FLAG_SIZE: usize = size_of::<AtomicU32>();
const PAYLOAD_ALIGN: usize = 64;

const HIDDEN: u32 = 0;
const VISIBLE: u32 = 1;

struct RegionInner {
    // Kept alive for `base`; never accessed through the map afterwards.
    _map: MmapMut,
    base: NonNull<u8>,
    slot_count: u32,
    slot_size: usize,
    flags_len: usize,
    writers_taken: AtomicBool,
}

// SAFETY: `base` points into `_map`, which lives as long as the inner
// region. Flag words are only touched atomically. Payload views exist only
// through `writer_slots` and `reader_slots`, whose callers guarantee that
// payload bytes are never written while a reader slice of them is alive.
#[allow(unsafe_code)]
unsafe impl Send for RegionInner {}
#[allow(unsafe_code)]
unsafe impl Sync for RegionInner {}

impl RegionInner {
    #[allow(unsafe_code)]
    fn flag(&self, index: u32) -> &AtomicU32 {
        assert!(index < self.slot_count, "slot {index} outside region");
        // SAFETY: the flag area holds `slot_count` words starting at the
        // page-aligned base, so the pointer is in bounds and aligned.
        unsafe { &*self.base.as_ptr().add(index as usize * FLAG_SIZE).cast::<AtomicU32>() }
    }

    fn payload_ptr(&self, index: u32) -> *mut u8 {
        assert!(index < self.slot_count, "slot {index} outside region");
        self.base
            .as_ptr()
            .wrapping_add(self.flags_len + index as usize * self.slot_size)
    }

    #[allow(unsafe_code)]
    fn payload(&self, index: u32) -> &[u8] {
        // SAFETY: the payload lies within the mapping. No writer touches it
        // while the slice lives, per the contract of `reader_slots`.
        unsafe { slice::from_raw_parts(self.payload_ptr(index), self.slot_size) }
    }

    #[allow(unsafe_code)]
    #[allow(clippy::mut_from_ref)]
    fn payload_mut(&self, index: u32) -> &mut [u8] {
        // SAFETY: only the unique writer view of `index` calls this, through
        // `&mut self`. No reader slice is alive, per the contract of
        // `writer_slots`.
        unsafe { slice::from_raw_parts_mut(self.payload_ptr(index), self.slot_size) }
    }
}

/// Shared slot memory backing one server and its clients.
#[derive(Clone)]
pub struct SlotRegion {
    inner: Arc<RegionInner>,
}

impl fmt::Debug for SlotRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotRegion")
            .field("slot_count", &self.inner.slot_count)
            .field("slot_size", &self.inner.slot_size)
            .finish_non_exhaustive()
    }
}

impl SlotRegion {
    /// Map a region for `slot_count` slots of `slot_size` payload bytes.
    pub fn new(slot_count: u32, slot_size: usize) -> Result<Self> {
        let invalid = || RegionError::InvalidLayout {
            slot_count,
            slot_size,
        };
        if slot_count == 0 || slot_size == 0 {
            return Err(invalid());
        }
        let flags_len = (slot_count as usize * FLAG_SIZE).next_multiple_of(PAYLOAD_ALIGN);
        let total = (slot_count as usize)
            .checked_mul(slot_size)
            .and_then(|payload| payload.checked_add(flags_len))
            .ok_or_else(invalid)?;

        let mut map = MmapMut::map_anon(total)?;
        let base = NonNull::new(map.as_mut_ptr()).ok_or_else(invalid)?;
        debug!("Mapped slot region: {slot_count} slots of {slot_size} bytes ({total} bytes)");

        Ok(Self {
            inner: Arc::new(RegionInner {
                _map: map,
                base,
                slot_count,
                slot_size,
                flags_len,
                writers_taken: AtomicBool::new(false),
            }),
        })
    }

    /// Number of slots.
    pub fn slot_count(&self) -> u32 {
        self.inner.slot_count
    }

    /// Payload bytes per slot.
    pub fn slot_size(&self) -> usize {
        self.inner.slot_size
    }

    /// Take the writable views, one per slot. Succeeds once per region.
    ///
    /// # Safety
    ///
    /// The caller must not write a slot's payload through these views while
    /// a slice returned by a [`ReaderSlot`] of the same slot is alive. Handing
    /// the views to a [`Server`](slotcast_core::Server) whose clients use
    /// this region's reader views satisfies this.
    ///
    /// Taking the views requires `unsafe`:
    ///
    /// ```compile_fail,E0133
    /// let region = slotcast_shm::SlotRegion::new(1, 8).unwrap();
    /// let writers = region.writer_slots();
    /// ```
    #[allow(unsafe_code)]
    pub unsafe fn writer_slots(&self) -> Result<Vec<WriterSlot>> {
        if self.inner.writers_taken.swap(true, Ordering::AcqRel) {
            return Err(RegionError::WritersTaken);
        }
        Ok((0..self.slot_count())
            .map(|index| WriterSlot {
                region: Arc::clone(&self.inner),
                index,
            })
            .collect())
    }

    /// Create a set of read-only views, one per slot.
    ///
    /// # Safety
    ///
    /// A slice returned by a view's `readable_data` must not be alive while
    /// the writer view of the same slot writes its payload. Reading only
    /// slots received through a [`Client`](slotcast_core::Client), and
    /// dropping the slice before releasing the slot, satisfies this.
    ///
    /// Safe code cannot create a reader view that could alias the writer:
    ///
    /// ```compile_fail,E0133
    /// let region = slotcast_shm::SlotRegion::new(1, 8).unwrap();
    /// let readers = region.reader_slots();
    /// ```
    #[allow(unsafe_code)]
    pub unsafe fn reader_slots(&self) -> Vec<ReaderSlot> {
        (0..self.slot_count())
            .map(|index| ReaderSlot {
                region: Arc::clone(&self.inner),
                index,
            })
            .collect()
    }
}

/// Server view of one slot.
pub struct WriterSlot {
    region: Arc<RegionInner>,
    index: u32,
}

impl WriterSlot {
    /// Index of the slot in its region.
    pub const fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Debug for WriterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterSlot")
            .field("index", &self.index)
            .field("visible", &self.is_slot_visible())
            .finish()
    }
}

impl ReadableSlot for WriterSlot {
    fn readable_data(&self) -> &[u8] {
        self.region.payload(self.index)
    }

    fn is_slot_visible(&self) -> bool {
        self.region.flag(self.index).load(Ordering::Acquire) == VISIBLE
    }
}

impl WritableSlot for WriterSlot {
    fn writable_data(&mut self) -> &mut [u8] {
        self.region.payload_mut(self.index)
    }

    fn set_visibility_flag(&mut self) {
        self.region.flag(self.index).store(VISIBLE, Ordering::Release);
    }

    fn clear_visibility_flag(&mut self) {
        self.region.flag(self.index).store(HIDDEN, Ordering::Release);
    }

    fn reset_slot_memory(&mut self) {
        self.writable_data().fill(0);
        self.clear_visibility_flag();
    }

    fn on_send(&mut self) {
        trace!("Sending slot {}", self.index);
    }

    fn on_acquire(&mut self) {
        trace!("Acquired slot {}", self.index);
    }
}

/// Client view of one slot.
pub struct ReaderSlot {
    region: Arc<RegionInner>,
    index: u32,
}

impl ReaderSlot {
    /// Index of the slot in its region.
    pub const fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Debug for ReaderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderSlot")
            .field("index", &self.index)
            .field("visible", &self.is_slot_visible())
            .finish()
    }
}

impl ReadableSlot for ReaderSlot {
    fn readable_data(&self) -> &[u8] {
        self.region.payload(self.index)
    }

    fn is_slot_visible(&self) -> bool {
        self.region.flag(self.index).load(Ordering::Acquire) == VISIBLE
    }
}
