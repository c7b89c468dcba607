//! Borrow accounting.
//!
//! Tracks, per slot, whether the sender and which receivers currently hold
//! it, and enforces each receiver class's limit on concurrently held
//! slots.
//!
//! - [`BorrowedBitmap`]: one 64-bit word per slot (sender flag + 63 receivers)
//! - [`ReceiverClass`] / [`ClassManager`]: class limits and membership
//! - [`BorrowedManager`]: slot bitmaps plus the class manager

pub mod bitmap;
pub mod class;
pub mod manager;

pub use bitmap::{BorrowedBitmap, MAX_RECEIVERS, SENDER_BIT};
pub use class::{ClassManager, ReceiverClass, ReceiverSlotAcquisition};
pub use manager::BorrowedManager;
