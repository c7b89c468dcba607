//! Zero-copy slot messaging between one writer and many readers.
//!
//! A server publishes fixed-size slots living in shared memory to any
//! number of independently paced clients. Payload bytes are never
//! copied: only slot indices travel through per-client queues, and a
//! global visibility flag per slot tells readers when the payload may be
//! read.
//!
//! This crate decides *who may touch which slot, when*:
//!
//! - **Handles** ([`handle`]): typed, copyable indices scoped to a
//!   process-unique group
//! - **Slot ownership** ([`SlotManager`], [`SlotToken`]): one move-only
//!   token per slot is the only authorization to access it
//! - **Borrow accounting** ([`borrowed`]): a 64-bit bitmap per slot
//!   records the sender and up to [`MAX_RECEIVERS`] receivers, and
//!   receiver classes cap how many slots their members hold at once
//! - **Receivers** ([`ReceiverManager`]): each receiver's queue ends and
//!   connection state
//! - **Protocol** ([`Server`], [`Client`]): acquire, send, reclaim,
//!   receive and release
//!
//! Queues and slot memory are supplied by the caller through the
//! [`QueueReader`], [`QueueWriter`], [`ReadableSlot`] and
//! [`WritableSlot`] traits.
//!
//! # Errors
//!
//! A misbehaving peer produces a typed [`Error`] and moves that peer's
//! connection to [`ConnectionState::Corrupted`]; every other peer keeps
//! working. Misuse of the API itself (a stale handle, a token from
//! another manager, an incomplete builder) panics.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotcast_core::{ClientBuilder, DroppedInfo, ServerBuilder};
//!
//! let mut builder = ServerBuilder::new(4, 1, 1);
//! for slot in writer_slots {
//!     builder.add_slot(slot);
//! }
//! let class = builder.add_class(4);
//! builder.add_receiver(&class, free_reader, available_writer);
//! let mut server = builder.build();
//!
//! let token = server.acquire_slot().expect("a free slot");
//! server.access_slot_content(&token)[..5].copy_from_slice(b"hello");
//! server.send_slot(token, &mut DroppedInfo::new())?;
//!
//! if let Some(token) = client.receive_slot()? {
//!     assert_eq!(&client.access_slot_content(&token)[..5], b"hello");
//!     client.release_slot(token)?;
//! }
//! server.reclaim_slots()?;
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::must_use_candidate)]

pub mod borrowed;
pub mod builder;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod queue;
pub mod receiver;
pub mod server;
pub mod slot;

#[cfg(test)]
mod test_utils;

pub use borrowed::{BorrowedBitmap, BorrowedManager, MAX_RECEIVERS, ReceiverSlotAcquisition};
pub use builder::{ClientBuilder, ServerBuilder};
pub use client::Client;
pub use config::{ClientConfig, ServerConfig};
pub use descriptor::{ReadableSlot, WritableSlot};
pub use error::{ConfigError, Error, QueueError, Result};
pub use handle::{ClassHandle, GroupId, HandleGroup, ReceiverHandle, SlotHandle, SlotIndex};
pub use queue::{QueueReader, QueueWriter};
pub use receiver::{ConnectionState, Receiver, ReceiverManager};
pub use server::{DroppedInfo, Server, ServerStats};
pub use slot::{SlotManager, SlotToken};
