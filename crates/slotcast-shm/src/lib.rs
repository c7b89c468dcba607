//! Shared-memory building blocks for slotcast.
//!
//! This crate supplies implementations of the collaborator traits that
//! `slotcast-core` consumes:
//!
//! - [`ring`]: a lock-free single-producer, single-consumer ring of slot
//!   indices implementing [`QueueReader`](slotcast_core::QueueReader) and
//!   [`QueueWriter`](slotcast_core::QueueWriter). The ring is heap
//!   allocated, so its two ends must live in one process (threads are fine)
//! - [`region`]: an anonymous memory mapping holding each slot's payload
//!   and visibility word, with writer and reader views implementing
//!   [`WritableSlot`](slotcast_core::WritableSlot) and
//!   [`ReadableSlot`](slotcast_core::ReadableSlot)
//!
//! # Example
//!
//! ```rust,ignore
//! use slotcast_core::{ClientBuilder, DroppedInfo, ServerBuilder};
//! use slotcast_shm::{SlotRegion, connection};
//!
//! let region = SlotRegion::new(4, 256)?;
//! let (server_queues, client_queues) = connection(4);
//!
//! let mut builder = ServerBuilder::new(4, 1, 1);
//! // SAFETY: the views are only used by this server and its clients.
//! for slot in unsafe { region.writer_slots() }? {
//!     builder.add_slot(slot);
//! }
//! let class = builder.add_class(4);
//! builder.add_receiver(&class, server_queues.free_queue, server_queues.available_queue);
//! let mut server = builder.build();
//!
//! let mut builder = ClientBuilder::new(4);
//! for slot in unsafe { region.reader_slots() } {
//!     builder.add_slot(slot);
//! }
//! builder.with_queues(client_queues.available_queue, client_queues.free_queue);
//! let mut client = builder.build();
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod region;
pub mod ring;

pub use error::{RegionError, Result};
pub use region::{ReaderSlot, SlotRegion, WriterSlot};
pub use ring::{IndexQueueReader, IndexQueueWriter, IndexRing, index_queue};

use slotcast_core::{Client, Server};

/// Server over a mapped region and index rings.
pub type ShmServer = Server<WriterSlot, IndexQueueReader, IndexQueueWriter>;

/// Client over a mapped region and index rings.
pub type ShmClient = Client<ReaderSlot, IndexQueueReader, IndexQueueWriter>;

/// The server's ends of one receiver's queues.
#[derive(Debug)]
pub struct ServerQueues {
    /// Slots handed back by the client.
    pub free_queue: IndexQueueReader,
    /// Slots published to the client.
    pub available_queue: IndexQueueWriter,
}

/// The client's ends of its queues.
#[derive(Debug)]
pub struct ClientQueues {
    /// Slots published by the server.
    pub available_queue: IndexQueueReader,
    /// Slots handed back to the server.
    pub free_queue: IndexQueueWriter,
}

impl ClientQueues {
    /// Close both queues, as a departing client does.
    pub fn close(&self) {
        self.available_queue.close();
        self.free_queue.close();
    }
}

/// Create the queue pair for one receiver, each sized to `slot_count`.
///
/// A queue sized to the slot count can never fill while the protocol
/// is followed, since a slot is in at most one queue per receiver.
pub fn connection(slot_count: u32) -> (ServerQueues, ClientQueues) {
    let (available_writer, available_reader) = index_queue(slot_count);
    let (free_writer, free_reader) = index_queue(slot_count);
    (
        ServerQueues {
            free_queue: free_reader,
            available_queue: available_writer,
        },
        ClientQueues {
            available_queue: available_reader,
            free_queue: free_writer,
        },
    )
}
