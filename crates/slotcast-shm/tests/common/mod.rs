//! Shared setup for the integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use slotcast_core::{ClassHandle, ClientBuilder, ReceiverHandle, ServerBuilder, ServerConfig};
use slotcast_shm::{ClientQueues, ShmClient, ShmServer, SlotRegion, connection};
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A server over a fresh region plus its classes.
pub struct Harness {
    pub region: SlotRegion,
    pub server: ShmServer,
    pub classes: Vec<ClassHandle>,
}

impl Harness {
    pub fn new(config: &ServerConfig, slot_size: usize) -> Self {
        init_tracing();
        let region = SlotRegion::new(config.slot_count, slot_size).expect("map region");
        let (mut builder, classes) = ServerBuilder::from_config(config);
        // SAFETY: the views only ever reach a server and clients built here.
        #[allow(unsafe_code)]
        let writers = unsafe { region.writer_slots() }.expect("writer slots");
        for slot in writers {
            builder.add_slot(slot);
        }
        Self {
            region,
            server: builder.build(),
            classes,
        }
    }

    /// Register a receiver in class `class` and build its client.
    pub fn attach(&mut self, class: usize) -> (ReceiverHandle, ShmClient) {
        let (handle, queues) = self.attach_raw(class);
        (handle, self.client(queues))
    }

    /// Register a receiver and return its raw queue ends.
    pub fn attach_raw(&mut self, class: usize) -> (ReceiverHandle, ClientQueues) {
        let (server_queues, client_queues) = connection(self.region.slot_count());
        let handle = self
            .server
            .add_receiver(
                &self.classes[class],
                server_queues.free_queue,
                server_queues.available_queue,
            )
            .expect("receiver capacity");
        (handle, client_queues)
    }

    pub fn client(&self, queues: ClientQueues) -> ShmClient {
        let mut builder = ClientBuilder::new(self.region.slot_count());
        // SAFETY: the views go straight into a client of `self.server`.
        #[allow(unsafe_code)]
        let readers = unsafe { self.region.reader_slots() };
        for slot in readers {
            builder.add_slot(slot);
        }
        builder.with_queues(queues.available_queue, queues.free_queue);
        builder.build()
    }

    /// Acquire a slot, write `payload` into it and send it.
    pub fn publish(&mut self, payload: &[u8]) -> slotcast_core::Result<slotcast_core::DroppedInfo> {
        let token = self.server.acquire_slot().expect("free slot");
        self.server.access_slot_content(&token)[..payload.len()].copy_from_slice(payload);
        let mut dropped = slotcast_core::DroppedInfo::new();
        self.server.send_slot(token, &mut dropped)?;
        Ok(dropped)
    }
}

/// Receive one slot, copy its first `len` bytes out and release it.
pub fn take(client: &mut ShmClient, len: usize) -> Option<Vec<u8>> {
    let token = client.receive_slot().unwrap()?;
    let bytes = client.access_slot_content(&token)[..len].to_vec();
    client.release_slot(token).unwrap();
    Some(bytes)
}
