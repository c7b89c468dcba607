//! Step-by-step construction of servers and clients.
//!
//! Both builders are sized up front, then filled with one descriptor per
//! slot (and, for servers, one limit per class and any initial
//! receivers). `build` consumes the builder and panics if a required
//! piece is missing, since an incomplete setup is a programming error.

use tracing::info;

use crate::borrowed::BorrowedManager;
use crate::client::Client;
use crate::config::{ClientConfig, ServerConfig};
use crate::descriptor::{ReadableSlot, WritableSlot};
use crate::handle::{ClassHandle, ReceiverHandle, SlotHandle};
use crate::queue::{QueueReader, QueueWriter};
use crate::receiver::ReceiverManager;
use crate::server::Server;
use crate::slot::SlotManager;

/// Builder for [`Server`].
///
/// # Example
///
/// ```ignore
/// let mut builder = ServerBuilder::new(2, 4, 1);
/// builder.add_slot(first);
/// builder.add_slot(second);
/// let class = builder.add_class(1);
/// builder.add_receiver(&class, free_reader, available_writer);
/// let server = builder.build();
/// ```
#[derive(Debug)]
pub struct ServerBuilder<D, R, W> {
    slots: SlotManager<D>,
    borrowed: BorrowedManager,
    receivers: ReceiverManager<R, W>,
}

impl<D, R, W> ServerBuilder<D, R, W>
where
    D: WritableSlot,
    R: QueueReader,
    W: QueueWriter,
{
    /// Start a server with `slot_count` slots, room for `max_receivers`
    /// receivers and exactly `class_count` classes.
    ///
    /// Panics if `max_receivers` exceeds [`crate::MAX_RECEIVERS`].
    pub fn new(slot_count: u32, max_receivers: u32, class_count: u32) -> Self {
        let slots = SlotManager::new(slot_count);
        let borrowed = BorrowedManager::new(slots.group(), class_count);
        Self {
            slots,
            borrowed,
            receivers: ReceiverManager::new(max_receivers),
        }
    }

    /// Start a server sized by `config`, creating its classes.
    ///
    /// Returns the class handles in `config.class_limits` order. Panics if
    /// the configuration does not validate.
    #[allow(clippy::panic)]
    pub fn from_config(config: &ServerConfig) -> (Self, Vec<ClassHandle>) {
        if let Err(err) = config.validate() {
            panic!("invalid server configuration: {err}");
        }
        let mut builder = Self::new(
            config.slot_count,
            config.max_receivers,
            config.class_limits.len() as u32,
        );
        let classes = config
            .class_limits
            .iter()
            .map(|&limit| builder.add_class(limit))
            .collect();
        (builder, classes)
    }

    /// Add the next slot's descriptor.
    pub fn add_slot(&mut self, descriptor: D) -> SlotHandle {
        self.slots.add_slot(descriptor)
    }

    /// Add the next receiver class.
    ///
    /// Panics on a limit of zero or once every class has been added.
    pub fn add_class(&mut self, class_limit: u32) -> ClassHandle {
        assert!(class_limit > 0, "class limit must be greater than 0");
        self.borrowed.create_class(class_limit)
    }

    /// Register an initial receiver. `None` if the receiver limit is reached.
    pub fn add_receiver(
        &mut self,
        class: &ClassHandle,
        free_queue: R,
        available_queue: W,
    ) -> Option<ReceiverHandle> {
        assert!(
            self.borrowed.classes().is_class_handle_valid(class),
            "invalid class handle {class:?} passed to add_receiver"
        );
        let handle = self.receivers.register_receiver(free_queue, available_queue)?;
        self.borrowed.register_receiver(&handle, class);
        info!(
            "Registered receiver {} in class {}",
            handle.index(),
            class.index()
        );
        Some(handle)
    }

    /// Finish the server and reset every slot's memory.
    ///
    /// Panics unless every slot and every class has been added.
    pub fn build(mut self) -> Server<D, R, W> {
        assert!(
            self.slots.is_full(),
            "server builder incomplete: {} of {} slots added",
            self.slots.slot_count(),
            self.slots.capacity()
        );
        let classes = self.borrowed.classes();
        assert!(
            classes.class_count() == classes.capacity(),
            "server builder incomplete: {} of {} classes added",
            classes.class_count(),
            classes.capacity()
        );

        for descriptor in self.slots.descriptors_mut() {
            descriptor.reset_slot_memory();
        }
        info!(
            "Built server with {} slots, {} classes and {} receivers",
            self.slots.slot_count(),
            classes.class_count(),
            self.receivers.len()
        );
        Server::from_parts(self.slots, self.borrowed, self.receivers)
    }
}

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder<D, R, W> {
    slots: SlotManager<D>,
    queues: Option<(R, W)>,
}

impl<D, R, W> ClientBuilder<D, R, W>
where
    D: ReadableSlot,
    R: QueueReader,
    W: QueueWriter,
{
    /// Start a client with `slot_count` slots.
    pub fn new(slot_count: u32) -> Self {
        Self {
            slots: SlotManager::new(slot_count),
            queues: None,
        }
    }

    /// Start a client sized by `config`. Panics if it does not validate.
    #[allow(clippy::panic)]
    pub fn from_config(config: &ClientConfig) -> Self {
        if let Err(err) = config.validate() {
            panic!("invalid client configuration: {err}");
        }
        Self::new(config.slot_count)
    }

    /// Add the next slot's descriptor.
    pub fn add_slot(&mut self, descriptor: D) -> SlotHandle {
        self.slots.add_slot(descriptor)
    }

    /// Set the reading end of the available queue and the writing end of
    /// the free queue.
    pub fn with_queues(&mut self, available_queue: R, free_queue: W) -> &mut Self {
        self.queues = Some((available_queue, free_queue));
        self
    }

    /// Finish the client.
    ///
    /// Panics unless every slot and both queue ends have been supplied.
    #[allow(clippy::panic)]
    pub fn build(self) -> Client<D, R, W> {
        assert!(
            self.slots.is_full(),
            "client builder incomplete: {} of {} slots added",
            self.slots.slot_count(),
            self.slots.capacity()
        );
        let Some((available_queue, free_queue)) = self.queues else {
            panic!("client builder incomplete: queues not set");
        };
        info!("Built client with {} slots", self.slots.slot_count());
        Client::from_parts(self.slots, available_queue, free_queue)
    }
}
