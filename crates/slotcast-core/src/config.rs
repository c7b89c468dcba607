//! Sizing configuration for servers and clients

use serde::{Deserialize, Serialize};

use crate::borrowed::MAX_RECEIVERS;
use crate::error::ConfigError;

/// Sizing of a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Number of slots in the shared region
    pub slot_count: u32,

    /// Maximum number of concurrently registered receivers
    pub max_receivers: u32,

    /// One entry per receiver class: its limit on concurrently held slots
    pub class_limits: Vec<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            slot_count: 16,
            max_receivers: 8,
            class_limits: vec![16],
        }
    }
}

impl ServerConfig {
    /// Create a configuration with `slot_count` slots and one unrestricted class
    pub fn new(slot_count: u32) -> Self {
        Self {
            slot_count,
            class_limits: vec![slot_count],
            ..Default::default()
        }
    }

    /// Set the slot count
    #[must_use]
    pub const fn with_slot_count(mut self, slot_count: u32) -> Self {
        self.slot_count = slot_count;
        self
    }

    /// Set the receiver limit
    #[must_use]
    pub const fn with_max_receivers(mut self, max_receivers: u32) -> Self {
        self.max_receivers = max_receivers;
        self
    }

    /// Replace the receiver classes
    #[must_use]
    pub fn with_class_limits(mut self, class_limits: Vec<u32>) -> Self {
        self.class_limits = class_limits;
        self
    }

    /// Check the values against the protocol's limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_count == 0 {
            return Err(ConfigError::NoSlots);
        }
        if self.max_receivers == 0 || self.max_receivers > MAX_RECEIVERS {
            return Err(ConfigError::ReceiverLimit {
                value: self.max_receivers,
                max: MAX_RECEIVERS,
            });
        }
        if self.class_limits.is_empty() {
            return Err(ConfigError::NoClasses);
        }
        if let Some(position) = self.class_limits.iter().position(|&limit| limit == 0) {
            return Err(ConfigError::ZeroClassLimit(position));
        }
        Ok(())
    }
}

/// Sizing of a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Number of slots in the shared region; must match the server's
    pub slot_count: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { slot_count: 16 }
    }
}

impl ClientConfig {
    /// Create a configuration with `slot_count` slots
    pub const fn new(slot_count: u32) -> Self {
        Self { slot_count }
    }

    /// Set the slot count
    #[must_use]
    pub const fn with_slot_count(mut self, slot_count: u32) -> Self {
        self.slot_count = slot_count;
        self
    }

    /// Check the values against the protocol's limits
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_count == 0 {
            return Err(ConfigError::NoSlots);
        }
        Ok(())
    }
}
