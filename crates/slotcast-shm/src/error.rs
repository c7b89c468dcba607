//! Error types for slot regions

use thiserror::Error;

/// Errors creating or splitting a [`crate::SlotRegion`]
#[derive(Debug, Error)]
pub enum RegionError {
    /// Mapping the region failed
    #[error("failed to map slot region: {0}")]
    Io(#[from] std::io::Error),

    /// The requested geometry is empty or does not fit in memory
    #[error("invalid slot region layout: {slot_count} slots of {slot_size} bytes")]
    InvalidLayout {
        /// Requested number of slots
        slot_count: u32,
        /// Requested payload size per slot
        slot_size: usize,
    },

    /// The writer views were already handed out
    #[error("writer slots already taken")]
    WritersTaken,
}

/// Result type for slot region operations
pub type Result<T> = std::result::Result<T, RegionError>;
