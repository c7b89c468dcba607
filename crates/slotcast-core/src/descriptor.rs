//! Slot descriptor contracts.
//!
//! A descriptor is the view of one fixed-size slot in shared memory: its
//! payload bytes and its global visibility flag (GVF). Descriptors are
//! supplied by the caller and owned by a [`crate::SlotManager`]; the
//! memory they point at must outlive the manager.
//!
//! # Visibility ordering
//!
//! The server sets the GVF before pushing a slot's index to any receiver,
//! and the client reads the GVF after peeking an index and before popping
//! it. Implementations must therefore store the flag with `Release` and
//! load it with `Acquire` (or stronger) so that the payload written before
//! [`WritableSlot::set_visibility_flag`] is observable by any reader that
//! sees [`ReadableSlot::is_slot_visible`] return `true`.

/// Read-only view of a slot.
pub trait ReadableSlot {
    /// The slot's payload bytes.
    fn readable_data(&self) -> &[u8];

    /// Whether the writer's payload may be read.
    fn is_slot_visible(&self) -> bool;
}

/// Read-write view of a slot, held by the server.
pub trait WritableSlot: ReadableSlot {
    /// The slot's payload bytes, writable.
    fn writable_data(&mut self) -> &mut [u8];

    /// Publish the payload (release semantics).
    fn set_visibility_flag(&mut self);

    /// Retract visibility once no party holds the slot.
    fn clear_visibility_flag(&mut self);

    /// Bring the slot memory into its initial state.
    ///
    /// Called once per slot when the server is built.
    fn reset_slot_memory(&mut self);

    /// Debug hook invoked when the slot is sent.
    fn on_send(&mut self) {}

    /// Debug hook invoked when the slot is acquired by the sender.
    fn on_acquire(&mut self) {}
}
