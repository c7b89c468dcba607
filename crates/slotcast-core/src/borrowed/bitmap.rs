//! Per-slot borrow bitmap.
//!
//! One 64-bit word per slot: bit 63 is the sender, bits 0..63 are
//! receivers by index. Keeping the whole borrow state in one word makes
//! "is anybody holding this slot" a single compare and the class check a
//! single AND.

use std::fmt;

/// Maximum number of receivers a borrow bitmap can track.
///
/// Receiver indices handed to a [`super::BorrowedManager`] or
/// [`super::ClassManager`] must be below this value.
pub const MAX_RECEIVERS: u32 = 63;

/// Bit position of the sender borrow flag.
pub const SENDER_BIT: u32 = 63;

/// Borrow flags of one slot, or a receiver membership set.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BorrowedBitmap(u64);

impl BorrowedBitmap {
    /// Bitmap with no flag set.
    pub const EMPTY: Self = Self(0);

    /// Build a bitmap from its raw word.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw word.
    pub const fn bits(self) -> u64 {
        self.0
    }

    const fn receiver_mask(receiver: u32) -> u64 {
        assert!(receiver < MAX_RECEIVERS, "receiver index out of bitmap range");
        1 << receiver
    }

    /// Set a receiver's flag.
    pub fn set_receiver(&mut self, receiver: u32) {
        self.0 |= Self::receiver_mask(receiver);
    }

    /// Clear a receiver's flag.
    pub fn clear_receiver(&mut self, receiver: u32) {
        self.0 &= !Self::receiver_mask(receiver);
    }

    /// Whether a receiver's flag is set.
    pub const fn is_receiver_set(self, receiver: u32) -> bool {
        self.0 & Self::receiver_mask(receiver) != 0
    }

    /// Set the sender flag.
    pub fn set_sender(&mut self) {
        self.0 |= 1 << SENDER_BIT;
    }

    /// Clear the sender flag.
    pub fn clear_sender(&mut self) {
        self.0 &= !(1 << SENDER_BIT);
    }

    /// Whether the sender flag is set.
    pub const fn is_sender_set(self) -> bool {
        self.0 & (1 << SENDER_BIT) != 0
    }

    /// Whether no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether any receiver flag is set (the sender flag is ignored).
    pub const fn any_receiver(self) -> bool {
        self.receivers().0 != 0
    }

    /// Whether the two bitmaps share a flag.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Receiver flags only.
    pub const fn receivers(self) -> Self {
        Self(self.0 & !(1 << SENDER_BIT))
    }

    /// Number of flags set.
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Indices of set receiver flags, ascending.
    pub fn iter_receivers(self) -> impl Iterator<Item = u32> {
        let mut bits = self.receivers().0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros();
            bits &= bits - 1;
            Some(index)
        })
    }
}

impl fmt::Debug for BorrowedBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BorrowedBitmap({:#018x})", self.0)
    }
}

impl std::ops::BitOr for BorrowedBitmap {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for BorrowedBitmap {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_and_receivers_are_independent() {
        let mut b = BorrowedBitmap::EMPTY;
        b.set_sender();
        b.set_receiver(0);
        b.set_receiver(62);

        assert!(b.is_sender_set());
        assert!(b.is_receiver_set(0));
        assert!(b.is_receiver_set(62));
        assert!(!b.is_receiver_set(1));
        assert_eq!(b.count(), 3);

        b.clear_sender();
        assert!(!b.is_sender_set());
        assert!(b.any_receiver());
        assert!(!b.is_empty());

        b.clear_receiver(0);
        b.clear_receiver(62);
        assert!(b.is_empty());
    }

    #[test]
    fn test_any_receiver_ignores_sender() {
        let mut b = BorrowedBitmap::EMPTY;
        b.set_sender();
        assert!(!b.any_receiver());
        assert!(!b.is_empty());
    }

    #[test]
    fn test_iter_receivers() {
        let mut b = BorrowedBitmap::EMPTY;
        for r in [3, 17, 40, 62] {
            b.set_receiver(r);
        }
        b.set_sender();
        assert_eq!(b.iter_receivers().collect::<Vec<_>>(), vec![3, 17, 40, 62]);
    }

    #[test]
    fn test_intersects() {
        let mut members = BorrowedBitmap::EMPTY;
        members.set_receiver(1);
        members.set_receiver(2);

        let mut slot = BorrowedBitmap::EMPTY;
        slot.set_sender();
        assert!(!slot.intersects(members));
        slot.set_receiver(2);
        assert!(slot.intersects(members));
        assert_eq!((slot & members).count(), 1);
        assert_eq!((slot | members).count(), 3);
    }

    /// Receiver 63 would collide with the sender flag; 63 receivers is a
    /// hard product limit.
    #[test]
    #[should_panic(expected = "receiver index out of bitmap range")]
    fn test_receiver_ceiling_is_enforced() {
        let mut b = BorrowedBitmap::EMPTY;
        b.set_receiver(MAX_RECEIVERS);
    }

    #[test]
    fn test_ceiling_constants() {
        assert_eq!(MAX_RECEIVERS, 63);
        assert_eq!(SENDER_BIT, MAX_RECEIVERS);
    }
}
