//! 32-bit wrapping sequence numbers.
//!
//! TCP sequence numbers live in 32 bits and wrap; the stack internally
//! uses 64-bit absolute stream indices that never wrap.  [`Wrap32`] is the
//! bridge: `wrap` projects an absolute index into sequence space relative
//! to a zero point (the ISN), and `unwrap` inverts the projection by
//! picking, among all 64-bit candidates, the one closest to a checkpoint —
//! in practice the last index the stream made progress at, which is always
//! within a window (far less than 2^31) of the truth.

use std::ops::Add;

/// A sequence number: a 32-bit value measured from some zero point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Wrap32(u32);

impl Wrap32 {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    /// Project absolute index `n` into sequence space.
    pub fn wrap(n: u64, zero_point: Wrap32) -> Self {
        Self(zero_point.0.wrapping_add(n as u32))
    }

    /// Invert [`wrap`](Self::wrap): find the absolute index that maps to
    /// `self` and lies closest to `checkpoint`.
    ///
    /// The candidate below (or at) the checkpoint is compared with the one
    /// in the next 2^32 band; an exact tie resolves upward.  The result is
    /// never negative: when every candidate exceeds the checkpoint, the
    /// smallest one wins.
    pub fn unwrap(self, zero_point: Wrap32, checkpoint: u64) -> u64 {
        const BAND: u64 = 1 << 32;
        let offset = u64::from(self.0.wrapping_sub(zero_point.0));
        if offset >= checkpoint {
            return offset;
        }
        let below = offset + (checkpoint - offset) / BAND * BAND;
        if checkpoint - below < below + BAND - checkpoint {
            below
        } else {
            below + BAND
        }
    }
}

impl Add<u64> for Wrap32 {
    type Output = Wrap32;

    fn add(self, n: u64) -> Wrap32 {
        Wrap32(self.0.wrapping_add(n as u32))
    }
}
