//! Sequence-counter protocol over the region header.
//!
//! The writer and readers share nothing but the 64-bit sequence at header
//! offset 24. It is never a lock: the writer never waits, and readers only
//! retry their own work.
//!
//! # Protocol
//!
//! **Writer:**
//! 1. Increment seq to odd (signals "write in progress")
//! 2. Write index and block bytes
//! 3. Increment seq to even (signals "write complete")
//!
//! **Reader:**
//! 1. Read seq; if odd, spin (write in progress)
//! 2. Copy what it needs
//! 3. Read seq again; if changed, discard the copy and retry from step 1
//!
//! Unlike a per-slot seqlock, one counter covers the whole region, so a reader
//! that observes the same even value twice has seen exactly one committed
//! state of every header field, index entry and block.

use crate::clock::now_us;
use quartz_layout::{LayoutError, RegionAccessor, RegionHeader};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering, fence};

/// Marks the start of a write. Returns the even value the counter had.
#[inline(always)]
pub(crate) fn begin_write(seq: &AtomicU64) -> u64 {
    let s0 = seq.load(Ordering::Relaxed);
    seq.store(s0.wrapping_add(1), Ordering::Relaxed);
    // Keep the payload stores below from becoming visible before the odd value.
    fence(Ordering::Release);
    s0
}

/// Marks the end of a write started at `s0`.
#[inline(always)]
pub(crate) fn end_write(seq: &AtomicU64, s0: u64) {
    seq.store(s0.wrapping_add(2), Ordering::Release);
}

/// The counter never settled within the spin budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stalled {
    pub sequence: u64,
}

/// Runs `read` until it completes against a single even sequence value.
///
/// Results of attempts that overlapped a write are dropped, whatever they
/// were, including decoding errors caused by half-written bytes.
pub(crate) fn read_consistent<R>(
    seq: &AtomicU64,
    spin_limit: u32,
    mut read: impl FnMut() -> R,
) -> Result<R, Stalled> {
    let mut last = seq.load(Ordering::Acquire);
    for _ in 0..spin_limit {
        let s1 = seq.load(Ordering::Acquire);
        last = s1;
        if s1 & 1 == 1 {
            std::hint::spin_loop();
            continue;
        }

        let value = read();

        fence(Ordering::Acquire);
        let s2 = seq.load(Ordering::Relaxed);
        if s1 == s2 {
            return Ok(value);
        }
        last = s2;
        std::hint::spin_loop();
    }
    Err(Stalled { sequence: last })
}

/// An open write transaction on a region.
///
/// Creating it moves the sequence to odd; dropping it refreshes the header
/// timestamp and moves the sequence back to even. Because the close-out lives
/// in `Drop`, every exit path of a write, early errors included, leaves the
/// region quiescent.
pub(crate) struct WriteTransaction<'a, T: AsRef<[u8]> + AsMut<[u8]>> {
    region: &'a mut RegionAccessor<T>,
    start: u64,
}

impl<'a, T: AsRef<[u8]> + AsMut<[u8]>> WriteTransaction<'a, T> {
    pub(crate) fn begin(region: &'a mut RegionAccessor<T>) -> Self {
        let start = begin_write(region.sequence_mut());
        Self { region, start }
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Deref for WriteTransaction<'_, T> {
    type Target = RegionAccessor<T>;

    fn deref(&self) -> &Self::Target {
        self.region
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> DerefMut for WriteTransaction<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.region
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Drop for WriteTransaction<'_, T> {
    fn drop(&mut self) {
        // In bounds for every accessor: the header is checked at construction.
        let stamped: Result<(), LayoutError> = self
            .region
            .write_u64(RegionHeader::LAST_UPDATE_OFFSET, now_us());
        debug_assert!(stamped.is_ok());
        end_write(self.region.sequence_mut(), self.start);
    }
}
