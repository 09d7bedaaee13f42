//! Single-writer, multi-reader OHLCV store over a shared-memory region.
//!
//! [`RegionWriter`] owns the region: it lays out the header and symbol index,
//! bump-allocates data blocks and wraps every write in a sequence-counter
//! transaction. Any number of [`RegionReader`]s, in any process, map the same
//! object read-only and retry each read until they observe an even, unchanged
//! sequence.

mod allocator;
mod clock;
mod error;
pub mod index;
mod reader;
mod seqlock;
mod writer;

#[cfg(test)]
mod test_support;

pub use allocator::{BumpAllocator, Placement, placement};
pub use error::{ReadError, WriterError};
pub use reader::{CandleSeries, DEFAULT_SPIN_LIMIT, RegionReader};
pub use writer::{RegionWriter, WriterPhase, WriterStats};

pub use quartz_layout::{Candle, RegionHeader, SymbolIndexEntry, region_layout};
pub use quartz_shm::{FileShm, PlatformShm, ShmBackend};
