//! Fixed offsets and sizes of the shared region.
//!
//! The region is one contiguous mapping. Its first two sections have fixed
//! positions; the data section behind them is carved up by the writer's bump
//! allocator and addressed through offsets stored in the symbol index.
//!
//! # Memory Layout
//!
//! ```text
//! 0x0000 ┌──────────────────────────────────────────────────────────────┐
//!        │                     RegionHeader (256B)                      │
//!        │  magic │ version │ writer_pid │ reader_pid │ last_update_us  │
//!        │  sequence (8B, odd = write in flight) │ symbol_count │ ...   │
//! 0x0100 ├──────────────────────────────────────────────────────────────┤
//!        │                   SymbolIndex (16 KiB)                       │
//!        │  count (4B) │ pad (4B) │ SymbolIndexEntry[256] (40B each)    │
//! 0x4100 ├──────────────────────────────────────────────────────────────┤
//!        │                     Data section                             │
//!        │  ┌──────────────────────┬───────────────────────────────┐    │
//!        │  │ BlockHeader (56B)    │ Candle[count] (48B each)      │    │
//!        │  └──────────────────────┴───────────────────────────────┘    │
//!        │  ... further blocks, bump allocated, never reclaimed ...     │
//!        └──────────────────────────────────────────────────────────────┘
//! ```

/// Magic number identifying a region, ASCII "QNXS" read as a little-endian `u32`.
pub const REGION_MAGIC: u32 = 0x514E_5853;

/// Current region format version. Readers reject any other value.
pub const REGION_VERSION: u32 = 1;

pub const HEADER_OFFSET: usize = 0;
pub const HEADER_SIZE: usize = 256;

pub const SYMBOL_INDEX_OFFSET: usize = 256;
pub const SYMBOL_INDEX_SIZE: usize = 16_384;

/// Start of the data section; the bump allocator begins here.
pub const DATA_SECTION_OFFSET: usize = SYMBOL_INDEX_OFFSET + SYMBOL_INDEX_SIZE;

/// Capacity of the symbol index. The 257th distinct symbol is rejected.
pub const MAX_SYMBOLS: usize = 256;

/// Upper bound on the number of candles accepted by one write.
pub const MAX_CANDLES_PER_WRITE: usize = 100_000;

/// Width of a symbol field, including its terminating NUL.
pub const SYMBOL_NAME_SIZE: usize = 16;

/// Width of an interval field, including its terminating NUL.
pub const INTERVAL_SIZE: usize = 8;

pub const MIN_REGION_SIZE: usize = 4_352;
pub const MAX_REGION_SIZE: usize = 1 << 30;
pub const DEFAULT_REGION_SIZE: usize = 128 << 20;

/// Offset of the active-entry counter inside the index section.
pub const INDEX_COUNT_OFFSET: usize = SYMBOL_INDEX_OFFSET;

/// Offset of the first index entry (after the counter and 4 bytes of padding).
pub const INDEX_ENTRIES_OFFSET: usize = SYMBOL_INDEX_OFFSET + 8;

pub const INDEX_ENTRY_SIZE: usize = 40;
pub const BLOCK_HEADER_SIZE: usize = 56;
pub const CANDLE_SIZE: usize = 48;

const _: () = assert!(INDEX_ENTRIES_OFFSET + MAX_SYMBOLS * INDEX_ENTRY_SIZE <= DATA_SECTION_OFFSET);
const _: () = assert!(DATA_SECTION_OFFSET == 16_640);

/// Offset from region start of the index entry at `position`.
#[inline]
pub fn index_entry_offset(position: usize) -> usize {
    INDEX_ENTRIES_OFFSET + position * INDEX_ENTRY_SIZE
}

/// Total bytes of a data block holding `count` candles.
///
/// `BLOCK_HEADER_SIZE + count × CANDLE_SIZE`
#[inline]
pub fn block_size_for(count: usize) -> usize {
    BLOCK_HEADER_SIZE + count * CANDLE_SIZE
}

/// Offset of the candle records that follow the block header at `block_offset`.
#[inline]
pub fn candles_offset(block_offset: usize) -> usize {
    block_offset + BLOCK_HEADER_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_are_at_documented_offsets() {
        assert_eq!(HEADER_OFFSET, 0);
        assert_eq!(SYMBOL_INDEX_OFFSET, HEADER_OFFSET + HEADER_SIZE);
        assert_eq!(DATA_SECTION_OFFSET, 16_640);
        assert_eq!(index_entry_offset(0), 264);
        assert_eq!(index_entry_offset(MAX_SYMBOLS), 264 + 10_240);
    }

    #[test]
    fn block_size_grows_by_one_record_per_candle() {
        assert_eq!(block_size_for(0), 56);
        assert_eq!(block_size_for(5), 56 + 240);
        assert_eq!(block_size_for(MAX_CANDLES_PER_WRITE), 56 + 4_800_000);
        assert_eq!(candles_offset(DATA_SECTION_OFFSET), 16_696);
    }
}
