//! Monotonic bump allocation of data blocks.
//!
//! The cursor only moves forward. A block that a symbol outgrows is abandoned
//! in place and its bytes are never reused: readers have no way to announce
//! they are done with an old block, so reclaiming one could hand a live
//! reader's bytes to another symbol.

use crate::error::WriterError;
use quartz_layout::region_layout::DATA_SECTION_OFFSET;
use quartz_layout::{RegionAccessor, SymbolIndexEntry};

/// Writer-private cursor into the data section.
///
/// The cursor is not stored in the region; it restarts at the data section on
/// every `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BumpAllocator {
    cursor: usize,
    limit: usize,
}

impl BumpAllocator {
    /// An allocator for a region of `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            cursor: DATA_SECTION_OFFSET,
            limit,
        }
    }

    /// Next free offset; also the number of bytes in use from region start.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.limit.saturating_sub(self.cursor)
    }

    /// Claims `size` bytes and zero-fills them. Returns the block offset.
    ///
    /// # Errors
    /// `WriteFailed` if `cursor + size` passes the end of the region; the
    /// cursor does not move in that case.
    pub fn allocate<T: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        region: &mut RegionAccessor<T>,
        size: usize,
    ) -> Result<u64, WriterError> {
        let end = self
            .cursor
            .checked_add(size)
            .filter(|&end| end <= self.limit)
            .ok_or(WriterError::WriteFailed {
                requested: size,
                available: self.available(),
            })?;

        region.zero(self.cursor, size)?;
        let offset = self.cursor as u64;
        self.cursor = end;
        Ok(offset)
    }
}

/// Where the next block of a symbol goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Rewrite the current block; its reserved size is kept.
    InPlace { offset: u64, reserved: u32 },
    /// Allocate a new block and repoint the entry; the old one is abandoned.
    Relocate,
}

/// Decides between reusing a symbol's block and relocating it.
///
/// A block is reused whenever `required` fits in the bytes reserved for it,
/// even if that leaves most of them unused. Stale records past the new count
/// stay in place, unreachable through `count`.
pub fn placement(entry: &SymbolIndexEntry, required: usize) -> Placement {
    if entry.data_offset != 0 && required <= entry.data_size as usize {
        Placement::InPlace {
            offset: entry.data_offset,
            reserved: entry.data_size,
        }
    } else {
        Placement::Relocate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::heap_region;
    use quartz_layout::region_layout::block_size_for;

    #[test]
    fn allocations_are_contiguous_from_data_section() {
        let mut region = heap_region(DATA_SECTION_OFFSET + 1024);
        let mut alloc = BumpAllocator::new(region.len());

        assert_eq!(alloc.allocate(&mut region, 100).unwrap(), DATA_SECTION_OFFSET as u64);
        assert_eq!(
            alloc.allocate(&mut region, 200).unwrap(),
            (DATA_SECTION_OFFSET + 100) as u64
        );
        assert_eq!(alloc.cursor(), DATA_SECTION_OFFSET + 300);
        assert_eq!(alloc.available(), 724);
    }

    #[test]
    fn exhaustion_leaves_cursor_untouched() {
        let mut region = heap_region(DATA_SECTION_OFFSET + 256);
        let mut alloc = BumpAllocator::new(region.len());

        alloc.allocate(&mut region, 200).unwrap();
        let err = alloc.allocate(&mut region, 57).unwrap_err();
        assert!(matches!(
            err,
            WriterError::WriteFailed {
                requested: 57,
                available: 56
            }
        ));
        assert_eq!(alloc.cursor(), DATA_SECTION_OFFSET + 200);
        assert!(alloc.allocate(&mut region, 56).is_ok());
        assert_eq!(alloc.available(), 0);
    }

    #[test]
    fn region_smaller_than_data_section_has_no_space() {
        let mut region = heap_region(4352);
        let mut alloc = BumpAllocator::new(region.len());
        assert_eq!(alloc.available(), 0);
        assert!(alloc.allocate(&mut region, 1).is_err());
    }

    #[test]
    fn claimed_bytes_are_zeroed() {
        let mut region = heap_region(DATA_SECTION_OFFSET + 64);
        region.bytes_mut(DATA_SECTION_OFFSET, 64).unwrap().fill(0xEE);

        let mut alloc = BumpAllocator::new(region.len());
        let offset = alloc.allocate(&mut region, 64).unwrap() as usize;
        assert!(region.bytes(offset, 64).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn placement_reuses_when_it_fits() {
        let entry = SymbolIndexEntry {
            data_offset: 20_000,
            data_size: block_size_for(50) as u32,
            candle_count: 50,
            ..Default::default()
        };
        assert_eq!(
            placement(&entry, block_size_for(10)),
            Placement::InPlace {
                offset: 20_000,
                reserved: block_size_for(50) as u32
            }
        );
        assert_eq!(
            placement(&entry, block_size_for(50)),
            Placement::InPlace {
                offset: 20_000,
                reserved: block_size_for(50) as u32
            }
        );
        assert_eq!(placement(&entry, block_size_for(51)), Placement::Relocate);
    }

    #[test]
    fn entry_without_block_relocates() {
        assert_eq!(
            placement(&SymbolIndexEntry::default(), block_size_for(1)),
            Placement::Relocate
        );
    }
}
