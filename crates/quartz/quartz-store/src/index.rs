//! Symbol index: a fixed directory of up to 256 entries at offset 256.
//!
//! Entries are append-only. Lookup is a linear scan over the active entries,
//! which keeps the shared structure a flat array that any reader can walk
//! without hashing.

use crate::error::WriterError;
use quartz_layout::region_layout::{
    INDEX_COUNT_OFFSET, INDEX_ENTRY_SIZE, MAX_SYMBOLS, SYMBOL_NAME_SIZE, index_entry_offset,
};
use quartz_layout::{LayoutError, RegionAccessor, RegionHeader, SymbolIndexEntry, SymbolName};

/// An entry together with its position in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSlot {
    pub position: usize,
    pub entry: SymbolIndexEntry,
}

/// Number of active entries, clamped to the index capacity.
pub fn active_count<T: AsRef<[u8]>>(region: &RegionAccessor<T>) -> Result<usize, LayoutError> {
    Ok((region.read_u32(INDEX_COUNT_OFFSET)? as usize).min(MAX_SYMBOLS))
}

pub fn entry_at<T: AsRef<[u8]>>(
    region: &RegionAccessor<T>,
    position: usize,
) -> Result<SymbolIndexEntry, LayoutError> {
    SymbolIndexEntry::decode(region.bytes(index_entry_offset(position), INDEX_ENTRY_SIZE)?)
}

/// Finds the entry whose stored (truncated) name equals `name`.
pub fn find<T: AsRef<[u8]>>(
    region: &RegionAccessor<T>,
    name: &SymbolName,
) -> Result<Option<IndexSlot>, LayoutError> {
    for position in 0..active_count(region)? {
        let stored = region.bytes(index_entry_offset(position), SYMBOL_NAME_SIZE)?;
        if SymbolName::from_raw(stored) == *name {
            let entry = entry_at(region, position)?;
            return Ok(Some(IndexSlot { position, entry }));
        }
    }
    Ok(None)
}

/// All active entries in insertion order.
pub fn entries<T: AsRef<[u8]>>(
    region: &RegionAccessor<T>,
) -> Result<Vec<SymbolIndexEntry>, LayoutError> {
    (0..active_count(region)?)
        .map(|position| entry_at(region, position))
        .collect()
}

/// Fails with `SymbolLimitExceeded` if no further entry can be appended.
pub fn ensure_capacity<T: AsRef<[u8]>>(region: &RegionAccessor<T>) -> Result<(), WriterError> {
    if active_count(region)? >= MAX_SYMBOLS {
        return Err(WriterError::SymbolLimitExceeded);
    }
    Ok(())
}

/// Returns the entry for `name`, appending an empty one if it is absent.
///
/// A new entry has no block yet (`data_offset == 0`). The index counter and
/// the header's `symbol_count` are both advanced.
pub fn add_if_absent<T: AsRef<[u8]> + AsMut<[u8]>>(
    region: &mut RegionAccessor<T>,
    name: &SymbolName,
) -> Result<IndexSlot, WriterError> {
    if let Some(slot) = find(region, name)? {
        return Ok(slot);
    }
    ensure_capacity(region)?;

    let position = active_count(region)?;
    let entry = SymbolIndexEntry {
        symbol: *name,
        ..Default::default()
    };
    write_entry(region, position, &entry)?;

    let count = (position + 1) as u32;
    region.write_u32(INDEX_COUNT_OFFSET, count)?;
    region.write_u32(RegionHeader::SYMBOL_COUNT_OFFSET, count)?;
    Ok(IndexSlot { position, entry })
}

pub fn write_entry<T: AsRef<[u8]> + AsMut<[u8]>>(
    region: &mut RegionAccessor<T>,
    position: usize,
    entry: &SymbolIndexEntry,
) -> Result<(), LayoutError> {
    debug_assert!(position < MAX_SYMBOLS);
    entry.encode_into(region.bytes_mut(index_entry_offset(position), INDEX_ENTRY_SIZE)?)
}
