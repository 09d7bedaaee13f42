//! The single writer of a region.
//!
//! # Design
//! - **Create** maps a fresh, zeroed object and writes the header and an empty
//!   index.
//! - **Write** wraps index and block updates in one sequence transaction.
//! - **Close** unmaps only. The object stays in the namespace for readers that
//!   are still attached; removing it is left to them.
//!
//! # Thread Safety
//! `RegionWriter` does no locking. All mutating calls take `&mut self`, so a
//! caller sharing a writer across threads must serialize access itself. Only
//! one writer may exist per region name at a time.

use crate::allocator::{BumpAllocator, Placement, placement};
use crate::clock::now_us;
use crate::error::WriterError;
use crate::index::{self, IndexSlot};
use crate::seqlock::WriteTransaction;
use quartz_layout::region_layout::{
    BLOCK_HEADER_SIZE, CANDLE_SIZE, DATA_SECTION_OFFSET, DEFAULT_REGION_SIZE, HEADER_SIZE,
    MAX_CANDLES_PER_WRITE, MAX_REGION_SIZE, MIN_REGION_SIZE, SYMBOL_INDEX_OFFSET, block_size_for,
    candles_offset,
};
use quartz_layout::{
    BlockHeader, Candle, IntervalName, LayoutError, RegionAccessor, RegionHeader,
    SymbolIndexEntry, SymbolName,
};
use quartz_shm::{MappedRegionMut, PlatformShm, ShmBackend};
use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

/// Snapshot of the writer's view of its region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub total_symbols: usize,
    /// Sum of candle counts over all index entries.
    pub total_candles: u64,
    /// Bytes from region start up to the allocator cursor.
    pub memory_used: usize,
    /// Header timestamp of the last completed transaction (µs).
    pub last_write_us: u64,
    /// `sequence / 2`
    pub write_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterPhase {
    Uninitialized,
    Initialized,
    Closed,
}

/// Creates a region and publishes candles into it.
///
/// # Type Parameter
/// - `B`: the shared-memory backend. Defaults to the platform's native one;
///   the transaction logic is identical for every backend.
pub struct RegionWriter<B: ShmBackend = PlatformShm> {
    state: WriterState,
    _backend: PhantomData<B>,
}

enum WriterState {
    Uninitialized,
    Initialized(OpenRegion),
    Closed,
}

struct OpenRegion {
    name: String,
    size: usize,
    region: RegionAccessor<MappedRegionMut>,
    allocator: BumpAllocator,
}

impl RegionWriter {
    /// A writer on the platform backend, not yet attached to any region.
    pub fn new() -> Self {
        Self::with_backend()
    }
}

impl Default for RegionWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ShmBackend> RegionWriter<B> {
    pub fn with_backend() -> Self {
        Self {
            state: WriterState::Uninitialized,
            _backend: PhantomData,
        }
    }

    /// Creates and initializes the region `name` with `size` bytes.
    ///
    /// An already-initialized writer is closed first.
    ///
    /// # Errors
    /// - `InvalidName` for an empty name or one the namespace cannot hold
    /// - `InvalidSize` outside `[MIN_REGION_SIZE, MAX_REGION_SIZE]`
    /// - `CreateFailed` / `MappingFailed` when the OS refuses the object
    ///
    /// Validation failures leave the writer's state untouched.
    pub fn create(&mut self, name: &str, size: usize) -> Result<(), WriterError> {
        if name.is_empty() {
            return Err(WriterError::InvalidName);
        }
        if !(MIN_REGION_SIZE..=MAX_REGION_SIZE).contains(&size) {
            return Err(WriterError::InvalidSize { size });
        }

        if self.is_initialized() {
            self.close();
        }

        let mapped = B::create(name, size).map_err(WriterError::from_shm)?;
        let mut region = RegionAccessor::new(mapped)?;
        initialize_region(&mut region)?;

        info!(name, size, "created shared memory region");
        self.state = WriterState::Initialized(OpenRegion {
            name: name.to_owned(),
            size,
            allocator: BumpAllocator::new(region.len()),
            region,
        });
        Ok(())
    }

    /// [`create`](Self::create) with the default 128 MiB size.
    pub fn create_default(&mut self, name: &str) -> Result<(), WriterError> {
        self.create(name, DEFAULT_REGION_SIZE)
    }

    /// Replaces the stored candles of `symbol` with `candles`.
    ///
    /// `candles` are copied verbatim and are expected in timestamp order; the
    /// block's start and end timestamps are taken from the first and last
    /// element. An empty slice is a successful no-op.
    ///
    /// # Errors
    /// - `NotInitialized` before `create` or after `close`
    /// - `CandleLimitExceeded` for more than `MAX_CANDLES_PER_WRITE` candles
    /// - `SymbolLimitExceeded` for a new symbol when the index is full
    /// - `WriteFailed` when the data section cannot fit the block
    ///
    /// The last two happen inside a transaction; the sequence is still
    /// returned to even before the error is reported.
    pub fn write_candles(
        &mut self,
        symbol: &str,
        interval: &str,
        candles: &[Candle],
    ) -> Result<(), WriterError> {
        let WriterState::Initialized(open) = &mut self.state else {
            return Err(WriterError::NotInitialized);
        };
        if candles.is_empty() {
            return Ok(());
        }
        if candles.len() > MAX_CANDLES_PER_WRITE {
            return Err(WriterError::CandleLimitExceeded {
                count: candles.len(),
            });
        }

        open.write(symbol, interval, candles).inspect_err(|e| {
            warn!(region = %open.name, symbol, error = %e, "write transaction failed");
        })
    }

    /// Current statistics; all zero when not initialized.
    pub fn stats(&self) -> WriterStats {
        match &self.state {
            WriterState::Initialized(open) => open.stats(),
            _ => WriterStats::default(),
        }
    }

    /// Unmaps the region. The backing object and its contents are left for
    /// readers. Closing a writer that is not initialized does nothing.
    pub fn close(&mut self) {
        if !self.is_initialized() {
            return;
        }
        if let WriterState::Initialized(open) =
            std::mem::replace(&mut self.state, WriterState::Closed)
        {
            info!(name = %open.name, write_count = open.write_count(), "closed shared memory region");
            open.region.into_inner().close();
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        matches!(self.state, WriterState::Initialized(_))
    }

    pub fn phase(&self) -> WriterPhase {
        match self.state {
            WriterState::Uninitialized => WriterPhase::Uninitialized,
            WriterState::Initialized(_) => WriterPhase::Initialized,
            WriterState::Closed => WriterPhase::Closed,
        }
    }

    /// Region name, empty when not initialized.
    pub fn name(&self) -> &str {
        match &self.state {
            WriterState::Initialized(open) => &open.name,
            _ => "",
        }
    }

    /// Region size in bytes, 0 when not initialized.
    pub fn size(&self) -> usize {
        match &self.state {
            WriterState::Initialized(open) => open.size,
            _ => 0,
        }
    }
}

impl<B: ShmBackend> Drop for RegionWriter<B> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Writes the header of an empty region and clears the index section.
fn initialize_region<T: AsRef<[u8]> + AsMut<[u8]>>(
    region: &mut RegionAccessor<T>,
) -> Result<(), LayoutError> {
    let header = RegionHeader::new(std::process::id(), now_us());
    header.encode_into(region.bytes_mut(0, HEADER_SIZE)?)?;

    // A region below the data section start only holds part of the index.
    let index_end = region.len().min(DATA_SECTION_OFFSET);
    region.zero(SYMBOL_INDEX_OFFSET, index_end - SYMBOL_INDEX_OFFSET)
}

/// Encodes the block header and every candle record at `offset`.
fn write_block<T: AsRef<[u8]> + AsMut<[u8]>>(
    region: &mut RegionAccessor<T>,
    offset: u64,
    symbol: &SymbolName,
    interval: &str,
    candles: &[Candle],
) -> Result<(), LayoutError> {
    let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
        return Ok(());
    };
    let offset = offset as usize;
    let count = candles.len() as u32;

    let header = BlockHeader {
        symbol: *symbol,
        interval: IntervalName::new(interval),
        count,
        capacity: count,
        start_timestamp: first.timestamp,
        end_timestamp: last.timestamp,
    };
    header.encode_into(region.bytes_mut(offset, BLOCK_HEADER_SIZE)?)?;

    let records = region.bytes_mut(candles_offset(offset), candles.len() * CANDLE_SIZE)?;
    for (candle, dst) in candles.iter().zip(records.chunks_exact_mut(CANDLE_SIZE)) {
        candle.encode_into(dst)?;
    }
    Ok(())
}

impl OpenRegion {
    fn write(&mut self, symbol: &str, interval: &str, candles: &[Candle]) -> Result<(), WriterError> {
        let name = SymbolName::new(symbol);
        let required = block_size_for(candles.len());

        let OpenRegion {
            region, allocator, ..
        } = self;
        let mut txn = WriteTransaction::begin(region);

        let (position, offset, reserved) = match index::find(&*txn, &name)? {
            Some(IndexSlot { position, entry }) => match placement(&entry, required) {
                Placement::InPlace { offset, reserved } => (position, offset, reserved),
                Placement::Relocate => {
                    let offset = allocator.allocate(&mut *txn, required)?;
                    debug!(
                        symbol = %name,
                        from = entry.data_offset,
                        to = offset,
                        bytes = required,
                        "relocated data block"
                    );
                    (position, offset, required as u32)
                }
            },
            None => {
                // Check the index before claiming arena space, and claim the
                // space before appending, so neither failure leaves a trace.
                index::ensure_capacity(&*txn)?;
                let offset = allocator.allocate(&mut *txn, required)?;
                let slot = index::add_if_absent(&mut *txn, &name)?;
                (slot.position, offset, required as u32)
            }
        };

        write_block(&mut *txn, offset, &name, interval, candles)?;

        let entry = SymbolIndexEntry {
            symbol: name,
            data_offset: offset,
            data_size: reserved,
            candle_count: candles.len() as u32,
            last_update_us: now_us(),
        };
        index::write_entry(&mut *txn, position, &entry)?;

        debug!(symbol = %name, interval, candles = candles.len(), offset, "wrote candles");
        Ok(())
    }

    fn write_count(&self) -> u64 {
        self.region.sequence().load(Ordering::Acquire) / 2
    }

    fn stats(&self) -> WriterStats {
        match region_stats(&self.region, self.allocator.cursor()) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(region = %self.name, error = %e, "could not decode region for stats");
                WriterStats {
                    memory_used: self.allocator.cursor(),
                    write_count: self.write_count(),
                    ..WriterStats::default()
                }
            }
        }
    }
}

/// Stats as recorded in the region itself, with the allocator cursor
/// supplied by the caller.
fn region_stats<T: AsRef<[u8]>>(
    region: &RegionAccessor<T>,
    cursor: usize,
) -> Result<WriterStats, LayoutError> {
    let entries = index::entries(region)?;
    Ok(WriterStats {
        total_symbols: entries.len(),
        total_candles: entries.iter().map(|e| e.candle_count as u64).sum(),
        memory_used: cursor,
        last_write_us: region.read_u64(RegionHeader::LAST_UPDATE_OFFSET)?,
        write_count: region.sequence().load(Ordering::Acquire) / 2,
    })
}
