//! Read side of a region.
//!
//! A reader maps the object read-only and validates the header once. After
//! that, every logical read runs under the sequence protocol: it is repeated
//! until it completed entirely between two observations of the same even
//! sequence value, so it never reflects a half-applied write.
//!
//! # Thread Safety
//! `RegionReader` holds no cursor; all methods take `&self`. Independent
//! readers, in this process or others, never coordinate with each other or
//! with the writer.

use crate::error::ReadError;
use crate::index;
use crate::seqlock::{Stalled, read_consistent};
use quartz_layout::region_layout::{
    BLOCK_HEADER_SIZE, CANDLE_SIZE, MAX_CANDLES_PER_WRITE, MIN_REGION_SIZE, candles_offset,
};
use quartz_layout::{
    BlockHeader, Candle, LayoutError, RegionAccessor, RegionHeader, SymbolIndexEntry, SymbolName,
};
use quartz_shm::{MappedRegion, PlatformShm, ShmBackend};
use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use tracing::info;

/// Attempts before a read gives up on a sequence that never settles.
pub const DEFAULT_SPIN_LIMIT: u32 = 1 << 20;

/// One symbol's candles as of a single committed write.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    pub symbol: String,
    pub interval: String,
    pub start_timestamp: u64,
    pub end_timestamp: u64,
    pub candles: Vec<Candle>,
}

pub struct RegionReader<B: ShmBackend = PlatformShm> {
    name: String,
    region: RegionAccessor<MappedRegion>,
    spin_limit: u32,
    _backend: PhantomData<B>,
}

impl RegionReader {
    /// Attaches to the region `name` on the platform backend.
    ///
    /// # Errors
    /// - `Shm` if the object does not exist or cannot be mapped
    /// - `Layout` if the mapping is too small or carries the wrong magic or
    ///   version
    pub fn open(name: &str) -> Result<Self, ReadError> {
        Self::open_with_backend(name)
    }

    /// Removes the region's name from the platform namespace.
    ///
    /// The writer never does this; the last reader to leave cleans up.
    pub fn remove(name: &str) -> Result<(), ReadError> {
        Ok(PlatformShm::unlink(name)?)
    }
}

impl<B: ShmBackend> RegionReader<B> {
    pub fn open_with_backend(name: &str) -> Result<Self, ReadError> {
        let mapped = B::open_read_only(name)?;
        if mapped.len() < MIN_REGION_SIZE {
            return Err(LayoutError::TooSmall(mapped.len()).into());
        }
        let region = RegionAccessor::new(mapped)?;
        let header = region.header()?;
        header.validate()?;

        info!(
            name,
            size = region.len(),
            writer_pid = header.writer_pid,
            "attached to shared memory region"
        );
        Ok(Self {
            name: name.to_owned(),
            region,
            spin_limit: DEFAULT_SPIN_LIMIT,
            _backend: PhantomData,
        })
    }

    /// Sets how many attempts a read makes before reporting `WriterStalled`.
    pub fn with_spin_limit(mut self, spin_limit: u32) -> Self {
        self.spin_limit = spin_limit.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the mapped region in bytes.
    pub fn size(&self) -> usize {
        self.region.len()
    }

    /// Current raw sequence value (odd while a write is in flight).
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.region.sequence().load(Ordering::Acquire)
    }

    /// Completed write transactions so far.
    #[inline]
    pub fn write_count(&self) -> u64 {
        self.sequence() / 2
    }

    /// A consistent copy of the header.
    pub fn header(&self) -> Result<RegionHeader, ReadError> {
        self.consistent(|region| region.header())
    }

    /// A consistent copy of every active index entry.
    pub fn symbols(&self) -> Result<Vec<SymbolIndexEntry>, ReadError> {
        self.consistent(|region| index::entries(region))
    }

    /// The candles currently stored for `symbol`, or `None` if it has never
    /// been written. `symbol` is truncated the same way the writer truncates.
    pub fn read_candles(&self, symbol: &str) -> Result<Option<CandleSeries>, ReadError> {
        let name = SymbolName::new(symbol);
        self.consistent(|region| read_series(region, &name))
    }

    fn consistent<R>(
        &self,
        mut read: impl FnMut(&RegionAccessor<MappedRegion>) -> Result<R, LayoutError>,
    ) -> Result<R, ReadError> {
        let region = &self.region;
        match read_consistent(region.sequence(), self.spin_limit, || read(region)) {
            Ok(result) => Ok(result?),
            Err(Stalled { sequence }) => Err(ReadError::WriterStalled { sequence }),
        }
    }
}

/// Decodes the block an index entry points to.
///
/// Any inconsistency between entry and block is reported as a layout error;
/// during a racing write the caller discards it and retries.
fn read_series<T: AsRef<[u8]>>(
    region: &RegionAccessor<T>,
    name: &SymbolName,
) -> Result<Option<CandleSeries>, LayoutError> {
    let Some(slot) = index::find(region, name)? else {
        return Ok(None);
    };
    let entry = slot.entry;
    if entry.data_offset == 0 {
        return Ok(None);
    }

    let offset = entry.data_offset as usize;
    let header = BlockHeader::decode(region.bytes(offset, BLOCK_HEADER_SIZE)?)?;
    let count = header.count as usize;
    if count > MAX_CANDLES_PER_WRITE || header.total_size() > entry.data_size as usize {
        return Err(LayoutError::CorruptBlock {
            offset: entry.data_offset,
            reason: "candle count exceeds reserved block size",
        });
    }
    if header.count != entry.candle_count {
        return Err(LayoutError::CorruptBlock {
            offset: entry.data_offset,
            reason: "block count disagrees with index entry",
        });
    }

    let records = region.bytes(candles_offset(offset), count * CANDLE_SIZE)?;
    let candles = records
        .chunks_exact(CANDLE_SIZE)
        .map(Candle::decode)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(CandleSeries {
        symbol: header.symbol.to_string_lossy(),
        interval: header.interval.to_string_lossy(),
        start_timestamp: header.start_timestamp,
        end_timestamp: header.end_timestamp,
        candles,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegionWriter;
    use crate::test_support::unique_name;
    use quartz_layout::region_layout::{DATA_SECTION_OFFSET, HEADER_SIZE};
    use quartz_shm::FileShm;

    fn candles(n: u64, base: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let px = base + i as f64;
                Candle::new(
                    1_700_000_000_000 + i * 3_600_000,
                    px,
                    px + 2.0,
                    px - 1.0,
                    px + 1.0,
                    10.0 * px,
                )
            })
            .collect()
    }

    #[test]
    fn reads_back_exactly_what_was_written() {
        let name = unique_name("reader_exact");
        let mut writer = RegionWriter::<FileShm>::with_backend();
        writer.create(&name, 1 << 20).unwrap();
        let written = candles(5, 100.0);
        writer.write_candles("BTCUSDT", "1h", &written).unwrap();

        let reader = RegionReader::<FileShm>::open_with_backend(&name).unwrap();
        let series = reader.read_candles("BTCUSDT").unwrap().expect("series");
        assert_eq!(series.symbol, "BTCUSDT");
        assert_eq!(series.interval, "1h");
        assert_eq!(series.start_timestamp, written[0].timestamp);
        assert_eq!(series.end_timestamp, written[4].timestamp);
        assert_eq!(series.candles, written);

        assert_eq!(reader.read_candles("ETHUSDT").unwrap(), None);
        assert_eq!(reader.write_count(), 1);

        drop(writer);
        drop(reader);
        let _ = FileShm::unlink(&name);
    }

    #[test]
    fn symbols_lists_entries_in_insertion_order() {
        let name = unique_name("reader_symbols");
        let mut writer = RegionWriter::<FileShm>::with_backend();
        writer.create(&name, 1 << 20).unwrap();
        writer.write_candles("BTCUSDT", "1h", &candles(5, 1.0)).unwrap();
        writer.write_candles("ETHUSDT", "4h", &candles(3, 1.0)).unwrap();

        let reader = RegionReader::<FileShm>::open_with_backend(&name).unwrap();
        let symbols = reader.symbols().unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].symbol, SymbolName::new("BTCUSDT"));
        assert_eq!(symbols[0].candle_count, 5);
        assert_eq!(symbols[0].data_offset, DATA_SECTION_OFFSET as u64);
        assert_eq!(symbols[1].symbol, SymbolName::new("ETHUSDT"));
        assert_eq!(symbols[1].candle_count, 3);

        let header = reader.header().unwrap();
        assert_eq!(header.symbol_count, 2);
        assert_eq!(header.writer_pid, std::process::id());
        assert_eq!(header.reader_pid, 0);
        assert_eq!(header.checksum, 0);

        drop(writer);
        let _ = FileShm::unlink(&name);
    }

    #[test]
    fn missing_region_fails_to_open() {
        let result = RegionReader::<FileShm>::open_with_backend(&unique_name("reader_missing"));
        assert!(matches!(result, Err(ReadError::Shm(_))));
    }

    #[test]
    fn foreign_bytes_are_rejected() {
        let name = unique_name("reader_foreign");
        let region = FileShm::create(&name, MIN_REGION_SIZE).unwrap();

        let result = RegionReader::<FileShm>::open_with_backend(&name);
        assert!(matches!(result, Err(ReadError::Layout(LayoutError::BadMagic(0)))));

        drop(region);
        let _ = FileShm::unlink(&name);
    }

    #[test]
    fn stuck_odd_sequence_reports_stalled_writer() {
        let name = unique_name("reader_stalled");
        let mut mapped = FileShm::create(&name, MIN_REGION_SIZE).unwrap();
        // Region as left by a writer that died mid-transaction.
        let header = RegionHeader {
            sequence: 9,
            ..RegionHeader::new(1, 0)
        };
        header.encode_into(&mut mapped.as_mut()[..HEADER_SIZE]).unwrap();

        let reader = RegionReader::<FileShm>::open_with_backend(&name)
            .unwrap()
            .with_spin_limit(128);
        assert_eq!(reader.sequence(), 9);
        assert!(matches!(
            reader.read_candles("BTCUSDT"),
            Err(ReadError::WriterStalled { sequence: 9 })
        ));

        drop(mapped);
        let _ = FileShm::unlink(&name);
    }

    #[test]
    fn reader_survives_writer_close() {
        let name = unique_name("reader_after_close");
        let mut writer = RegionWriter::<FileShm>::with_backend();
        writer.create(&name, 1 << 20).unwrap();
        writer.write_candles("BTCUSDT", "1d", &candles(2, 5.0)).unwrap();
        writer.close();

        let reader = RegionReader::<FileShm>::open_with_backend(&name).unwrap();
        let series = reader.read_candles("BTCUSDT").unwrap().expect("series");
        assert_eq!(series.candles.len(), 2);
        assert_eq!(series.interval, "1d");

        drop(reader);
        let _ = FileShm::unlink(&name);
    }
}
