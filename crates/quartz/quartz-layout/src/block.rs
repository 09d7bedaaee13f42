use crate::error::{LayoutError, check_len};
use crate::name::{IntervalName, SymbolName};
use crate::region_layout::{BLOCK_HEADER_SIZE, INTERVAL_SIZE, SYMBOL_NAME_SIZE, block_size_for};
use byteorder::{ByteOrder, LittleEndian};

/// Fixed header of an OHLCV data block (56 bytes).
///
/// `count` candle records follow it directly; the trailing array is addressed
/// by offset, never through a native variable-length type.
///
/// ```text
/// off  size  field
///   0    16  symbol
///  16     8  interval
///  24     4  count
///  28     4  capacity
///  32     8  start_timestamp
///  40     8  end_timestamp
///  48     8  padding
///  56     …  Candle[count]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub symbol: SymbolName,
    pub interval: IntervalName,
    pub count: u32,
    pub capacity: u32,
    pub start_timestamp: u64,
    pub end_timestamp: u64,
}

impl BlockHeader {
    pub const SYMBOL_OFFSET: usize = 0;
    pub const INTERVAL_OFFSET: usize = SYMBOL_NAME_SIZE;
    pub const COUNT_OFFSET: usize = 24;
    pub const CAPACITY_OFFSET: usize = 28;
    pub const START_OFFSET: usize = 32;
    pub const END_OFFSET: usize = 40;
    pub const PADDING_OFFSET: usize = 48;

    /// Bytes this block occupies given its current `count`.
    #[inline]
    pub fn total_size(&self) -> usize {
        block_size_for(self.count as usize)
    }

    pub fn decode(src: &[u8]) -> Result<Self, LayoutError> {
        check_len(src.len(), BLOCK_HEADER_SIZE)?;
        Ok(Self {
            symbol: SymbolName::from_raw(&src[..SYMBOL_NAME_SIZE]),
            interval: IntervalName::from_raw(
                &src[Self::INTERVAL_OFFSET..Self::INTERVAL_OFFSET + INTERVAL_SIZE],
            ),
            count: LittleEndian::read_u32(&src[Self::COUNT_OFFSET..]),
            capacity: LittleEndian::read_u32(&src[Self::CAPACITY_OFFSET..]),
            start_timestamp: LittleEndian::read_u64(&src[Self::START_OFFSET..]),
            end_timestamp: LittleEndian::read_u64(&src[Self::END_OFFSET..]),
        })
    }

    pub fn encode_into(&self, dst: &mut [u8]) -> Result<(), LayoutError> {
        check_len(dst.len(), BLOCK_HEADER_SIZE)?;
        dst[..SYMBOL_NAME_SIZE].copy_from_slice(self.symbol.field());
        dst[Self::INTERVAL_OFFSET..Self::INTERVAL_OFFSET + INTERVAL_SIZE]
            .copy_from_slice(self.interval.field());
        LittleEndian::write_u32(&mut dst[Self::COUNT_OFFSET..], self.count);
        LittleEndian::write_u32(&mut dst[Self::CAPACITY_OFFSET..], self.capacity);
        LittleEndian::write_u64(&mut dst[Self::START_OFFSET..], self.start_timestamp);
        LittleEndian::write_u64(&mut dst[Self::END_OFFSET..], self.end_timestamp);
        dst[Self::PADDING_OFFSET..BLOCK_HEADER_SIZE].fill(0);
        Ok(())
    }
}
