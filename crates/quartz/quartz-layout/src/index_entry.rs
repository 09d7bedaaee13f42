use crate::error::{LayoutError, check_len};
use crate::name::SymbolName;
use crate::region_layout::{INDEX_ENTRY_SIZE, SYMBOL_NAME_SIZE};
use byteorder::{ByteOrder, LittleEndian};

/// One slot of the symbol index (40 bytes).
///
/// ```text
/// off  size  field
///   0    16  symbol          (NUL-terminated)
///  16     8  data_offset     (from region start, 0 = unset)
///  24     4  data_size       (bytes reserved for the block)
///  28     4  candle_count
///  32     8  last_update_us
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolIndexEntry {
    pub symbol: SymbolName,
    pub data_offset: u64,
    pub data_size: u32,
    pub candle_count: u32,
    pub last_update_us: u64,
}

impl SymbolIndexEntry {
    pub const SYMBOL_OFFSET: usize = 0;
    pub const DATA_OFFSET_OFFSET: usize = 16;
    pub const DATA_SIZE_OFFSET: usize = 24;
    pub const CANDLE_COUNT_OFFSET: usize = 28;
    pub const LAST_UPDATE_OFFSET: usize = 32;

    /// True when the slot has no name or no block yet.
    pub fn is_empty(&self) -> bool {
        self.symbol.is_empty() || self.data_offset == 0
    }

    pub fn decode(src: &[u8]) -> Result<Self, LayoutError> {
        check_len(src.len(), INDEX_ENTRY_SIZE)?;
        Ok(Self {
            symbol: SymbolName::from_raw(&src[..SYMBOL_NAME_SIZE]),
            data_offset: LittleEndian::read_u64(&src[Self::DATA_OFFSET_OFFSET..]),
            data_size: LittleEndian::read_u32(&src[Self::DATA_SIZE_OFFSET..]),
            candle_count: LittleEndian::read_u32(&src[Self::CANDLE_COUNT_OFFSET..]),
            last_update_us: LittleEndian::read_u64(&src[Self::LAST_UPDATE_OFFSET..]),
        })
    }

    pub fn encode_into(&self, dst: &mut [u8]) -> Result<(), LayoutError> {
        check_len(dst.len(), INDEX_ENTRY_SIZE)?;
        dst[..SYMBOL_NAME_SIZE].copy_from_slice(self.symbol.field());
        LittleEndian::write_u64(&mut dst[Self::DATA_OFFSET_OFFSET..], self.data_offset);
        LittleEndian::write_u32(&mut dst[Self::DATA_SIZE_OFFSET..], self.data_size);
        LittleEndian::write_u32(&mut dst[Self::CANDLE_COUNT_OFFSET..], self.candle_count);
        LittleEndian::write_u64(&mut dst[Self::LAST_UPDATE_OFFSET..], self.last_update_us);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_forty_bytes_with_no_gaps() {
        let entry = SymbolIndexEntry {
            symbol: SymbolName::new("BTCUSDT"),
            data_offset: 16_640,
            data_size: 296,
            candle_count: 5,
            last_update_us: 1_700_000_000_000_000,
        };
        let mut buf = [0xAAu8; INDEX_ENTRY_SIZE];
        entry.encode_into(&mut buf).unwrap();

        assert_eq!(&buf[..7], b"BTCUSDT");
        assert!(buf[7..16].iter().all(|&b| b == 0));
        assert_eq!(&buf[16..24], &16_640u64.to_le_bytes());
        assert_eq!(&buf[24..28], &296u32.to_le_bytes());
        assert_eq!(&buf[28..32], &5u32.to_le_bytes());
        assert_eq!(&buf[32..40], &1_700_000_000_000_000u64.to_le_bytes());

        assert_eq!(SymbolIndexEntry::decode(&buf).unwrap(), entry);
    }

    #[test]
    fn unset_offset_means_empty() {
        let entry = SymbolIndexEntry {
            symbol: SymbolName::new("ETHUSDT"),
            ..Default::default()
        };
        assert!(entry.is_empty());
        assert!(SymbolIndexEntry::default().is_empty());
    }
}
