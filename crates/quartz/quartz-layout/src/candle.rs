use crate::error::{LayoutError, check_len};
use crate::region_layout::CANDLE_SIZE;
use byteorder::{ByteOrder, LittleEndian};

/// One OHLCV record. Values are copied verbatim: no ordering or OHLC
/// consistency checks happen anywhere in the transport.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Candle {
    /// Unix time in milliseconds, supplied by the caller.
    pub timestamp: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: u64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn decode(src: &[u8]) -> Result<Self, LayoutError> {
        check_len(src.len(), CANDLE_SIZE)?;
        Ok(Self {
            timestamp: LittleEndian::read_u64(&src[0..]),
            open: LittleEndian::read_f64(&src[8..]),
            high: LittleEndian::read_f64(&src[16..]),
            low: LittleEndian::read_f64(&src[24..]),
            close: LittleEndian::read_f64(&src[32..]),
            volume: LittleEndian::read_f64(&src[40..]),
        })
    }

    pub fn encode_into(&self, dst: &mut [u8]) -> Result<(), LayoutError> {
        check_len(dst.len(), CANDLE_SIZE)?;
        LittleEndian::write_u64(&mut dst[0..], self.timestamp);
        LittleEndian::write_f64(&mut dst[8..], self.open);
        LittleEndian::write_f64(&mut dst[16..], self.high);
        LittleEndian::write_f64(&mut dst[24..], self.low);
        LittleEndian::write_f64(&mut dst[32..], self.close);
        LittleEndian::write_f64(&mut dst[40..], self.volume);
        Ok(())
    }
}
