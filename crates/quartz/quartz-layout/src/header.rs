use crate::error::{LayoutError, check_len};
use crate::region_layout::{HEADER_SIZE, REGION_MAGIC, REGION_VERSION};
use byteorder::{ByteOrder, LittleEndian};

/// Region header stored at offset 0.
///
/// ```text
/// off  size  field
///   0     4  magic
///   4     4  version
///   8     4  writer_pid
///  12     4  reader_pid       (written by a reader, never by the writer)
///  16     8  last_update_us
///  24     8  sequence         (odd = write in flight)
///  32     4  symbol_count
///  36     4  flags
///  40     4  checksum         (reserved, never computed)
///  44   212  reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionHeader {
    pub magic: u32,
    pub version: u32,
    pub writer_pid: u32,
    pub reader_pid: u32,
    pub last_update_us: u64,
    pub sequence: u64,
    pub symbol_count: u32,
    pub flags: u32,
    pub checksum: u32,
}

impl RegionHeader {
    pub const MAGIC_OFFSET: usize = 0;
    pub const VERSION_OFFSET: usize = 4;
    pub const WRITER_PID_OFFSET: usize = 8;
    pub const READER_PID_OFFSET: usize = 12;
    pub const LAST_UPDATE_OFFSET: usize = 16;
    pub const SEQUENCE_OFFSET: usize = 24;
    pub const SYMBOL_COUNT_OFFSET: usize = 32;
    pub const FLAGS_OFFSET: usize = 36;
    pub const CHECKSUM_OFFSET: usize = 40;
    pub const RESERVED_OFFSET: usize = 44;

    /// Header of a freshly created, empty region.
    pub fn new(writer_pid: u32, now_us: u64) -> Self {
        Self {
            magic: REGION_MAGIC,
            version: REGION_VERSION,
            writer_pid,
            reader_pid: 0,
            last_update_us: now_us,
            sequence: 0,
            symbol_count: 0,
            flags: 0,
            checksum: 0,
        }
    }

    /// Checks magic and version.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.magic != REGION_MAGIC {
            return Err(LayoutError::BadMagic(self.magic));
        }
        if self.version != REGION_VERSION {
            return Err(LayoutError::UnsupportedVersion(self.version));
        }
        Ok(())
    }

    #[inline]
    pub fn is_writing(&self) -> bool {
        self.sequence & 1 == 1
    }

    /// Number of completed write transactions.
    #[inline]
    pub fn write_count(&self) -> u64 {
        self.sequence / 2
    }

    pub fn decode(src: &[u8]) -> Result<Self, LayoutError> {
        check_len(src.len(), HEADER_SIZE)?;
        Ok(Self {
            magic: LittleEndian::read_u32(&src[Self::MAGIC_OFFSET..]),
            version: LittleEndian::read_u32(&src[Self::VERSION_OFFSET..]),
            writer_pid: LittleEndian::read_u32(&src[Self::WRITER_PID_OFFSET..]),
            reader_pid: LittleEndian::read_u32(&src[Self::READER_PID_OFFSET..]),
            last_update_us: LittleEndian::read_u64(&src[Self::LAST_UPDATE_OFFSET..]),
            sequence: LittleEndian::read_u64(&src[Self::SEQUENCE_OFFSET..]),
            symbol_count: LittleEndian::read_u32(&src[Self::SYMBOL_COUNT_OFFSET..]),
            flags: LittleEndian::read_u32(&src[Self::FLAGS_OFFSET..]),
            checksum: LittleEndian::read_u32(&src[Self::CHECKSUM_OFFSET..]),
        })
    }

    /// Writes all 256 bytes, zeroing the reserved tail.
    ///
    /// This includes the sequence field, so it must only be used while no
    /// reader can be relying on the counter (i.e. at region creation).
    pub fn encode_into(&self, dst: &mut [u8]) -> Result<(), LayoutError> {
        check_len(dst.len(), HEADER_SIZE)?;
        LittleEndian::write_u32(&mut dst[Self::MAGIC_OFFSET..], self.magic);
        LittleEndian::write_u32(&mut dst[Self::VERSION_OFFSET..], self.version);
        LittleEndian::write_u32(&mut dst[Self::WRITER_PID_OFFSET..], self.writer_pid);
        LittleEndian::write_u32(&mut dst[Self::READER_PID_OFFSET..], self.reader_pid);
        LittleEndian::write_u64(&mut dst[Self::LAST_UPDATE_OFFSET..], self.last_update_us);
        LittleEndian::write_u64(&mut dst[Self::SEQUENCE_OFFSET..], self.sequence);
        LittleEndian::write_u32(&mut dst[Self::SYMBOL_COUNT_OFFSET..], self.symbol_count);
        LittleEndian::write_u32(&mut dst[Self::FLAGS_OFFSET..], self.flags);
        LittleEndian::write_u32(&mut dst[Self::CHECKSUM_OFFSET..], self.checksum);
        dst[Self::RESERVED_OFFSET..HEADER_SIZE].fill(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_land_at_documented_offsets() {
        let header = RegionHeader {
            sequence: 0x0102_0304_0506_0708,
            symbol_count: 3,
            ..RegionHeader::new(4242, 99)
        };
        let mut buf = [0xFFu8; HEADER_SIZE];
        header.encode_into(&mut buf).unwrap();

        assert_eq!(&buf[0..4], b"SXNQ");
        assert_eq!(&buf[4..8], &1u32.to_le_bytes());
        assert_eq!(&buf[8..12], &4242u32.to_le_bytes());
        assert_eq!(&buf[12..16], &[0u8; 4]);
        assert_eq!(&buf[16..24], &99u64.to_le_bytes());
        assert_eq!(&buf[24..32], &0x0102_0304_0506_0708u64.to_le_bytes());
        assert_eq!(&buf[32..36], &3u32.to_le_bytes());
        assert!(buf[44..].iter().all(|&b| b == 0));

        assert_eq!(RegionHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn validation_rejects_foreign_bytes() {
        let header = RegionHeader::new(1, 0);
        assert!(header.validate().is_ok());

        let zeroed = RegionHeader::default();
        assert_eq!(zeroed.validate(), Err(LayoutError::BadMagic(0)));

        let future = RegionHeader { version: 2, ..header };
        assert_eq!(future.validate(), Err(LayoutError::UnsupportedVersion(2)));
    }

    #[test]
    fn sequence_parity() {
        let mut header = RegionHeader::new(1, 0);
        assert!(!header.is_writing());
        header.sequence = 7;
        assert!(header.is_writing());
        assert_eq!(header.write_count(), 3);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let header = RegionHeader::new(1, 0);
        let mut buf = [0u8; 100];
        assert_eq!(
            header.encode_into(&mut buf),
            Err(LayoutError::ShortBuffer {
                needed: HEADER_SIZE,
                actual: 100
            })
        );
        assert!(RegionHeader::decode(&buf).is_err());
    }
}
