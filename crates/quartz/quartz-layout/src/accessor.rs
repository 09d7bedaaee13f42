//! Bounds-checked access to a mapped region.
//!
//! All reads and writes of region bytes go through `RegionAccessor`, which
//! validates `offset + len` against the mapping length before handing out a
//! slice. The only typed view it hands out is the header's sequence counter,
//! which must be accessed atomically because other processes poll it.

use crate::error::LayoutError;
use crate::header::RegionHeader;
use crate::region_layout::HEADER_SIZE;
use byteorder::{ByteOrder, LittleEndian};
use std::mem::align_of;
use std::sync::atomic::AtomicU64;

pub struct RegionAccessor<T> {
    region: T,
}

impl<T: AsRef<[u8]>> RegionAccessor<T> {
    /// Wraps a mapped region.
    ///
    /// # Errors
    /// - `TooSmall` if the region cannot hold a header
    /// - `Misaligned` if the base address cannot host the atomic sequence
    pub fn new(region: T) -> Result<Self, LayoutError> {
        let bytes = region.as_ref();
        if bytes.len() < HEADER_SIZE {
            return Err(LayoutError::TooSmall(bytes.len()));
        }
        if (bytes.as_ptr() as usize) % align_of::<AtomicU64>() != 0 {
            return Err(LayoutError::Misaligned);
        }
        Ok(Self { region })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.region.as_ref().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn check(&self, offset: usize, len: usize) -> Result<(), LayoutError> {
        let region_len = self.len();
        match offset.checked_add(len) {
            Some(end) if end <= region_len => Ok(()),
            _ => Err(LayoutError::OutOfBounds {
                offset,
                len,
                region_len,
            }),
        }
    }

    pub fn bytes(&self, offset: usize, len: usize) -> Result<&[u8], LayoutError> {
        self.check(offset, len)?;
        Ok(&self.region.as_ref()[offset..offset + len])
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32, LayoutError> {
        Ok(LittleEndian::read_u32(self.bytes(offset, 4)?))
    }

    pub fn read_u64(&self, offset: usize) -> Result<u64, LayoutError> {
        Ok(LittleEndian::read_u64(self.bytes(offset, 8)?))
    }

    /// Decodes the full header. The sequence field in the result is a plain
    /// read; use [`sequence`](Self::sequence) when parity matters.
    pub fn header(&self) -> Result<RegionHeader, LayoutError> {
        RegionHeader::decode(self.bytes(0, HEADER_SIZE)?)
    }

    /// The header's sequence counter, for loads.
    ///
    /// The pointer behind it is derived from a shared borrow, so it must not
    /// be stored through; the writer uses [`sequence_mut`](Self::sequence_mut).
    #[inline]
    pub fn sequence(&self) -> &AtomicU64 {
        // SAFETY: `new` checked that the header (which contains the 8-byte
        // counter at offset 24) is in bounds and that the base is 8-byte
        // aligned, so the counter address is aligned too. The bytes live in a
        // shared mapping for the lifetime of `self`.
        unsafe {
            &*(self
                .region
                .as_ref()
                .as_ptr()
                .add(RegionHeader::SEQUENCE_OFFSET) as *const AtomicU64)
        }
    }

    pub fn into_inner(self) -> T {
        self.region
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> RegionAccessor<T> {
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8], LayoutError> {
        self.check(offset, len)?;
        Ok(&mut self.region.as_mut()[offset..offset + len])
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<(), LayoutError> {
        LittleEndian::write_u32(self.bytes_mut(offset, 4)?, value);
        Ok(())
    }

    pub fn write_u64(&mut self, offset: usize, value: u64) -> Result<(), LayoutError> {
        LittleEndian::write_u64(self.bytes_mut(offset, 8)?, value);
        Ok(())
    }

    pub fn zero(&mut self, offset: usize, len: usize) -> Result<(), LayoutError> {
        self.bytes_mut(offset, len)?.fill(0);
        Ok(())
    }

    /// The header's sequence counter, derived from a writable borrow of the
    /// region so that stores through it are permitted.
    #[inline]
    pub fn sequence_mut(&mut self) -> &AtomicU64 {
        let ptr = self.region.as_mut().as_mut_ptr();
        // SAFETY: same bounds and alignment argument as `sequence`. The
        // pointer carries write permission because it comes from `as_mut`.
        unsafe { AtomicU64::from_ptr(ptr.add(RegionHeader::SEQUENCE_OFFSET) as *mut u64) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Aligned, heap_region};
    use std::sync::atomic::Ordering;

    #[test]
    fn rejects_regions_smaller_than_header() {
        assert_eq!(
            RegionAccessor::new(Aligned::zeroed(128)).err(),
            Some(LayoutError::TooSmall(128))
        );
    }

    #[test]
    fn every_access_is_bounds_checked() {
        let mut region = heap_region(512);
        assert!(region.bytes(500, 12).is_ok());
        assert_eq!(
            region.bytes(500, 13).err(),
            Some(LayoutError::OutOfBounds {
                offset: 500,
                len: 13,
                region_len: 512
            })
        );
        assert!(region.write_u64(508, 1).is_err());
        assert!(region.bytes(usize::MAX, 2).is_err());
    }

    #[test]
    fn field_writes_are_little_endian() {
        let mut region = heap_region(512);
        region.write_u32(300, 0xAABBCCDD).unwrap();
        assert_eq!(region.bytes(300, 4).unwrap(), &[0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(region.read_u32(300).unwrap(), 0xAABBCCDD);
    }

    #[test]
    fn sequence_aliases_header_field() {
        let mut region = heap_region(512);
        region.write_u64(RegionHeader::SEQUENCE_OFFSET, 41).unwrap();
        assert_eq!(region.sequence().load(Ordering::Acquire), 41);
        assert_eq!(region.header().unwrap().sequence, 41);
    }

    #[test]
    fn writer_stores_reach_the_shared_view() {
        let mut region = heap_region(512);
        let before = region.sequence_mut().fetch_add(1, Ordering::Relaxed);
        assert_eq!(before, 0);
        region.sequence_mut().store(6, Ordering::Release);

        assert_eq!(region.sequence().load(Ordering::Acquire), 6);
        assert_eq!(region.header().unwrap().sequence, 6);
        assert_eq!(
            region.bytes(RegionHeader::SEQUENCE_OFFSET, 8).unwrap(),
            &6u64.to_le_bytes()
        );
    }
}
