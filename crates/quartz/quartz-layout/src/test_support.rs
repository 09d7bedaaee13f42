//! Heap-backed regions for tests that do not need a real mapping.

use crate::accessor::RegionAccessor;

/// Heap buffer with the 8-byte base alignment a mapping has.
pub struct Aligned(Vec<u64>);

impl Aligned {
    /// `len` zero bytes, rounded up to a multiple of 8.
    pub fn zeroed(len: usize) -> Self {
        Self(vec![0u64; len.div_ceil(8)])
    }
}

impl AsRef<[u8]> for Aligned {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: u64 storage viewed as bytes; same allocation and length.
        unsafe { std::slice::from_raw_parts(self.0.as_ptr() as *const u8, self.0.len() * 8) }
    }
}

impl AsMut<[u8]> for Aligned {
    fn as_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, with exclusive access through `&mut self`.
        unsafe { std::slice::from_raw_parts_mut(self.0.as_mut_ptr() as *mut u8, self.0.len() * 8) }
    }
}

/// A zeroed in-memory region of at least `len` bytes.
///
/// # Panics
/// If `len` is smaller than the region header.
pub fn heap_region(len: usize) -> RegionAccessor<Aligned> {
    match RegionAccessor::new(Aligned::zeroed(len)) {
        Ok(region) => region,
        Err(e) => panic!("heap region of {len} bytes: {e}"),
    }
}
