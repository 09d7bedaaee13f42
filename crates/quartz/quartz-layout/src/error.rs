#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("access of {len} bytes at offset {offset} exceeds region of {region_len} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        region_len: usize,
    },

    #[error("buffer of {actual} bytes is shorter than the {needed}-byte record")]
    ShortBuffer { needed: usize, actual: usize },

    #[error("region of {0} bytes cannot hold the header")]
    TooSmall(usize),

    #[error("region base address is not 8-byte aligned")]
    Misaligned,

    #[error("bad magic 0x{0:08x}")]
    BadMagic(u32),

    #[error("unsupported region version {0}")]
    UnsupportedVersion(u32),

    #[error("corrupt data block at offset {offset}: {reason}")]
    CorruptBlock { offset: u64, reason: &'static str },
}

#[inline]
pub(crate) fn check_len(buf_len: usize, needed: usize) -> Result<(), LayoutError> {
    if buf_len < needed {
        return Err(LayoutError::ShortBuffer {
            needed,
            actual: buf_len,
        });
    }
    Ok(())
}
