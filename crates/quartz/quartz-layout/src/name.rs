use crate::region_layout::{INTERVAL_SIZE, SYMBOL_NAME_SIZE};
use std::fmt;

/// A NUL-terminated name stored in a fixed `N`-byte field.
///
/// At most `N - 1` bytes are kept; longer input is silently truncated and the
/// remainder of the field is zero. Two names that share the same first
/// `N - 1` bytes therefore compare equal, which is a known limit of the format.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedName<const N: usize> {
    bytes: [u8; N],
}

pub type SymbolName = FixedName<SYMBOL_NAME_SIZE>;
pub type IntervalName = FixedName<INTERVAL_SIZE>;

impl<const N: usize> FixedName<N> {
    /// Builds a name from a string, stopping at an interior NUL and truncating
    /// to `N - 1` bytes.
    pub fn new(name: &str) -> Self {
        Self::from_raw(name.as_bytes())
    }

    /// Builds a name from raw field bytes as found in the region.
    pub fn from_raw(raw: &[u8]) -> Self {
        let usable = N.saturating_sub(1);
        let end = raw
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(raw.len())
            .min(usable);

        let mut bytes = [0u8; N];
        bytes[..end].copy_from_slice(&raw[..end]);
        Self { bytes }
    }

    /// The name without its NUL padding.
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(N);
        &self.bytes[..end]
    }

    /// The full field, padding included, exactly as it is stored.
    #[inline]
    pub fn field(&self) -> &[u8; N] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.first().is_none_or(|&b| b == 0)
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl<const N: usize> Default for FixedName<N> {
    fn default() -> Self {
        Self { bytes: [0u8; N] }
    }
}

impl<const N: usize> fmt::Debug for FixedName<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl<const N: usize> fmt::Display for FixedName<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_kept_verbatim() {
        let name = SymbolName::new("BTCUSDT");
        assert_eq!(name.as_bytes(), b"BTCUSDT");
        assert_eq!(&name.field()[7..], &[0u8; 9]);
        assert_eq!(name.to_string(), "BTCUSDT");
    }

    #[test]
    fn long_names_truncate_to_fifteen_bytes() {
        let name = SymbolName::new("ABCDEFGHIJKLMNOPQRST");
        assert_eq!(name.as_bytes(), b"ABCDEFGHIJKLMNO");
        assert_eq!(name.field()[15], 0);

        // Truncation collisions compare equal.
        assert_eq!(name, SymbolName::new("ABCDEFGHIJKLMNOxyz"));
    }

    #[test]
    fn interval_keeps_seven_bytes() {
        let interval = IntervalName::new("12months");
        assert_eq!(interval.as_bytes(), b"12month");
    }

    #[test]
    fn interior_nul_ends_the_name() {
        let name = SymbolName::new("ETH\0USDT");
        assert_eq!(name.as_bytes(), b"ETH");
        assert_eq!(name, SymbolName::from_raw(b"ETH\0\0garbage"));
    }

    #[test]
    fn empty_name() {
        assert!(SymbolName::new("").is_empty());
        assert!(SymbolName::default().is_empty());
        assert!(!SymbolName::new("X").is_empty());
    }
}
