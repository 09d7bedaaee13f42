//! Byte-exact format of the shared OHLCV region.
//!
//! Every structure here is encoded field by field at a fixed offset in
//! little-endian order. Nothing relies on Rust's native struct layout, so a
//! reader written in any language sees the same bytes the writer produced.

mod accessor;
mod block;
mod candle;
mod error;
mod header;
mod index_entry;
mod name;
pub mod region_layout;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use accessor::RegionAccessor;
pub use block::BlockHeader;
pub use candle::Candle;
pub use error::LayoutError;
pub use header::RegionHeader;
pub use index_entry::SymbolIndexEntry;
pub use name::{FixedName, IntervalName, SymbolName};
