mod config;

pub use config::{ConfigError, QuartzConfig, SymbolFeed};
