//! Follows a shared-memory region and logs each symbol's latest candle
//! whenever the writer commits.

use anyhow::Context;
use quartz_config::QuartzConfig;
use quartz_store::RegionReader;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "QUARTZ_CONFIG";

fn main() -> anyhow::Result<()> {
    let config = match std::env::var(CONFIG_ENV) {
        Ok(path) => QuartzConfig::load(path).context("loading config")?,
        Err(_) => QuartzConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let poll = Duration::from_millis(config.poll_interval_ms);
    let reader = loop {
        match RegionReader::open(&config.region_name) {
            Ok(reader) => break reader,
            Err(e) => {
                warn!(region = %config.region_name, error = %e, "QUARTZ-TAIL: waiting for region");
                std::thread::sleep(poll.max(Duration::from_secs(1)));
            }
        }
    };

    let mut seen = u64::MAX;
    loop {
        let writes = reader.write_count();
        if writes != seen {
            seen = writes;
            for entry in reader.symbols().context("reading symbol index")? {
                let symbol = entry.symbol.to_string_lossy();
                let Some(series) = reader
                    .read_candles(&symbol)
                    .with_context(|| format!("reading {symbol}"))?
                else {
                    continue;
                };
                if let Some(last) = series.candles.last() {
                    info!(
                        symbol = %series.symbol,
                        interval = %series.interval,
                        candles = series.candles.len(),
                        ts = last.timestamp,
                        open = last.open,
                        high = last.high,
                        low = last.low,
                        close = last.close,
                        volume = last.volume,
                        writes,
                        "QUARTZ-TAIL: latest"
                    );
                }
            }
        }
        std::thread::sleep(poll);
    }
}
