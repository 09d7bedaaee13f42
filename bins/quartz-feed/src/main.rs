//! Publishes synthetic OHLCV candles into a shared-memory region.
//!
//! Settings come from the TOML file named by `QUARTZ_CONFIG`, or defaults.
//! `RUST_LOG` overrides the configured log level.

use anyhow::Context;
use quartz_config::QuartzConfig;
use quartz_store::{Candle, RegionWriter};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "QUARTZ_CONFIG";

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Candle spacing for an interval label such as `15m`, `1h` or `1d`.
fn interval_ms(interval: &str) -> u64 {
    let Some(unit) = interval.chars().last() else {
        return 60_000;
    };
    let n: u64 = interval[..interval.len() - unit.len_utf8()]
        .parse()
        .unwrap_or(1);
    match unit {
        'm' => n.saturating_mul(60_000),
        'h' => n.saturating_mul(3_600_000),
        'd' => n.saturating_mul(86_400_000),
        'w' => n.saturating_mul(604_800_000),
        _ => 60_000,
    }
}

/// A deterministic walk of `count` candles ending at `end_ms`.
fn synthetic_candles(count: usize, end_ms: u64, step_ms: u64, seed: f64) -> Vec<Candle> {
    let span = step_ms.saturating_mul(count.saturating_sub(1) as u64);
    let start = end_ms.saturating_sub(span);
    (0..count)
        .map(|i| {
            let t = seed + i as f64 * 0.05;
            let open = 100.0 + 10.0 * t.sin();
            let close = 100.0 + 10.0 * (t + 0.05).sin();
            Candle::new(
                start.saturating_add((i as u64).saturating_mul(step_ms)),
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                1_000.0 + 100.0 * t.cos().abs(),
            )
        })
        .collect()
}

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

    let mut writer = RegionWriter::new();
    writer
        .create(&config.region_name, config.region_size)
        .with_context(|| format!("creating region '{}'", config.region_name))?;

    info!(
        region = %config.region_name,
        symbols = config.symbols.len(),
        candles = config.candles_per_write,
        "QUARTZ-FEED: publishing"
    );

    let period = Duration::from_millis(config.publish_interval_ms);
    let mut round = 0u64;
    let mut last_report = Instant::now();

    loop {
        let started = Instant::now();
        let now = now_ms();
        for (i, feed) in config.symbols.iter().enumerate() {
            let seed = round as f64 * 0.05 + i as f64;
            let candles = synthetic_candles(
                config.candles_per_write,
                now,
                interval_ms(&feed.interval),
                seed,
            );
            writer
                .write_candles(&feed.symbol, &feed.interval, &candles)
                .with_context(|| format!("writing {}", feed.symbol))?;
        }
        round += 1;

        if last_report.elapsed() >= Duration::from_secs(10) {
            let stats = writer.stats();
            info!(
                writes = stats.write_count,
                symbols = stats.total_symbols,
                candles = stats.total_candles,
                memory_used = stats.memory_used,
                "QUARTZ-FEED: stats"
            );
            last_report = Instant::now();
        }

        if let Some(rest) = period.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}
