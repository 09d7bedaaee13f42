//! Shared helpers for the region latency report and the criterion benches.

use quartz_store::Candle;
use std::time::Instant;

/// Latency distribution of one measured operation, in nanoseconds.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Latency {
    pub min: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
    pub mean: f64,
    pub stddev: f64,
    pub samples: usize,
}

impl Latency {
    /// Summarizes `samples`, sorting them in place. `None` if there are none.
    pub fn from_samples(samples: &mut [u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let variance = samples
            .iter()
            .map(|&s| (s as f64 - mean).powi(2))
            .sum::<f64>()
            / n;

        Some(Self {
            min: samples[0],
            p50: nearest_rank(samples, 50.0),
            p90: nearest_rank(samples, 90.0),
            p99: nearest_rank(samples, 99.0),
            p999: nearest_rank(samples, 99.9),
            max: samples[samples.len() - 1],
            mean,
            stddev: variance.sqrt(),
            samples: samples.len(),
        })
    }
}

/// Nearest-rank percentile of a non-empty sorted slice.
fn nearest_rank(sorted: &[u64], pct: f64) -> u64 {
    let rank = (pct / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Measurement {
    pub name: String,
    /// Candles moved per call, 0 for calls that move none.
    pub candles_per_call: usize,
    pub latency: Latency,
}

impl Measurement {
    /// Candles per second at the median latency.
    pub fn median_throughput(&self) -> f64 {
        if self.latency.p50 == 0 {
            return 0.0;
        }
        self.candles_per_call as f64 * 1e9 / self.latency.p50 as f64
    }
}

/// How many times to call the operation under test.
#[derive(Debug, Clone, Copy)]
pub struct Plan {
    pub warmup_calls: usize,
    pub samples: usize,
    /// Calls timed together per sample; the sample is their rounded mean.
    pub calls_per_sample: usize,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            warmup_calls: 100,
            samples: 200,
            calls_per_sample: 50,
        }
    }
}

/// Times `op` according to `plan`.
pub fn measure(
    name: impl Into<String>,
    candles_per_call: usize,
    plan: Plan,
    mut op: impl FnMut(),
) -> Measurement {
    for _ in 0..plan.warmup_calls {
        op();
    }

    let per_sample = plan.calls_per_sample.max(1) as u128;
    // At least one sample, so the summary always exists.
    let mut samples: Vec<u64> = (0..plan.samples.max(1))
        .map(|_| {
            let start = Instant::now();
            for _ in 0..per_sample {
                op();
            }
            let mean = (start.elapsed().as_nanos() + per_sample / 2) / per_sample;
            (mean as u64).max(1)
        })
        .collect();

    Measurement {
        name: name.into(),
        candles_per_call,
        latency: Latency::from_samples(&mut samples).unwrap_or_else(|| unreachable!()),
    }
}

/// Region name unique to this process.
pub fn temp_region_name(label: &str) -> String {
    format!("quartz_bench_{label}_{}", std::process::id())
}

/// `count` hourly candles with plausible prices.
pub fn make_test_candles(count: usize) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let px = 42_000.0 + (i % 100) as f64;
            Candle::new(
                1_700_000_000_000 + i as u64 * 3_600_000,
                px,
                px + 25.0,
                px - 25.0,
                px + 10.0,
                1_234.5,
            )
        })
        .collect()
}

pub fn format_bytes(bytes: u64) -> String {
    match bytes {
        b if b >= 1 << 20 => format!("{:.1} MB", b as f64 / (1u64 << 20) as f64),
        b if b >= 1 << 10 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{b} B"),
    }
}

/// Plain-text rendering of measurements for the terminal.
pub mod table {
    use super::Measurement;

    const RULE_WIDTH: usize = 96;

    pub fn title(text: &str) {
        println!("\n{text}\n{}", "=".repeat(RULE_WIDTH));
    }

    pub fn columns() {
        println!(
            "{:<28} {:>8} {:>8} {:>8} {:>8} {:>9} {:>14}",
            "operation", "min", "p50", "p99", "p99.9", "max", "candles/s @p50",
        );
        println!("{}", "-".repeat(RULE_WIDTH));
    }

    pub fn row(m: &Measurement) {
        let l = &m.latency;
        let throughput = match m.candles_per_call {
            0 => "-".to_owned(),
            _ => format!("{:.0}", m.median_throughput()),
        };
        println!(
            "{:<28} {:>8} {:>8} {:>8} {:>8} {:>9} {:>14}",
            m.name, l.min, l.p50, l.p99, l.p999, l.max, throughput,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_over_known_samples() {
        let mut samples: Vec<u64> = (1..=100).rev().collect();
        let l = Latency::from_samples(&mut samples).unwrap();
        assert_eq!((l.min, l.p50, l.p90, l.p99, l.max), (1, 50, 90, 99, 100));
        assert_eq!(l.p999, 100);
        assert_eq!(l.samples, 100);
        assert!((l.mean - 50.5).abs() < 1e-9);
    }

    #[test]
    fn single_sample_is_every_percentile() {
        let l = Latency::from_samples(&mut [7]).unwrap();
        assert_eq!((l.p50, l.p999, l.stddev), (7, 7, 0.0));
        assert!(Latency::from_samples(&mut []).is_none());
    }

    #[test]
    fn measure_runs_warmup_and_every_sample() {
        let mut calls = 0usize;
        let plan = Plan {
            warmup_calls: 3,
            samples: 4,
            calls_per_sample: 5,
        };
        let m = measure("count", 10, plan, || calls += 1);
        assert_eq!(calls, 3 + 4 * 5);
        assert_eq!(m.latency.samples, 4);
        assert!(m.latency.min >= 1);
        assert!(m.median_throughput() > 0.0);
    }

    #[test]
    fn measurement_serializes_for_the_json_report() {
        let m = Measurement {
            name: "read_candles (1)".into(),
            candles_per_call: 1,
            latency: Latency::from_samples(&mut [1_000]).unwrap(),
        };
        assert_eq!(m.median_throughput(), 1_000_000.0);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["latency"]["p50"], 1_000);
        assert_eq!(json["candles_per_call"], 1);
    }

    #[test]
    fn helpers_produce_ordered_candles_and_readable_sizes() {
        let candles = make_test_candles(3);
        assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 << 20), "3.0 MB");
    }
}
