//! Latency report for the shared-memory candle region.
//!
//! Prints percentile tables for the writer and reader paths and a short
//! concurrent run, then saves everything as JSON under `target/`.

use quartz_perf::{
    Measurement, Plan, format_bytes, make_test_candles, measure, table, temp_region_name,
};
use quartz_store::{ReadError, RegionReader, RegionWriter};
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const REGION_SIZE: usize = 64 << 20;
const BATCH_SIZES: [usize; 3] = [1, 500, 5_000];
const SOAK_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Default, serde::Serialize)]
struct SoakSummary {
    writes: u64,
    reads: u64,
    stalls: u64,
    elapsed_ms: u128,
}

fn main() {
    let mut results: Vec<Measurement> = Vec::new();

    table::title("Writer");
    table::columns();
    section_writer(&mut results);

    table::title("Reader");
    table::columns();
    section_reader(&mut results);

    table::title("Concurrent writer + reader");
    let soak = section_soak();

    save_results(&results, &soak);
}

fn section_writer(results: &mut Vec<Measurement>) {
    let name = temp_region_name("report_write");
    let mut writer = RegionWriter::new();
    writer
        .create(&name, REGION_SIZE)
        .expect("failed to create region");

    for count in BATCH_SIZES {
        let candles = make_test_candles(count);
        let result = measure(format!("write_candles ({count})"), count, Plan::default(), || {
            writer
                .write_candles("BTCUSDT", "1h", black_box(&candles))
                .expect("write failed");
        });
        table::row(&result);
        results.push(result);
    }

    let stats = writer.stats();
    println!(
        "\n  {} transactions, {} used",
        stats.write_count,
        format_bytes(stats.memory_used as u64)
    );

    drop(writer);
    let _ = RegionReader::remove(&name);
}

fn section_reader(results: &mut Vec<Measurement>) {
    let name = temp_region_name("report_read");
    let mut writer = RegionWriter::new();
    writer
        .create(&name, REGION_SIZE)
        .expect("failed to create region");
    for count in BATCH_SIZES {
        writer
            .write_candles(&format!("S{count}"), "1h", &make_test_candles(count))
            .expect("write failed");
    }
    let reader = RegionReader::open(&name).expect("failed to open reader");

    for count in BATCH_SIZES {
        let symbol = format!("S{count}");
        let result = measure(format!("read_candles ({count})"), count, Plan::default(), || {
            black_box(reader.read_candles(&symbol).expect("read failed"));
        });
        table::row(&result);
        results.push(result);
    }

    let plan = Plan {
        calls_per_sample: 100,
        ..Plan::default()
    };
    let result = measure("symbols", 0, plan, || {
        black_box(reader.symbols().expect("symbols failed"));
    });
    table::row(&result);
    results.push(result);

    drop(writer);
    drop(reader);
    let _ = RegionReader::remove(&name);
}

/// A writer thread rewrites one symbol as fast as it can while a reader
/// thread keeps reading it. Every read must come back whole.
fn section_soak() -> SoakSummary {
    let name = temp_region_name("report_soak");
    let mut writer = RegionWriter::new();
    writer
        .create(&name, REGION_SIZE)
        .expect("failed to create region");
    writer
        .write_candles("BTCUSDT", "1h", &make_test_candles(500))
        .expect("write failed");

    let done = Arc::new(AtomicBool::new(false));
    let reader_thread = {
        let done = Arc::clone(&done);
        let name = name.clone();
        thread::spawn(move || {
            let reader = RegionReader::open(&name)
                .expect("failed to open reader")
                .with_spin_limit(1 << 16);
            let (mut reads, mut stalls) = (0u64, 0u64);
            while !done.load(Ordering::Acquire) {
                match reader.read_candles("BTCUSDT") {
                    Ok(Some(series)) => {
                        assert_eq!(series.candles.len(), 500, "torn read");
                        reads += 1;
                    }
                    Ok(None) => panic!("symbol vanished"),
                    Err(ReadError::WriterStalled { .. }) => stalls += 1,
                    Err(e) => panic!("read failed: {e}"),
                }
            }
            (reads, stalls)
        })
    };

    let candles = make_test_candles(500);
    let start = Instant::now();
    let mut writes = 0u64;
    while start.elapsed() < SOAK_DURATION {
        writer
            .write_candles("BTCUSDT", "1h", &candles)
            .expect("write failed");
        writes += 1;
    }
    done.store(true, Ordering::Release);
    let (reads, stalls) = reader_thread.join().expect("reader thread panicked");

    let summary = SoakSummary {
        writes,
        reads,
        stalls,
        elapsed_ms: start.elapsed().as_millis(),
    };
    println!(
        "  writes: {}  reads: {}  stalled reads: {}  elapsed: {} ms",
        summary.writes, summary.reads, summary.stalls, summary.elapsed_ms
    );

    drop(writer);
    let _ = RegionReader::remove(&name);
    summary
}

fn save_results(results: &[Measurement], soak: &SoakSummary) {
    let report = serde_json::json!({
        "results": results,
        "soak": soak,
    });
    let path = std::path::Path::new("target").join("quartz_region_report.json");
    match serde_json::to_string_pretty(&report) {
        Ok(json) => match std::fs::write(&path, json) {
            Ok(()) => println!("\n  Results saved to {}", path.display()),
            Err(e) => eprintln!("\n  Failed to write {}: {e}", path.display()),
        },
        Err(e) => eprintln!("\n  Failed to serialize results: {e}"),
    }
}
