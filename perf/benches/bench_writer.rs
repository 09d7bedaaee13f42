use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use quartz_perf::{make_test_candles, temp_region_name};
use quartz_store::{RegionReader, RegionWriter};

const REGION_SIZE: usize = 64 << 20;

fn bench_write_in_place(c: &mut Criterion) {
    let name = temp_region_name("crit_write");
    let mut writer = RegionWriter::new();
    writer
        .create(&name, REGION_SIZE)
        .expect("failed to create region");

    let mut group = c.benchmark_group("writer");
    for &count in &[1usize, 100, 500, 5_000] {
        let candles = make_test_candles(count);
        // First write allocates; every timed write reuses the block.
        writer
            .write_candles("BTCUSDT", "1h", &candles)
            .expect("warmup write failed");

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("write_candles", count), &candles, |b, candles| {
            b.iter(|| {
                writer
                    .write_candles(black_box("BTCUSDT"), "1h", black_box(candles))
                    .expect("write failed")
            });
        });
    }
    group.finish();

    drop(writer);
    let _ = RegionReader::remove(&name);
}

fn bench_write_many_symbols(c: &mut Criterion) {
    let name = temp_region_name("crit_symbols");
    let mut writer = RegionWriter::new();
    writer
        .create(&name, REGION_SIZE)
        .expect("failed to create region");

    let symbols: Vec<String> = (0..256).map(|i| format!("SYM{i:03}USDT")).collect();
    let candles = make_test_candles(100);
    for symbol in &symbols {
        writer
            .write_candles(symbol, "1h", &candles)
            .expect("warmup write failed");
    }

    let mut group = c.benchmark_group("writer");
    group.throughput(Throughput::Elements(1));
    // Lookup is a linear scan; the last symbol is the worst case.
    group.bench_function("write_candles (256th symbol)", |b| {
        b.iter(|| {
            writer
                .write_candles(black_box(&symbols[255]), "1h", &candles)
                .expect("write failed")
        });
    });
    group.bench_function("stats (256 symbols)", |b| {
        b.iter(|| black_box(writer.stats()));
    });
    group.finish();

    drop(writer);
    let _ = RegionReader::remove(&name);
}

criterion_group!(benches, bench_write_in_place, bench_write_many_symbols);
criterion_main!(benches);
