use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use quartz_perf::{make_test_candles, temp_region_name};
use quartz_store::{RegionReader, RegionWriter};

const REGION_SIZE: usize = 64 << 20;

fn bench_read_candles(c: &mut Criterion) {
    let name = temp_region_name("crit_read");
    let mut writer = RegionWriter::new();
    writer
        .create(&name, REGION_SIZE)
        .expect("failed to create region");
    let reader = RegionReader::open(&name).expect("failed to open reader");

    let mut group = c.benchmark_group("reader");
    for &count in &[1usize, 100, 500, 5_000] {
        let symbol = format!("S{count}");
        writer
            .write_candles(&symbol, "1h", &make_test_candles(count))
            .expect("write failed");

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("read_candles", count), &symbol, |b, symbol| {
            b.iter(|| black_box(reader.read_candles(black_box(symbol)).expect("read failed")));
        });
    }
    group.finish();

    drop(writer);
    drop(reader);
    let _ = RegionReader::remove(&name);
}

fn bench_metadata(c: &mut Criterion) {
    let name = temp_region_name("crit_meta");
    let mut writer = RegionWriter::new();
    writer
        .create(&name, REGION_SIZE)
        .expect("failed to create region");
    let candles = make_test_candles(10);
    for i in 0..64 {
        writer
            .write_candles(&format!("SYM{i}"), "1h", &candles)
            .expect("write failed");
    }
    let reader = RegionReader::open(&name).expect("failed to open reader");

    let mut group = c.benchmark_group("reader");
    group.throughput(Throughput::Elements(1));
    group.bench_function("sequence", |b| b.iter(|| black_box(reader.sequence())));
    group.bench_function("header", |b| {
        b.iter(|| black_box(reader.header().expect("header failed")))
    });
    group.bench_function("symbols (64)", |b| {
        b.iter(|| black_box(reader.symbols().expect("symbols failed")))
    });
    group.bench_function("read_candles (missing)", |b| {
        b.iter(|| black_box(reader.read_candles("NOPE").expect("read failed")))
    });
    group.finish();

    drop(writer);
    drop(reader);
    let _ = RegionReader::remove(&name);
}

criterion_group!(benches, bench_read_candles, bench_metadata);
criterion_main!(benches);
