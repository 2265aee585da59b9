use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ip2mmdb::{decode, ingest_csv, DatasetKind, MmdbWriter, Sink, WriterOptions};
use std::fmt::Write as _;
use std::hint::black_box;

const COUNTRIES: [(&str, &str); 5] = [
    ("AU", "Australia"),
    ("CN", "China"),
    ("DE", "Germany"),
    ("JP", "Japan"),
    ("US", "United States"),
];

/// Contiguous /24 ranges starting at 1.0.0.0, cycling through a few countries
fn country_csv(rows: usize) -> String {
    let mut csv = String::with_capacity(rows * 48);
    for i in 0..rows {
        let start = 0x0100_0000u64 + (i as u64) * 256;
        let (code, name) = COUNTRIES[i % COUNTRIES.len()];
        let _ = writeln!(csv, "\"{}\",\"{}\",\"{}\",\"{}\"", start, start + 255, code, name);
    }
    csv
}

/// IPv6 /48 ranges, each row with its own city
fn city_csv(rows: usize) -> String {
    let mut csv = String::with_capacity(rows * 160);
    for i in 0..rows {
        let start = (0x2001_0db8u128 << 96) + ((i as u128) << 80);
        let end = start + (1u128 << 80) - 1;
        let _ = writeln!(
            csv,
            "\"{}\",\"{}\",\"AU\",\"Australia\",\"Queensland\",\"City {}\",\"-27.46794\",\"153.02809\",\"{}\"",
            start,
            end,
            i,
            4000 + i % 100
        );
    }
    csv
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for literal in ["16777216", "281474976710656", "340282366920938463463374607431768211455"] {
        group.bench_with_input(BenchmarkId::from_parameter(literal.len()), literal, |b, s| {
            b.iter(|| decode(black_box(s)).unwrap());
        });
    }
    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");

    for rows in [1_000, 10_000].iter() {
        let country = country_csv(*rows);
        let city = city_csv(*rows);

        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::new("country_ipv4", rows), &country, |b, csv| {
            b.iter(|| {
                let summary = ingest_csv(csv.as_bytes(), DatasetKind::Country, || {
                    MmdbWriter::new(WriterOptions::for_dataset(DatasetKind::Country))
                })
                .unwrap();
                let mut out = Vec::new();
                if let Some(mut writer) = summary.sink {
                    writer.finalize(&mut out).unwrap();
                }
                black_box(out);
            });
        });

        group.bench_with_input(BenchmarkId::new("city_ipv6", rows), &city, |b, csv| {
            b.iter(|| {
                let summary = ingest_csv(csv.as_bytes(), DatasetKind::City, || {
                    MmdbWriter::new(WriterOptions::for_dataset(DatasetKind::City))
                })
                .unwrap();
                let mut out = Vec::new();
                if let Some(mut writer) = summary.sink {
                    writer.finalize(&mut out).unwrap();
                }
                black_box(out);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_ingest);
criterion_main!(benches);
