use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kumo::SourceMap;

use mimalloc::MiMalloc;
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Builds a minified-bundle-shaped `mappings` string: `lines` generated
/// lines with `segments` mappings each, every fourth one carrying a name.
fn synthetic_mappings(lines: u32, segments: u32) -> (String, Vec<String>, Vec<String>) {
    let sources: Vec<String> = (0..32).map(|i| format!("module_{i}.js")).collect();
    let names: Vec<String> = (0..64).map(|i| format!("symbol_{i}")).collect();

    let mut map = SourceMap::new();
    for line in 0..lines {
        for segment in 0..segments {
            let column = segment * 3;
            let source = (line + segment) % 32;
            let mapping = kumo::IndexedMapping {
                generated: kumo::Position::new(line + 1, column),
                original: Some(kumo::Position::new(line % 100 + 1, segment % 40)),
                source: Some(&sources[source as usize]),
                name: (segment % 4 == 0).then(|| names[(segment % 64) as usize].as_str()),
            };
            map.add_indexed_mapping(mapping, 0, 0);
        }
    }
    let out = map.to_vlq().unwrap();
    (out.mappings, out.sources, out.names)
}

fn benchmark_parse(c: &mut Criterion) {
    let (mappings, sources, names) = synthetic_mappings(2_000, 60);

    let mut bg = c.benchmark_group("vlq");
    bg.bench_function("ingest", |b| {
        b.iter(|| {
            let mut map = SourceMap::new();
            // a line offset forces the full decode instead of the raw cache
            map.add_vlq_mappings(&mappings, &sources, &[], &names, 1, 0)
                .unwrap();
            black_box(map);
        })
    });
    bg.bench_function("ingest_raw_cached", |b| {
        b.iter(|| {
            let mut map = SourceMap::new();
            map.add_vlq_mappings(&mappings, &sources, &[], &names, 0, 0)
                .unwrap();
            black_box(map.to_vlq().unwrap());
        })
    });
    bg.bench_function("reencode", |b| {
        let mut map = SourceMap::new();
        map.add_vlq_mappings(&mappings, &sources, &[], &names, 1, 0)
            .unwrap();
        b.iter(|| black_box(map.to_vlq().unwrap()));
    });
    bg.finish();

    let mut bg = c.benchmark_group("buffer");
    let mut map = SourceMap::new();
    map.add_vlq_mappings(&mappings, &sources, &[], &names, 0, 0)
        .unwrap();
    let blob = map.to_buffer();
    bg.bench_function("to_buffer", |b| b.iter(|| black_box(map.to_buffer())));
    bg.bench_function("from_buffer", |b| {
        b.iter(|| black_box(SourceMap::from_buffer(&blob).unwrap()))
    });
    bg.finish();
}

criterion_group!(parse, benchmark_parse);
criterion_main!(parse);
