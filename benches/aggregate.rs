//! Aggregation benchmarks
//!
//! Index build and rollup/fan-out counting over a synthetic occurrence table
//! shaped like the palm data set (a few thousand species, a few hundred codes).
//!
//! Run with: cargo bench --bench aggregate

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use species_map_builder::{Aggregator, RegionCode, SpeciesLocationIndex, SpeciesOccurrence, SubdivisionMap};

fn synthetic_code(i: usize) -> RegionCode {
    let letters = [
        b'A' + (i / 676 % 26) as u8,
        b'A' + (i / 26 % 26) as u8,
        b'A' + (i % 26) as u8,
    ];
    RegionCode::parse(std::str::from_utf8(&letters).unwrap_or("AAA")).unwrap()
}

fn occurrences(species: usize, codes: usize) -> Vec<SpeciesOccurrence> {
    let builtin: Vec<RegionCode> = SubdivisionMap::builtin().all_codes().into_iter().cloned().collect();
    (0..species)
        .map(|s| {
            let mut regions: Vec<RegionCode> = (0..4).map(|k| synthetic_code((s * 7 + k * 31) % codes)).collect();
            regions.push(builtin[s % builtin.len()].clone());
            SpeciesOccurrence::new(format!("Species {}", s), regions)
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let rows = occurrences(2_500, 370);
    let map = SubdivisionMap::builtin();

    let mut group = c.benchmark_group("aggregate");

    group.bench_function("index_build", |b| {
        b.iter(|| SpeciesLocationIndex::build(black_box(&rows)))
    });

    let index = SpeciesLocationIndex::build(&rows);
    group.bench_function("aggregate_all", |b| {
        let aggregator = Aggregator::new(&index, &map);
        b.iter(|| aggregator.aggregate(std::iter::empty()))
    });

    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
