use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use tankstack_logic::catalog::SegmentCatalog;
use tankstack_logic::diagnostics::Diagnostics;
use tankstack_logic::packer::pack;
use tankstack_logic::segment::{Alignment, AlignmentSet, Asset, RoleSet, SegmentDef};
use tankstack_logic::selection::SelectedSegments;
use tankstack_logic::solver::{solve, SolverConfig, StackRequest};

fn catalog() -> SegmentCatalog {
    let mut diag = Diagnostics::new();
    let mut catalog = SegmentCatalog::new();
    let mut tank = SegmentDef::new("tank", RoleSet::TANK_BODY).with_min_tank_aspect(0.25);
    for (i, aspect) in [0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 4.0].into_iter().enumerate() {
        tank = tank.with_asset(Asset::new(format!("tank-{i}"), aspect));
    }
    let defs = [
        tank,
        SegmentDef::new("ring", RoleSet::INTERTANK).with_asset(Asset::new("ring", 0.2)),
        SegmentDef::new("dome", RoleSet::CAP_TERMINAL)
            .with_alignments(AlignmentSet::ALL)
            .with_asset(Asset::new("dome", 0.5)),
        SegmentDef::new("nose", RoleSet::CAP_TERMINAL)
            .with_alignments(AlignmentSet::ALL)
            .with_asset(Asset::new("nose", 1.4)),
    ];
    for def in defs {
        catalog
            .insert(def, &mut diag)
            .expect("bench catalog names are unique");
    }
    catalog
}

fn bench_pack(c: &mut Criterion) {
    let aspects = [0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 4.0];
    let mut group = c.benchmark_group("pack");
    for target in [1.3_f32, 7.9, 31.7, 127.3] {
        group.bench_with_input(BenchmarkId::from_parameter(target), &target, |b, &t| {
            b.iter(|| pack(black_box(&aspects), black_box(t), 256))
        });
    }
    group.finish();
}

fn bench_solve(c: &mut Criterion) {
    let catalog = catalog();
    let config = SolverConfig::default();
    let mut group = c.benchmark_group("solve");
    for compartments in [1usize, 2, 4] {
        let skin = SelectedSegments::new("tank", "dome", "dome")
            .with_intertank("ring")
            .with_alignment(Alignment::PinInteriorEnd, Alignment::PinInteriorEnd);
        let core = SelectedSegments::new("tank", "nose", "dome")
            .with_intertank("ring")
            .with_alignment(Alignment::PinInteriorEnd, Alignment::PinInteriorEnd);
        let request = StackRequest::new(2.5, 24.0, skin, core)
            .with_fractions(vec![1.0; compartments]);
        group.bench_with_input(
            BenchmarkId::from_parameter(compartments),
            &request,
            |b, request| b.iter(|| solve(&catalog, black_box(request), &config)),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_pack, bench_solve);
criterion_main!(benches);
