use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kiln_version::{Version, VersionConstraint};

fn bench_parse_versions(c: &mut Criterion) {
    let versions = [
        "1.2.3",
        "6.0.2",
        "2021.11.08",
        "1.0rc1",
        "develop",
        "3.19.0",
        "14.0.6",
        "2.4_beta",
    ];

    c.bench_function("parse_versions", |b| {
        b.iter(|| {
            for version in versions {
                black_box(Version::parse(black_box(version)).ok());
            }
        })
    });
}

fn bench_compare_versions(c: &mut Criterion) {
    let pairs: Vec<(Version, Version)> = [
        ("1.2.3", "1.2.4"),
        ("1.10", "1.9"),
        ("develop", "999.0"),
        ("1.0rc1", "1.0"),
        ("2021.11.08", "2021.11"),
    ]
    .iter()
    .filter_map(|(a, b)| Some((Version::parse(a).ok()?, Version::parse(b).ok()?)))
    .collect();

    c.bench_function("compare_versions", |b| {
        b.iter(|| {
            for (left, right) in &pairs {
                black_box(left.cmp(right));
            }
        })
    });
}

fn bench_constraints(c: &mut Criterion) {
    let constraints = ["1.2:1.4", ":8", "3.19:", "=6.0.2", "5.2,5.4:5.7,6:"];
    let candidates: Vec<Version> = ["1.3", "7.5", "3.27.9", "6.0.2", "5.5.1"]
        .iter()
        .filter_map(|s| Version::parse(s).ok())
        .collect();

    c.bench_function("parse_constraints", |b| {
        b.iter(|| {
            for constraint in constraints {
                black_box(VersionConstraint::parse(black_box(constraint)).ok());
            }
        })
    });

    let parsed: Vec<VersionConstraint> = constraints
        .iter()
        .filter_map(|s| VersionConstraint::parse(s).ok())
        .collect();

    c.bench_function("constraint_contains", |b| {
        b.iter(|| {
            for constraint in &parsed {
                for version in &candidates {
                    black_box(constraint.contains(version));
                }
            }
        })
    });
}

criterion_group!(benches, bench_parse_versions, bench_compare_versions, bench_constraints);
criterion_main!(benches);
