//! Benchmarks for composite queries.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use stagestatus::prelude::*;
use stagestatus::testing::PipelineFixture;

const STAGES: u32 = 10;
const JOBS_PER_STAGE: u32 = 500;

const STATUSES: [JobStatus; 6] = [
    JobStatus::Success,
    JobStatus::Running,
    JobStatus::Created,
    JobStatus::Pending,
    JobStatus::Skipped,
    JobStatus::Manual,
];

fn large_pipeline() -> PipelineFixture {
    let mut fixture = PipelineFixture::default();
    for stage in 0..STAGES {
        for job in 0..JOBS_PER_STAGE {
            let status = STATUSES[((stage + job) as usize) % STATUSES.len()];
            let name = format!("job-{stage}-{job}");
            fixture = if job % 7 == 0 {
                fixture.allowed_failure(&name, status, stage)
            } else {
                fixture.job(&name, status, stage)
            };
        }
    }
    fixture
}

fn composite_benchmark(c: &mut Criterion) {
    let fixture = large_pipeline();

    c.bench_function("composite_of_all", |b| {
        b.iter_batched(
            || {
                let mut collection = fixture.collection();
                collection.load().unwrap();
                collection
            },
            |mut collection| black_box(collection.composite_of_all().unwrap()),
            BatchSize::LargeInput,
        );
    });

    c.bench_function("before_stage_all_positions", |b| {
        b.iter_batched(
            || {
                let mut collection = fixture.collection();
                collection.load().unwrap();
                collection
            },
            |mut collection| {
                for position in 0..=STAGES {
                    black_box(collection.composite_before_stage_position(position).unwrap());
                }
            },
            BatchSize::LargeInput,
        );
    });

    let needs: Vec<String> = (0..STAGES).map(|stage| format!("job-{stage}-2")).collect();
    c.bench_function("dag_names_expanded", |b| {
        b.iter_batched(
            || {
                let mut collection = fixture.collection();
                collection.load().unwrap();
                collection
            },
            |mut collection| {
                black_box(collection.composite_for_names(&needs, Discipline::Dag).unwrap())
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, composite_benchmark);
criterion_main!(benches);
