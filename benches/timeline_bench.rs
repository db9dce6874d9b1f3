//! Benchmark for timeline upserts and statistics recounts

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nft_orchestrator::statistics::Statistics;
use nft_orchestrator::timeline::{lines, LineStatus, Timeline, TimelineGroup, TimelineItem};

const STEPS: [&str; 6] = [
    lines::TX_PREPARED,
    lines::TX_SIGNED,
    lines::TX_PROVED,
    lines::TX_SENT,
    lines::TX_INCLUDED,
    lines::MINTED,
];

fn populated(groups: usize) -> Timeline {
    let mut timeline = Timeline::new();
    timeline.add_group(TimelineGroup::new(lines::BATCH_GROUP, "batch").pinned());
    for index in 0..groups {
        let group_id = format!("mint-{}", index + 1);
        timeline.add_group(TimelineGroup::new(group_id.clone(), "Mint NFT").with_required(STEPS));
        for (step, line) in STEPS.iter().enumerate() {
            let status = if (index + step) % 7 == 0 {
                LineStatus::Waiting
            } else {
                LineStatus::Success
            };
            timeline.update_item(&group_id, TimelineItem::new(*line, "done", status));
        }
    }
    timeline
}

fn bench_update_item(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline");

    for size in [1, 10, 100].iter() {
        let timeline = populated(*size);
        let target = format!("mint-{}", size);

        group.bench_with_input(BenchmarkId::new("update_item", size), &timeline, |b, timeline| {
            b.iter_batched(
                || timeline.clone(),
                |mut timeline| {
                    black_box(timeline.update_item(
                        black_box(&target),
                        TimelineItem::success(lines::TX_INCLUDED, "Transaction included"),
                    ))
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");

    for size in [10, 100, 1000].iter() {
        let timeline = populated(*size);
        group.bench_with_input(BenchmarkId::new("collect", size), &timeline, |b, timeline| {
            b.iter(|| black_box(Statistics::collect(black_box(timeline)).expecting(*size)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_update_item, bench_statistics);
criterion_main!(benches);
