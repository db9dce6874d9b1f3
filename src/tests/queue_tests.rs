//! Update queue tests: cadence, ordering, immediate bypass, drain on stop

use crate::queue::UpdateQueue;
use crate::timeline::lines;
use crate::timeline::{LineStatus, SharedTimeline, Timeline, TimelineGroup, TimelineItem};
use parking_lot::RwLock;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(1_000);

fn shared(groups: &[&str]) -> SharedTimeline {
    let mut timeline = Timeline::new();
    for id in groups {
        timeline.add_group(TimelineGroup::new(*id, *id));
    }
    Arc::new(RwLock::new(timeline))
}

fn queue(timeline: &SharedTimeline) -> UpdateQueue {
    UpdateQueue::with_settings(Arc::clone(timeline), TICK, lines::DEFAULT_IMMEDIATE)
}

fn line_count(timeline: &SharedTimeline, group: &str) -> usize {
    timeline.read().group(group).map(|g| g.lines.len()).unwrap_or(0)
}

#[tokio::test(start_paused = true)]
async fn test_one_update_per_tick() {
    let timeline = shared(&["g1"]);
    let queue = queue(&timeline);
    queue.start();

    for i in 0..3 {
        queue.enqueue("g1", TimelineItem::waiting(format!("line-{}", i), "x"));
    }
    assert_eq!(queue.len(), 3);
    assert_eq!(line_count(&timeline, "g1"), 0);

    tokio::time::sleep(TICK + Duration::from_millis(10)).await;
    assert_eq!(line_count(&timeline, "g1"), 1);

    tokio::time::sleep(TICK).await;
    assert_eq!(line_count(&timeline, "g1"), 2);

    queue.stop().await;
    assert_eq!(line_count(&timeline, "g1"), 3);
    assert!(queue.is_empty());
    assert!(!queue.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_immediate_line_bypasses_cadence() {
    let timeline = shared(&["g1", "g2"]);
    let queue = queue(&timeline);
    queue.start();

    queue.enqueue("g2", TimelineItem::waiting(lines::TX_PREPARED, "preparing"));
    queue.enqueue("g1", TimelineItem::success(lines::TX_SIGNED, "signed"));

    // Visible right away, while g2's update still waits for the pump
    let signed = timeline.read().group("g1").unwrap().line(lines::TX_SIGNED).cloned();
    assert_eq!(signed.map(|l| l.status), Some(LineStatus::Success));
    assert_eq!(line_count(&timeline, "g2"), 0);
    assert_eq!(queue.len(), 1);

    queue.stop().await;
    assert_eq!(line_count(&timeline, "g2"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_update_keeps_group_order() {
    let timeline = shared(&["g1"]);
    let queue = queue(&timeline);
    queue.start();

    queue.enqueue("g1", TimelineItem::success(lines::TX_PREPARED, "prepared"));
    queue.enqueue("g1", TimelineItem::waiting(lines::TX_SIGNED, "sign please"));
    queue.enqueue("g1", TimelineItem::success(lines::TX_SIGNED, "signed"));

    let group = timeline.read().group("g1").unwrap().clone();
    assert_eq!(
        group.line_ids().collect::<Vec<_>>(),
        vec![lines::TX_PREPARED, lines::TX_SIGNED]
    );
    assert_eq!(group.line(lines::TX_SIGNED).unwrap().status, LineStatus::Success);
    assert!(queue.is_empty());

    queue.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_start_flushes_in_order() {
    let timeline = shared(&["g1"]);
    let queue = queue(&timeline);

    queue.enqueue("g1", TimelineItem::waiting(lines::TX_SENT, "sending"));
    queue.enqueue("g1", TimelineItem::success(lines::TX_SENT, "sent"));
    queue.stop().await;

    let group = timeline.read().group("g1").unwrap().clone();
    assert_eq!(group.lines.len(), 1);
    assert_eq!(group.lines[0].status, LineStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn test_updates_after_stop_apply_directly() {
    let timeline = shared(&["g1"]);
    let queue = queue(&timeline);
    queue.start();
    queue.stop().await;

    queue.enqueue("g1", TimelineItem::error(lines::TX_INCLUDED, "late"));
    assert_eq!(line_count(&timeline, "g1"), 1);
    assert!(queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_for_deleted_group_is_dropped() {
    let timeline = shared(&["g1"]);
    let queue = queue(&timeline);
    queue.start();

    queue.enqueue("g1", TimelineItem::waiting(lines::TX_SENT, "sending"));
    timeline.write().delete_group("g1");
    queue.stop().await;

    assert!(timeline.read().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let timeline = shared(&["g1"]);
    let queue = queue(&timeline);
    queue.start();
    queue.start();

    queue.enqueue("g1", TimelineItem::waiting("a", "a"));
    queue.enqueue("g1", TimelineItem::waiting("b", "b"));
    tokio::time::sleep(TICK + Duration::from_millis(10)).await;
    // A second pump would have delivered both
    assert_eq!(line_count(&timeline, "g1"), 1);

    queue.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_abort_discards_pending_and_later_updates() {
    let timeline = shared(&["g1"]);
    let queue = queue(&timeline);
    queue.start();

    queue.enqueue("g1", TimelineItem::waiting(lines::TX_PROVED, "proving"));
    queue.abort();
    assert!(queue.is_closed());
    assert!(!queue.is_running());
    assert!(queue.is_empty());

    // Neither the cadence nor the immediate path reaches the timeline now
    queue.enqueue("g1", TimelineItem::error(lines::TX_PROVED, "late failure"));
    queue.enqueue("g1", TimelineItem::success(lines::TX_SIGNED, "signed"));
    tokio::time::sleep(TICK * 3).await;
    assert_eq!(line_count(&timeline, "g1"), 0);

    queue.start();
    assert!(!queue.is_running());
    queue.stop().await;
    assert_eq!(line_count(&timeline, "g1"), 0);
}

/// Workers on other threads push an immediate line right after a queued one
/// while the pump is delivering; the queued line must still come first.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_group_order_holds_across_threads() {
    const GROUPS: usize = 48;
    const ROUNDS: usize = 8;

    for round in 0..ROUNDS {
        let ids: Vec<String> = (0..GROUPS).map(|g| format!("r{}-g{}", round, g)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let timeline = shared(&id_refs);
        let queue = UpdateQueue::with_settings(
            Arc::clone(&timeline),
            Duration::from_micros(200),
            lines::DEFAULT_IMMEDIATE,
        );
        queue.start();

        let workers: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(index, group_id)| {
                let queue = queue.clone();
                let group_id = group_id.clone();
                tokio::spawn(async move {
                    queue.enqueue(group_id.as_str(), TimelineItem::success(lines::TX_PREPARED, "prepared"));
                    for _ in 0..(index % 4) {
                        tokio::task::yield_now().await;
                    }
                    queue.enqueue(group_id.as_str(), TimelineItem::success(lines::TX_SIGNED, "signed"));
                })
            })
            .collect();
        for worker in workers {
            worker.await.unwrap();
        }
        queue.stop().await;

        let timeline = timeline.read();
        for group_id in &ids {
            let group = timeline.group(group_id).unwrap();
            assert_eq!(
                group.line_ids().collect::<Vec<_>>(),
                vec![lines::TX_PREPARED, lines::TX_SIGNED],
                "group {}",
                group_id
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Per-group order survives interleaving with other groups and with
    /// immediate lines
    #[test]
    fn prop_per_group_order_preserved(ops in prop::collection::vec((0usize..3, any::<bool>()), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let groups = ["g0", "g1", "g2"];
            let timeline = shared(&groups);
            let queue = queue(&timeline);
            queue.start();

            // Every update rewrites the same line of its group; the last
            // emitted one must win
            let mut expected = [None, None, None];
            for (seq, (group, immediate)) in ops.iter().enumerate() {
                let line = if *immediate { lines::TX_SIGNED } else { lines::TX_SENT };
                let content = format!("{}", seq);
                queue.enqueue(groups[*group], TimelineItem::waiting(line, content.clone()));
                expected[*group] = Some(content);
                if seq % 3 == 0 {
                    tokio::time::sleep(TICK / 2).await;
                }
            }
            queue.stop().await;

            let timeline = timeline.read();
            for (index, group_id) in groups.iter().enumerate() {
                let group = timeline.group(group_id).unwrap();
                let latest = group.lines.iter().max_by_key(|line| line.sequence).map(|l| l.content.clone());
                prop_assert_eq!(latest, expected[index].clone());
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
