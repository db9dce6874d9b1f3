//! Bounded poll primitive tests (paused clock)

use crate::poll::{BoundedPoll, Cadence, IntervalPolicy, PollBudget, Probe};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn test_cadence_policies() {
    let mut fixed = Cadence::new(IntervalPolicy::Fixed(secs(10)));
    assert_eq!(fixed.initial(), secs(10));
    assert_eq!(fixed.advance(true), secs(10));
    assert_eq!(fixed.advance(false), secs(10));

    let mut linear = Cadence::new(IntervalPolicy::Linear { step: secs(5) });
    assert_eq!(linear.advance(true), secs(5));
    assert_eq!(linear.advance(true), secs(10));
    assert_eq!(linear.advance(false), secs(15));

    let mut adaptive = Cadence::new(IntervalPolicy::Adaptive {
        initial: secs(10),
        step: secs(5),
    });
    assert_eq!(adaptive.advance(false), secs(10));
    assert_eq!(adaptive.advance(true), secs(15));
    assert_eq!(adaptive.advance(false), secs(15));
    assert_eq!(adaptive.advance(true), secs(20));
    assert_eq!(adaptive.current(), secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_ready_after_pending_probes() {
    let poll = BoundedPoll::new("test", IntervalPolicy::Fixed(secs(10)), PollBudget::WallClock(secs(600)))
        .sleep_first(true);
    let start = Instant::now();

    let result = poll
        .run(|attempt| async move {
            if attempt < 4 {
                Probe::Pending
            } else {
                Probe::Ready(attempt)
            }
        })
        .await;

    assert_eq!(result, Ok(4));
    assert_eq!(start.elapsed(), secs(40));
}

#[tokio::test(start_paused = true)]
async fn test_no_sleep_first_probes_immediately() {
    let poll = BoundedPoll::new("test", IntervalPolicy::Fixed(secs(10)), PollBudget::Attempts(3));
    let start = Instant::now();

    let result = poll.run(|_| async { Probe::Ready(()) }).await;

    assert!(result.is_ok());
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_ceiling() {
    let poll = BoundedPoll::new("test", IntervalPolicy::Fixed(secs(10)), PollBudget::Attempts(5))
        .sleep_first(true);
    let calls = Mutex::new(0u32);

    let result: Result<(), _> = poll
        .run(|_| {
            let calls = &calls;
            async move {
                *calls.lock() += 1;
                Probe::Failed("not yet".to_string())
            }
        })
        .await;

    let exhausted = result.unwrap_err();
    assert_eq!(exhausted.attempts, 5);
    assert_eq!(*calls.lock(), 5);
    assert_eq!(exhausted.last_failure.as_deref(), Some("not yet"));
}

#[tokio::test(start_paused = true)]
async fn test_wall_clock_budget_bounds_linear_backoff() {
    let budget = secs(60);
    let poll = BoundedPoll::new(
        "test",
        IntervalPolicy::Linear { step: secs(5) },
        PollBudget::WallClock(budget),
    );
    let start = Instant::now();
    let times = Mutex::new(Vec::new());

    let result: Result<(), _> = poll
        .run(|_| {
            let times = &times;
            async move {
                times.lock().push(Instant::now());
                Probe::Failed("rejected".to_string())
            }
        })
        .await;

    let exhausted = result.unwrap_err();
    assert!(start.elapsed() <= budget);
    assert!(start.elapsed() >= budget);

    // Probes at 0, 5, 15, 30, 50; the next one would be at 75
    let offsets: Vec<u64> = times
        .lock()
        .iter()
        .map(|at| at.duration_since(start).as_secs())
        .collect();
    assert_eq!(offsets, vec![0, 5, 15, 30, 50]);
    assert_eq!(exhausted.attempts, 5);
}

#[tokio::test(start_paused = true)]
async fn test_adaptive_slowdown_on_failures() {
    let poll = BoundedPoll::new(
        "test",
        IntervalPolicy::Adaptive {
            initial: secs(10),
            step: secs(5),
        },
        PollBudget::WallClock(secs(3600)),
    )
    .sleep_first(true);
    let start = Instant::now();
    let times = Mutex::new(Vec::new());

    let result = poll
        .run(|attempt| {
            let times = &times;
            async move {
                times.lock().push(Instant::now());
                if attempt <= 3 {
                    Probe::Failed(format!("error {}", attempt))
                } else {
                    Probe::Ready(())
                }
            }
        })
        .await;
    assert!(result.is_ok());

    let offsets: Vec<u64> = times
        .lock()
        .iter()
        .map(|at| at.duration_since(start).as_secs())
        .collect();
    // 10, then +15, +20, +25
    assert_eq!(offsets, vec![10, 25, 45, 70]);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_checked_before_first_probe() {
    let poll = BoundedPoll::new("test", IntervalPolicy::Fixed(secs(30)), PollBudget::WallClock(secs(10)))
        .sleep_first(true);
    let calls = Mutex::new(0u32);

    let result: Result<(), _> = poll
        .run(|_| {
            let calls = &calls;
            async move {
                *calls.lock() += 1;
                Probe::Pending
            }
        })
        .await;

    let exhausted = result.unwrap_err();
    assert_eq!(exhausted.attempts, 0);
    assert_eq!(*calls.lock(), 0);
    assert_eq!(exhausted.elapsed, secs(10));
}
