//! Bounded polling primitive
//!
//! Every waiting loop in the pipeline (proof job, submission, inclusion,
//! contract-state verification) is the same shape: probe, decide whether the
//! target state was reached, sleep, repeat until a budget runs out. The
//! differences are captured by three parameters:
//!
//! - [`IntervalPolicy`]: how the delay between probes evolves
//! - the probe result ([`Probe`]): terminal value, still pending, or a
//!   reported failure
//! - [`PollBudget`]: wall-clock deadline or attempt ceiling
//!
//! Time is measured with `tokio::time`, so tests can run under a paused clock.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// How the delay between probes evolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalPolicy {
    /// Constant delay
    Fixed(Duration),
    /// `step × n` after the n-th unsuccessful probe
    Linear { step: Duration },
    /// Starts at `initial`; every reported failure adds `step`
    Adaptive { initial: Duration, step: Duration },
}

/// When a poll gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBudget {
    /// Measured from the start of the poll, independent of attempt count
    WallClock(Duration),
    /// Maximum number of probes
    Attempts(u32),
}

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// Terminal state reached
    Ready(T),
    /// Not there yet
    Pending,
    /// The probe itself reported a failure
    Failed(String),
}

/// Delay state machine for an [`IntervalPolicy`]
#[derive(Debug, Clone)]
pub struct Cadence {
    policy: IntervalPolicy,
    current: Duration,
    unsuccessful: u32,
}

impl Cadence {
    pub fn new(policy: IntervalPolicy) -> Self {
        let current = match policy {
            IntervalPolicy::Fixed(interval) => interval,
            IntervalPolicy::Linear { step } => step,
            IntervalPolicy::Adaptive { initial, .. } => initial,
        };
        Self {
            policy,
            current,
            unsuccessful: 0,
        }
    }

    /// Delay before the very first probe of a sleep-first poll
    pub fn initial(&self) -> Duration {
        self.current
    }

    /// Record an unsuccessful probe and return the delay before the next one
    pub fn advance(&mut self, failed: bool) -> Duration {
        self.unsuccessful = self.unsuccessful.saturating_add(1);
        match self.policy {
            IntervalPolicy::Fixed(interval) => interval,
            IntervalPolicy::Linear { step } => {
                self.current = step.saturating_mul(self.unsuccessful);
                self.current
            }
            IntervalPolicy::Adaptive { step, .. } => {
                if failed {
                    self.current = self.current.saturating_add(step);
                }
                self.current
            }
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

/// Returned when the budget runs out before a terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollExhausted {
    pub attempts: u32,
    pub elapsed: Duration,
    pub last_failure: Option<String>,
}

/// One reusable bounded poll loop
#[derive(Debug, Clone)]
pub struct BoundedPoll {
    name: &'static str,
    interval: IntervalPolicy,
    budget: PollBudget,
    sleep_first: bool,
}

impl BoundedPoll {
    pub fn new(name: &'static str, interval: IntervalPolicy, budget: PollBudget) -> Self {
        Self {
            name,
            interval,
            budget,
            sleep_first: false,
        }
    }

    /// Wait one interval before the first probe
    pub fn sleep_first(mut self, sleep_first: bool) -> Self {
        self.sleep_first = sleep_first;
        self
    }

    pub fn budget(&self) -> PollBudget {
        self.budget
    }

    /// Run the loop; `probe` receives the 1-based attempt number
    ///
    /// Sleeps are clamped to the remaining wall-clock budget, so a
    /// wall-clock poll returns no later than its deadline plus the duration of
    /// an in-flight probe.
    pub async fn run<T, F, Fut>(&self, mut probe: F) -> Result<T, PollExhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Probe<T>>,
    {
        let started = Instant::now();
        let mut cadence = Cadence::new(self.interval);
        let mut delay = if self.sleep_first {
            cadence.initial()
        } else {
            Duration::ZERO
        };
        let mut attempts = 0u32;
        let mut last_failure = None;

        loop {
            if !delay.is_zero() {
                let wait = match self.budget {
                    PollBudget::WallClock(limit) => delay.min(limit.saturating_sub(started.elapsed())),
                    PollBudget::Attempts(_) => delay,
                };
                sleep(wait).await;
            }

            if let PollBudget::WallClock(limit) = self.budget {
                if started.elapsed() >= limit {
                    warn!(
                        poll = self.name,
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Poll deadline reached"
                    );
                    return Err(PollExhausted {
                        attempts,
                        elapsed: started.elapsed(),
                        last_failure,
                    });
                }
            }

            attempts += 1;
            match probe(attempts).await {
                Probe::Ready(value) => {
                    debug!(
                        poll = self.name,
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Poll reached terminal state"
                    );
                    return Ok(value);
                }
                Probe::Pending => {
                    delay = cadence.advance(false);
                }
                Probe::Failed(reason) => {
                    delay = cadence.advance(true);
                    debug!(
                        poll = self.name,
                        attempt = attempts,
                        next_delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Probe reported a failure"
                    );
                    last_failure = Some(reason);
                }
            }

            if let PollBudget::Attempts(max) = self.budget {
                if attempts >= max {
                    warn!(poll = self.name, attempts, "Poll attempt ceiling reached");
                    return Err(PollExhausted {
                        attempts,
                        elapsed: started.elapsed(),
                        last_failure,
                    });
                }
            }
        }
    }
}
