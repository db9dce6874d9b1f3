//! Update coalescing queue
//!
//! Timeline updates are buffered in a FIFO and forwarded to the timeline by a
//! background pump, one update per tick, so that fast polling loops do not
//! flood the display. Nothing is dropped or reordered.
//!
//! Updates whose line id is in the immediate set (wallet interaction lines)
//! bypass the cadence. Before an immediate update is applied, older pending
//! updates for the same group are flushed so per-group order still holds.
//!
//! The queue is an instance owned by one batch: `start()` spawns its pump,
//! `stop()` waits until the buffer is drained and the pump has exited.
//! `abort()` tears it down without draining when the batch is abandoned.
//!
//! Lock order is timeline before buffer. The pump pops and applies under
//! the timeline write lock, so an immediate update cannot slip in between.

use crate::config::TimelineConfig;
use crate::metrics::metrics;
use crate::timeline::{PendingUpdate, SharedTimeline, TimelineItem};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpState {
    /// Not started yet; updates are buffered
    Idle,
    Running,
    /// Drain requested; the pump exits once the buffer is empty
    Draining,
    /// Pump gone; late updates are applied directly
    Stopped,
    /// Batch abandoned; the pump is aborted and updates are discarded
    Closed,
}

struct QueueInner {
    timeline: SharedTimeline,
    pending: Mutex<VecDeque<PendingUpdate>>,
    immediate: HashSet<String>,
    tick: Duration,
    state: Mutex<PumpState>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl QueueInner {
    fn deliver(&self, update: PendingUpdate) {
        let PendingUpdate { group_id, update } = update;
        self.timeline.write().update_item(&group_id, update);
    }

    /// Pop the oldest update and apply it, both under the timeline lock
    fn deliver_next(&self) -> bool {
        let mut timeline = self.timeline.write();
        let Some(PendingUpdate { group_id, update }) = self.pending.lock().pop_front() else {
            return false;
        };
        metrics().queue_depth.dec();
        timeline.update_item(&group_id, update);
        true
    }

    fn state(&self) -> PumpState {
        *self.state.lock()
    }
}

/// Cloneable handle to one batch's update queue
#[derive(Clone)]
pub struct UpdateQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("pending", &self.len())
            .field("tick", &self.inner.tick)
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}

impl UpdateQueue {
    pub fn new(timeline: SharedTimeline, config: &TimelineConfig) -> Self {
        Self::with_settings(timeline, config.tick(), config.immediate_lines.iter().cloned())
    }

    pub fn with_settings<I, S>(timeline: SharedTimeline, tick: Duration, immediate: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(QueueInner {
                timeline,
                pending: Mutex::new(VecDeque::new()),
                immediate: immediate.into_iter().map(Into::into).collect(),
                tick,
                state: Mutex::new(PumpState::Idle),
                pump: Mutex::new(None),
            }),
        }
    }

    pub fn timeline(&self) -> &SharedTimeline {
        &self.inner.timeline
    }

    pub fn len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        matches!(self.inner.state(), PumpState::Running | PumpState::Draining)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state() == PumpState::Closed
    }

    pub fn is_immediate(&self, line_id: &str) -> bool {
        self.inner.immediate.contains(line_id)
    }

    /// Spawn the pump; calling it on a running or closed queue is a no-op
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if matches!(*state, PumpState::Running | PumpState::Draining | PumpState::Closed) {
            return;
        }
        *state = PumpState::Running;
        drop(state);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { pump(inner).await });
        *self.inner.pump.lock() = Some(handle);
        debug!(tick_ms = self.inner.tick.as_millis() as u64, "Timeline update pump started");
    }

    pub fn enqueue(&self, group_id: impl Into<String>, item: TimelineItem) {
        self.push(PendingUpdate::new(group_id, item));
    }

    pub fn push(&self, update: PendingUpdate) {
        match self.inner.state() {
            PumpState::Closed => {
                debug!(
                    group_id = %update.group_id,
                    line_id = %update.update.line_id,
                    "Update for abandoned batch discarded"
                );
                return;
            }
            _ if self.is_immediate(&update.update.line_id) => {
                self.deliver_immediate(update);
                return;
            }
            PumpState::Stopped => {
                self.inner.deliver(update);
                return;
            }
            _ => {}
        }

        self.inner.pending.lock().push_back(update);
        metrics().queue_depth.inc();
        metrics().timeline_updates_queued.inc();
    }

    /// Flush the group's older pending updates, then apply `update`
    fn deliver_immediate(&self, update: PendingUpdate) {
        let mut timeline = self.inner.timeline.write();
        let earlier: Vec<PendingUpdate> = {
            let mut pending = self.inner.pending.lock();
            let (same_group, rest): (VecDeque<_>, VecDeque<_>) = pending
                .drain(..)
                .partition(|queued| queued.group_id == update.group_id);
            *pending = rest;
            same_group.into_iter().collect()
        };
        metrics().queue_depth.sub(earlier.len() as i64);

        for queued in earlier {
            timeline.update_item(&queued.group_id, queued.update);
        }
        timeline.update_item(&update.group_id, update.update);
        metrics().timeline_updates_immediate.inc();
    }

    /// Drain the buffer at the normal cadence, then halt the pump
    ///
    /// Updates still queued when the batch is torn down would be lost, so
    /// callers await this before treating the batch as finished.
    pub async fn stop(&self) {
        let handle = {
            let mut state = self.inner.state.lock();
            match *state {
                PumpState::Stopped | PumpState::Closed => return,
                PumpState::Idle => {
                    *state = PumpState::Stopped;
                    None
                }
                PumpState::Running | PumpState::Draining => {
                    *state = PumpState::Draining;
                    self.inner.pump.lock().take()
                }
            }
        };

        // A queue that never started has no pump and is flushed right away
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "Timeline update pump ended abnormally");
            }
        }

        // Anything that raced the final tick
        while self.inner.deliver_next() {}
        *self.inner.state.lock() = PumpState::Stopped;
        debug!("Timeline update pump stopped");
    }

    /// Abort the pump and discard everything still buffered
    ///
    /// Later pushes are dropped, so tasks of an abandoned batch can no
    /// longer touch the timeline.
    pub fn abort(&self) {
        *self.inner.state.lock() = PumpState::Closed;
        if let Some(handle) = self.inner.pump.lock().take() {
            handle.abort();
        }
        let discarded = {
            let mut pending = self.inner.pending.lock();
            let discarded = pending.len();
            pending.clear();
            discarded
        };
        metrics().queue_depth.sub(discarded as i64);
        if discarded > 0 {
            warn!(discarded, "Timeline update queue aborted with updates pending");
        } else {
            debug!("Timeline update queue aborted");
        }
    }
}

async fn pump(inner: Arc<QueueInner>) {
    let mut ticker = tokio::time::interval(inner.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if !inner.deliver_next() && inner.state() == PumpState::Draining {
            break;
        }
    }
}
