//! Per-action state: timeline, processing guard, statistics, error flag
//!
//! One [`TransactionActionState`] exists per collection × token × action
//! tab. It is created lazily on the first submission for its key and reset at
//! the start of every new submission.

use crate::params::ActionKind;
use crate::statistics::Statistics;
use crate::timeline::{SharedTimeline, Timeline};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionKey {
    pub collection: String,
    pub token: Option<String>,
    pub tab: ActionKind,
}

impl ActionKey {
    pub fn new(collection: impl Into<String>, token: Option<String>, tab: ActionKind) -> Self {
        Self {
            collection: collection.into(),
            token,
            tab,
        }
    }
}

impl std::fmt::Display for ActionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.token {
            Some(token) => write!(f, "{}/{}/{}", self.collection, token, self.tab),
            None => write!(f, "{}/{}", self.collection, self.tab),
        }
    }
}

/// Sticky error flag shared by the pipelines of one batch
///
/// Once raised it stays raised for the rest of the batch. Pipelines check
/// it between stages and never start a new stage after it flips.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct TransactionActionState {
    key: ActionKey,
    timeline: SharedTimeline,
    processing: AtomicBool,
    statistics: Mutex<Statistics>,
    flag: Mutex<CancellationFlag>,
}

impl TransactionActionState {
    pub fn new(key: ActionKey) -> Self {
        Self {
            key,
            timeline: Arc::new(RwLock::new(Timeline::new())),
            processing: AtomicBool::new(false),
            statistics: Mutex::new(Statistics::default()),
            flag: Mutex::new(CancellationFlag::new()),
        }
    }

    pub fn key(&self) -> &ActionKey {
        &self.key
    }

    pub fn timeline(&self) -> SharedTimeline {
        Arc::clone(&self.timeline)
    }

    /// Copy of the current timeline
    pub fn snapshot(&self) -> Timeline {
        self.timeline.read().clone()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Claim the key for a new batch; false when one is already in flight
    pub fn try_begin(&self) -> bool {
        self.processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn finish(&self) {
        self.processing.store(false, Ordering::SeqCst);
    }

    pub fn statistics(&self) -> Statistics {
        *self.statistics.lock()
    }

    /// Recount from the timeline, treating missing groups as waiting
    pub fn refresh_statistics(&self, expected: usize) -> Statistics {
        let stats = Statistics::collect(&self.timeline.read()).expecting(expected);
        *self.statistics.lock() = stats;
        stats
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.flag.lock().clone()
    }

    pub fn is_error_now(&self) -> bool {
        self.flag.lock().is_raised()
    }

    pub fn raise_error(&self) {
        self.flag.lock().raise();
    }

    /// Zero statistics, clear the timeline and install a fresh error flag
    pub fn reset(&self) -> CancellationFlag {
        self.timeline.write().clear();
        *self.statistics.lock() = Statistics::default();
        let flag = CancellationFlag::new();
        *self.flag.lock() = flag.clone();
        debug!(key = %self.key, "Action state reset");
        flag
    }
}

/// Lazily populated map of action states
#[derive(Debug, Default)]
pub struct ActionStateStore {
    states: DashMap<ActionKey, Arc<TransactionActionState>>,
}

impl ActionStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, key: &ActionKey) -> Arc<TransactionActionState> {
        self.states
            .entry(key.clone())
            .or_insert_with(|| Arc::new(TransactionActionState::new(key.clone())))
            .clone()
    }

    pub fn get(&self, key: &ActionKey) -> Option<Arc<TransactionActionState>> {
        self.states.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the state of a key that is not processing
    pub fn remove(&self, key: &ActionKey) -> Option<Arc<TransactionActionState>> {
        self.states
            .remove_if(key, |_, state| !state.is_processing())
            .map(|(_, state)| state)
    }

    pub fn keys(&self) -> Vec<ActionKey> {
        self.states.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
