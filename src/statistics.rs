//! Batch statistics
//!
//! Pure read over a timeline: counts sub-transaction groups by outcome.
//! Pinned groups carry batch-level status and are not counted.

use crate::timeline::{LineStatus, Timeline, TimelineGroup};
use serde::{Deserialize, Serialize};

/// Outcome of one sub-transaction group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupOutcome {
    Success,
    Error,
    Waiting,
}

impl GroupOutcome {
    /// Errors win over success; a group is successful when explicitly marked
    /// so or when all of its required lines succeeded
    pub fn of(group: &TimelineGroup) -> Self {
        if group.status == LineStatus::Error || group.has_error_line() {
            GroupOutcome::Error
        } else if group.status == LineStatus::Success || group.required_satisfied() {
            GroupOutcome::Success
        } else {
            GroupOutcome::Waiting
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub success: usize,
    pub error: usize,
    pub waiting: usize,
}

impl Statistics {
    pub fn collect(timeline: &Timeline) -> Self {
        Self::from_groups(timeline.groups())
    }

    pub fn from_groups<'a, I>(groups: I) -> Self
    where
        I: IntoIterator<Item = &'a TimelineGroup>,
    {
        groups
            .into_iter()
            .filter(|group| !group.keep_on_top)
            .fold(Self::default(), |mut stats, group| {
                match GroupOutcome::of(group) {
                    GroupOutcome::Success => stats.success += 1,
                    GroupOutcome::Error => stats.error += 1,
                    GroupOutcome::Waiting => stats.waiting += 1,
                }
                stats
            })
    }

    /// Count sub-transactions without a group yet as waiting
    pub fn expecting(mut self, expected: usize) -> Self {
        self.waiting = expected.saturating_sub(self.success + self.error);
        self
    }

    pub fn total(&self) -> usize {
        self.success + self.error + self.waiting
    }

    /// Every one of `expected` sub-transactions succeeded
    pub fn all_done(&self, expected: usize) -> bool {
        self.success == expected
    }

    /// Nothing left waiting
    pub fn is_settled(&self) -> bool {
        self.waiting == 0
    }

    pub fn has_errors(&self) -> bool {
        self.error > 0
    }
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} waiting",
            self.success, self.error, self.waiting
        )
    }
}
