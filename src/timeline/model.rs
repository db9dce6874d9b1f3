//! Timeline data model
//!
//! Pure data structure: ordered groups of line items with statuses. Every
//! operation is a plain state transition without I/O, so the model can be
//! driven from the update queue, from tests, or replayed from a log of
//! [`TimelineAction`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Emission order of timeline items, used to reject stale updates
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Status of a line or a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStatus {
    Waiting,
    Success,
    Error,
}

impl LineStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            LineStatus::Waiting => "⏳",
            LineStatus::Success => "✅",
            LineStatus::Error => "❌",
        }
    }
}

impl std::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineStatus::Waiting => write!(f, "waiting"),
            LineStatus::Success => write!(f, "success"),
            LineStatus::Error => write!(f, "error"),
        }
    }
}

/// One step within a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    pub line_id: String,
    /// Opaque display payload
    pub content: String,
    pub status: LineStatus,
    pub updated_at: DateTime<Utc>,
    /// Monotonic emission sequence
    pub sequence: u64,
}

impl TimelineItem {
    pub fn new(line_id: impl Into<String>, content: impl Into<String>, status: LineStatus) -> Self {
        Self {
            line_id: line_id.into(),
            content: content.into(),
            status,
            updated_at: Utc::now(),
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn waiting(line_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(line_id, content, LineStatus::Waiting)
    }

    pub fn success(line_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(line_id, content, LineStatus::Success)
    }

    pub fn error(line_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(line_id, content, LineStatus::Error)
    }
}

/// One logical operation (one sub-transaction, or a pinned batch summary)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineGroup {
    pub group_id: String,
    pub status: LineStatus,
    pub title: String,
    pub success_title: String,
    pub error_title: String,
    /// Insertion order is causal order
    pub lines: Vec<TimelineItem>,
    pub required_for_success: BTreeSet<String>,
    /// Presentation hint; pinned groups carry batch-level status
    pub keep_on_top: bool,
}

impl TimelineGroup {
    pub fn new(group_id: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            group_id: group_id.into(),
            status: LineStatus::Waiting,
            success_title: title.clone(),
            error_title: title.clone(),
            title,
            lines: Vec::new(),
            required_for_success: BTreeSet::new(),
            keep_on_top: false,
        }
    }

    pub fn with_titles(mut self, success_title: impl Into<String>, error_title: impl Into<String>) -> Self {
        self.success_title = success_title.into();
        self.error_title = error_title.into();
        self
    }

    pub fn with_required<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_for_success.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn pinned(mut self) -> Self {
        self.keep_on_top = true;
        self
    }

    pub fn line(&self, line_id: &str) -> Option<&TimelineItem> {
        self.lines.iter().find(|item| item.line_id == line_id)
    }

    pub fn line_ids(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|item| item.line_id.as_str())
    }

    /// True when every required line is present with `success`
    ///
    /// An empty requirement set is never satisfied.
    pub fn required_satisfied(&self) -> bool {
        !self.required_for_success.is_empty()
            && self.required_for_success.iter().all(|id| {
                self.line(id)
                    .map(|item| item.status == LineStatus::Success)
                    .unwrap_or(false)
            })
    }

    pub fn has_error_line(&self) -> bool {
        self.lines.iter().any(|item| item.status == LineStatus::Error)
    }

    /// Upsert by `line_id`, keeping the position of an existing line
    ///
    /// An update emitted before the one currently stored is stale and ignored.
    /// Returns whether the group changed.
    fn upsert(&mut self, item: TimelineItem) -> bool {
        match self.lines.iter_mut().find(|line| line.line_id == item.line_id) {
            Some(existing) => {
                if item.sequence < existing.sequence {
                    debug!(
                        group_id = %self.group_id,
                        line_id = %item.line_id,
                        stale_status = %item.status,
                        current_status = %existing.status,
                        "Ignoring stale timeline update"
                    );
                    return false;
                }
                *existing = item;
                true
            }
            None => {
                self.lines.push(item);
                true
            }
        }
    }
}

/// Partial group update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPatch {
    pub status: Option<LineStatus>,
    pub title: Option<String>,
    pub success_title: Option<String>,
    pub error_title: Option<String>,
    pub required_for_success: Option<BTreeSet<String>>,
    pub keep_on_top: Option<bool>,
}

impl GroupPatch {
    pub fn status(status: LineStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn required<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_for_success: Some(lines.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    fn apply_to(self, group: &mut TimelineGroup) {
        if let Some(status) = self.status {
            group.status = status;
        }
        if let Some(title) = self.title {
            group.title = title;
        }
        if let Some(title) = self.success_title {
            group.success_title = title;
        }
        if let Some(title) = self.error_title {
            group.error_title = title;
        }
        if let Some(required) = self.required_for_success {
            group.required_for_success = required;
        }
        if let Some(keep_on_top) = self.keep_on_top {
            group.keep_on_top = keep_on_top;
        }
    }
}

/// A line update addressed to a group, queued for coalesced delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub group_id: String,
    pub update: TimelineItem,
}

impl PendingUpdate {
    pub fn new(group_id: impl Into<String>, update: TimelineItem) -> Self {
        Self {
            group_id: group_id.into(),
            update,
        }
    }
}

/// A single timeline state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineAction {
    AddGroup(TimelineGroup),
    UpdateGroup { group_id: String, patch: GroupPatch },
    UpdateItem(PendingUpdate),
    DeleteGroup(String),
}

/// Ordered list of groups for one action key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    groups: Vec<TimelineGroup>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[TimelineGroup] {
        &self.groups
    }

    pub fn group(&self, group_id: &str) -> Option<&TimelineGroup> {
        self.groups.iter().find(|group| group.group_id == group_id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Insert a group; a group with the same id is replaced in place
    pub fn add_group(&mut self, group: TimelineGroup) {
        match self.groups.iter_mut().find(|g| g.group_id == group.group_id) {
            Some(existing) => *existing = group,
            None => self.groups.push(group),
        }
    }

    /// Returns false when the group does not exist
    pub fn update_group(&mut self, group_id: &str, patch: GroupPatch) -> bool {
        match self.group_mut(group_id) {
            Some(group) => {
                patch.apply_to(group);
                true
            }
            None => {
                debug!(group_id, "update_group on unknown group ignored");
                false
            }
        }
    }

    /// Upsert a line; unknown groups are ignored
    ///
    /// A delayed update racing a torn-down batch lands here, so this must
    /// never fail.
    pub fn update_item(&mut self, group_id: &str, item: TimelineItem) -> bool {
        match self.group_mut(group_id) {
            Some(group) => group.upsert(item),
            None => {
                debug!(group_id, line_id = %item.line_id, "update_item on unknown group ignored");
                false
            }
        }
    }

    pub fn delete_group(&mut self, group_id: &str) -> Option<TimelineGroup> {
        let index = self.groups.iter().position(|g| g.group_id == group_id)?;
        Some(self.groups.remove(index))
    }

    /// Apply one action in place; returns whether anything changed
    pub fn apply(&mut self, action: TimelineAction) -> bool {
        match action {
            TimelineAction::AddGroup(group) => {
                self.add_group(group);
                true
            }
            TimelineAction::UpdateGroup { group_id, patch } => self.update_group(&group_id, patch),
            TimelineAction::UpdateItem(pending) => self.update_item(&pending.group_id, pending.update),
            TimelineAction::DeleteGroup(group_id) => self.delete_group(&group_id).is_some(),
        }
    }

    /// Reducer form: `(state, action) -> new state`
    #[must_use]
    pub fn reduce(mut self, action: TimelineAction) -> Self {
        self.apply(action);
        self
    }

    fn group_mut(&mut self, group_id: &str) -> Option<&mut TimelineGroup> {
        self.groups.iter_mut().find(|group| group.group_id == group_id)
    }
}
