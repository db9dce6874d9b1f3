//! Timeline of transaction progress
//!
//! - **model**: groups, line items and the pure state transitions over them
//! - **lines**: well-known line identifiers

pub mod lines;
pub mod model;

pub use lines::EntryLines;
pub use model::{
    GroupPatch, LineStatus, PendingUpdate, Timeline, TimelineAction, TimelineGroup, TimelineItem,
};

use parking_lot::RwLock;
use std::sync::Arc;

/// Timeline shared between the queue pump, pipelines and readers
pub type SharedTimeline = Arc<RwLock<Timeline>>;
