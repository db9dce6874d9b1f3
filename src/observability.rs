//! Batch correlation and pipeline trace ids
//!
//! A batch carries one [`CorrelationId`] through its events, its report and
//! every log line written on its behalf. Each pipeline of the batch gets a
//! [`PipelineTrace`] of its own, parented on the batch span.

use crate::state::ActionKey;
use crate::structured_logging::PipelineLogger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID shared by everything one batch does
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

/// Root trace of one submitted batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchTrace {
    correlation_id: CorrelationId,
    span_id: String,
    key: String,
    started_at: DateTime<Utc>,
}

impl BatchTrace {
    pub fn new(key: &ActionKey) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            span_id: span_id(),
            key: key.to_string(),
            started_at: Utc::now(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Trace for the pipeline driving `group_id`
    pub fn pipeline(&self, group_id: &str) -> PipelineTrace {
        PipelineTrace {
            correlation_id: self.correlation_id.clone(),
            batch_span_id: Some(self.span_id.clone()),
            span_id: span_id(),
            group_id: group_id.to_string(),
        }
    }

    /// Logger for batch-level lines
    pub fn logger(&self) -> PipelineLogger {
        PipelineLogger::new(self.correlation_id.clone(), self.span_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineTrace {
    pub correlation_id: CorrelationId,
    /// `None` for a stage run outside any batch
    pub batch_span_id: Option<String>,
    pub span_id: String,
    pub group_id: String,
}

impl PipelineTrace {
    /// Trace for a stage driven on its own, outside an orchestrated batch
    pub fn detached(group_id: &str) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            batch_span_id: None,
            span_id: span_id(),
            group_id: group_id.to_string(),
        }
    }

    pub fn logger(&self) -> PipelineLogger {
        PipelineLogger::new(self.correlation_id.clone(), self.span_id.clone())
    }
}
