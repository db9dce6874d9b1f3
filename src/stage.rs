//! Pipeline stages and the context shared by the polling stages

use crate::api::{ChainRpc, MarketplaceApi};
use crate::config::PollingConfig;
use crate::queue::UpdateQueue;
use crate::structured_logging::PipelineLogger;
use crate::timeline::{GroupPatch, LineStatus, TimelineItem};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle of one sub-transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Verifying,
    Building,
    AwaitingSignature,
    Proving,
    Submitting,
    Confirming,
    Settled,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Verifying => "verifying",
            PipelineStage::Building => "building",
            PipelineStage::AwaitingSignature => "awaiting-signature",
            PipelineStage::Proving => "proving",
            PipelineStage::Submitting => "submitting",
            PipelineStage::Confirming => "confirming",
            PipelineStage::Settled => "settled",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators and reporting sink for one sub-transaction group
#[derive(Clone)]
pub struct StageContext {
    pub api: Arc<dyn MarketplaceApi>,
    pub chain: Arc<dyn ChainRpc>,
    pub updates: UpdateQueue,
    pub polling: PollingConfig,
    pub group_id: String,
    pub logger: PipelineLogger,
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("group_id", &self.group_id)
            .field("correlation_id", self.logger.correlation_id())
            .field("span_id", &self.logger.span_id())
            .finish()
    }
}

impl StageContext {
    /// Queue a line update for this group
    pub fn report(&self, line_id: impl Into<String>, content: impl Into<String>, status: LineStatus) {
        self.updates
            .enqueue(self.group_id.clone(), TimelineItem::new(line_id, content, status));
    }

    pub fn waiting(&self, line_id: impl Into<String>, content: impl Into<String>) {
        self.report(line_id, content, LineStatus::Waiting);
    }

    pub fn success(&self, line_id: impl Into<String>, content: impl Into<String>) {
        self.report(line_id, content, LineStatus::Success);
    }

    pub fn error(&self, line_id: impl Into<String>, content: impl Into<String>) {
        self.report(line_id, content, LineStatus::Error);
    }

    /// Group patches are applied right away; only line updates are paced
    pub fn patch_group(&self, patch: GroupPatch) -> bool {
        self.updates.timeline().write().update_group(&self.group_id, patch)
    }

    pub fn enter(&self, stage: PipelineStage) {
        self.logger.log_stage(&self.group_id, stage);
    }
}
