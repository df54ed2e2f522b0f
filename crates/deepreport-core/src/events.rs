//! Decision events for observability of the refinement loop and report stage.
//!
//! Components never log through a global handle; they emit [`PipelineEvent`]s
//! into an injected [`EventSink`]. [`TracingSink`] turns them into `tracing`
//! records, [`EventCollector`] forwards them over a channel for trace
//! summaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::refinement::{AbandonReason, AcceptReason};

/// Unique identifier for an event
pub type EventId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Stage input was rejected before any subtopic ran
    StageRejected { reason: String },
    SubtopicStarted { topic: String, subtopic: String },
    SearchIssued {
        subtopic: String,
        attempt: usize,
        query: String,
        evidence_count: usize,
    },
    SearchFailed {
        subtopic: String,
        attempt: usize,
        reason: String,
    },
    EvidenceEmpty { subtopic: String, attempt: usize },
    SummaryFailed {
        subtopic: String,
        attempt: usize,
        reason: String,
    },
    JudgeFailed {
        subtopic: String,
        attempt: usize,
        reason: String,
    },
    Retrying {
        subtopic: String,
        attempt: usize,
        next_evidence_count: usize,
    },
    EvidenceCapReached {
        subtopic: String,
        attempt: usize,
        evidence_cap: usize,
    },
    SummaryAccepted {
        subtopic: String,
        attempts: usize,
        evidence_count: usize,
        reason: AcceptReason,
    },
    SubtopicAbandoned {
        subtopic: String,
        attempts: usize,
        reason: AbandonReason,
    },
    ReportSkipped { topic: String },
    ReportComposed { topic: String, sections: usize },
    ReportFailed { topic: String, reason: String },
}

impl PipelineEvent {
    /// Subtopic (or topic, for report events) the event concerns.
    pub fn subject(&self) -> &str {
        match self {
            PipelineEvent::StageRejected { .. } => "stage",
            PipelineEvent::SubtopicStarted { subtopic, .. }
            | PipelineEvent::SearchIssued { subtopic, .. }
            | PipelineEvent::SearchFailed { subtopic, .. }
            | PipelineEvent::EvidenceEmpty { subtopic, .. }
            | PipelineEvent::SummaryFailed { subtopic, .. }
            | PipelineEvent::JudgeFailed { subtopic, .. }
            | PipelineEvent::Retrying { subtopic, .. }
            | PipelineEvent::EvidenceCapReached { subtopic, .. }
            | PipelineEvent::SummaryAccepted { subtopic, .. }
            | PipelineEvent::SubtopicAbandoned { subtopic, .. } => subtopic,
            PipelineEvent::ReportSkipped { topic }
            | PipelineEvent::ReportComposed { topic, .. }
            | PipelineEvent::ReportFailed { topic, .. } => topic,
        }
    }

    /// Short human-readable description used in trace summaries.
    pub fn describe(&self) -> String {
        match self {
            PipelineEvent::StageRejected { reason } => format!("stage rejected: {reason}"),
            PipelineEvent::SubtopicStarted { topic, .. } => format!("started within \"{topic}\""),
            PipelineEvent::SearchIssued {
                attempt,
                evidence_count,
                ..
            } => format!("attempt {}: searching {evidence_count} items", attempt + 1),
            PipelineEvent::SearchFailed {
                attempt, reason, ..
            } => format!("attempt {}: search failed ({reason})", attempt + 1),
            PipelineEvent::EvidenceEmpty { attempt, .. } => {
                format!("attempt {}: no evidence found", attempt + 1)
            }
            PipelineEvent::SummaryFailed {
                attempt, reason, ..
            } => format!("attempt {}: summary failed ({reason})", attempt + 1),
            PipelineEvent::JudgeFailed {
                attempt, reason, ..
            } => format!("attempt {}: judge failed ({reason})", attempt + 1),
            PipelineEvent::Retrying {
                attempt,
                next_evidence_count,
                ..
            } => format!(
                "attempt {}: insufficient, retrying with {next_evidence_count} items",
                attempt + 1
            ),
            PipelineEvent::EvidenceCapReached {
                attempt,
                evidence_cap,
                ..
            } => format!(
                "attempt {}: evidence cap {evidence_cap} reached",
                attempt + 1
            ),
            PipelineEvent::SummaryAccepted {
                attempts,
                evidence_count,
                reason,
                ..
            } => format!(
                "accepted after {attempts} attempt(s) with {evidence_count} items ({})",
                reason.as_str()
            ),
            PipelineEvent::SubtopicAbandoned {
                attempts, reason, ..
            } => format!(
                "abandoned after {attempts} attempt(s) ({})",
                reason.as_str()
            ),
            PipelineEvent::ReportSkipped { .. } => "report skipped: no summaries".to_string(),
            PipelineEvent::ReportComposed { sections, .. } => {
                format!("report composed from {sections} section(s)")
            }
            PipelineEvent::ReportFailed { reason, .. } => format!("report failed: {reason}"),
        }
    }
}

/// Injected observability capability.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Sink that renders events as structured `tracing` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::StageRejected { reason } => {
                tracing::error!(%reason, "subtopic stage rejected its input");
            }
            PipelineEvent::SubtopicStarted { topic, subtopic } => {
                tracing::info!(%topic, %subtopic, "processing subtopic");
            }
            PipelineEvent::SearchIssued {
                subtopic,
                attempt,
                query,
                evidence_count,
            } => {
                tracing::info!(%subtopic, attempt, %query, evidence_count, "searching evidence");
            }
            PipelineEvent::SearchFailed {
                subtopic,
                attempt,
                reason,
            } => {
                tracing::error!(%subtopic, attempt, %reason, "evidence search failed");
            }
            PipelineEvent::EvidenceEmpty { subtopic, attempt } => {
                tracing::warn!(%subtopic, attempt, "no evidence found, skipping subtopic");
            }
            PipelineEvent::SummaryFailed {
                subtopic,
                attempt,
                reason,
            } => {
                tracing::error!(%subtopic, attempt, %reason, "summary generation failed");
            }
            PipelineEvent::JudgeFailed {
                subtopic,
                attempt,
                reason,
            } => {
                tracing::warn!(%subtopic, attempt, %reason, "judge failed, treating summary as insufficient");
            }
            PipelineEvent::Retrying {
                subtopic,
                attempt,
                next_evidence_count,
            } => {
                tracing::info!(%subtopic, attempt, next_evidence_count, "summary insufficient, retrying");
            }
            PipelineEvent::EvidenceCapReached {
                subtopic,
                attempt,
                evidence_cap,
            } => {
                tracing::warn!(%subtopic, attempt, evidence_cap, "evidence cap reached, accepting current summary");
            }
            PipelineEvent::SummaryAccepted {
                subtopic,
                attempts,
                evidence_count,
                reason,
            } => {
                tracing::info!(
                    %subtopic,
                    attempts,
                    evidence_count,
                    reason = reason.as_str(),
                    "summary accepted"
                );
            }
            PipelineEvent::SubtopicAbandoned {
                subtopic,
                attempts,
                reason,
            } => {
                tracing::warn!(%subtopic, attempts, reason = reason.as_str(), "subtopic abandoned");
            }
            PipelineEvent::ReportSkipped { topic } => {
                tracing::warn!(%topic, "no summaries available, report skipped");
            }
            PipelineEvent::ReportComposed { topic, sections } => {
                tracing::info!(%topic, sections, "report composed");
            }
            PipelineEvent::ReportFailed { topic, reason } => {
                tracing::error!(%topic, %reason, "report generation failed");
            }
        }
    }
}

/// Collected event with identity and wall-clock timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub event: PipelineEvent,
}

/// Channel-backed sink feeding a trace collector.
#[derive(Clone)]
pub struct EventCollector {
    sender: mpsc::UnboundedSender<EventRecord>,
}

impl EventCollector {
    /// Create a new event collector
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EventRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for EventCollector {
    fn emit(&self, event: PipelineEvent) {
        let record = EventRecord {
            event_id: generate_event_id(),
            timestamp: Utc::now(),
            event,
        };

        if let Err(e) = self.sender.send(record) {
            tracing::warn!(error = %e, "Failed to forward pipeline event");
        }
    }
}

/// Forwards every event to each inner sink in order.
#[derive(Clone, Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for MultiSink {
    fn emit(&self, event: PipelineEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}

fn generate_event_id() -> EventId {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("evt_{}", id)
}
