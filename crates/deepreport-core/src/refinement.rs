//! Iterative refinement of one subtopic summary.
//!
//! Each subtopic runs a bounded state machine
//! `Searching -> Summarizing -> Judging -> {Accepted, Retrying, Abandoned}`.
//! `Retrying` grows the evidence count by `evidence_step` and searches again;
//! the attempt budget and the evidence cap both force acceptance of the
//! current draft once exhausted.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{ConfigurationError, DeepReportError};
use crate::events::{EventSink, PipelineEvent, TracingSink};
use crate::evidence::{EvidenceItem, EvidenceSource};
use crate::generation::{Judge, Summarizer};

/// Text recorded in place of a summary the model failed to produce.
pub const FAILED_SUMMARY_TEXT: &str = "Не удалось сгенерировать summary из-за ошибки.";

pub const DEFAULT_MAX_ATTEMPTS: usize = 2;
pub const DEFAULT_INITIAL_EVIDENCE: usize = 3;
pub const DEFAULT_EVIDENCE_STEP: usize = 5;
pub const DEFAULT_EVIDENCE_CAP: usize = 15;

/// Accepted summary for one subtopic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub subtopic: String,
    pub summary: String,
}

/// How evidence from earlier attempts is treated on retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStrategy {
    /// Every attempt summarizes only the items fetched by that attempt.
    #[default]
    Refetch,
    /// Items fetched by earlier attempts stay in the pool, de-duplicated.
    Accumulate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementPolicy {
    pub max_attempts: usize,
    pub initial_evidence: usize,
    pub evidence_step: usize,
    pub evidence_cap: usize,
    pub strategy: EvidenceStrategy,
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_evidence: DEFAULT_INITIAL_EVIDENCE,
            evidence_step: DEFAULT_EVIDENCE_STEP,
            evidence_cap: DEFAULT_EVIDENCE_CAP,
            strategy: EvidenceStrategy::Refetch,
        }
    }
}

impl RefinementPolicy {
    pub fn validate(&self) -> Result<(), DeepReportError> {
        let problem = if self.max_attempts == 0 {
            Some("refinement.max_attempts must be at least 1")
        } else if self.initial_evidence == 0 {
            Some("refinement.initial_evidence must be at least 1")
        } else if self.evidence_step == 0 {
            Some("refinement.evidence_step must be at least 1")
        } else if self.initial_evidence > self.evidence_cap {
            Some("refinement.initial_evidence must not exceed refinement.evidence_cap")
        } else {
            None
        };

        match problem {
            Some(message) => Err(DeepReportError::InvalidConfiguration(message.into())),
            None => Ok(()),
        }
    }

    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            attempt: 0,
            max_attempts: self.max_attempts,
            evidence_count: self.initial_evidence.min(self.evidence_cap),
            evidence_cap: self.evidence_cap,
            evidence_step: self.evidence_step,
        }
    }
}

/// Per-subtopic retry state; created fresh for every subtopic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub attempt: usize,
    pub max_attempts: usize,
    pub evidence_count: usize,
    pub evidence_cap: usize,
    pub evidence_step: usize,
}

/// Result of trying to escalate after an insufficient draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Another attempt will run with the (possibly larger) evidence count.
    Continue,
    /// The escalated count would exceed the cap; the count is clamped.
    CapReached,
}

impl RetryBudget {
    pub fn is_last_attempt(&self) -> bool {
        self.attempt + 1 >= self.max_attempts
    }

    /// Grow the evidence count and move to the next attempt.
    pub fn escalate(&mut self) -> Escalation {
        let next = self.evidence_count.saturating_add(self.evidence_step);
        if next > self.evidence_cap {
            self.evidence_count = self.evidence_cap;
            return Escalation::CapReached;
        }
        self.evidence_count = next;
        self.attempt += 1;
        Escalation::Continue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptReason {
    /// The judge found the summary sufficient.
    Sufficient,
    /// The final allowed attempt was accepted regardless of the verdict.
    AttemptsExhausted,
    /// Escalating would exceed the evidence cap.
    EvidenceCapReached,
}

impl AcceptReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptReason::Sufficient => "sufficient",
            AcceptReason::AttemptsExhausted => "attempts_exhausted",
            AcceptReason::EvidenceCapReached => "evidence_cap_reached",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// The entry was blank; nothing was searched.
    BlankSubtopic,
    SearchFailed,
    NoEvidence,
}

impl AbandonReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbandonReason::BlankSubtopic => "blank_subtopic",
            AbandonReason::SearchFailed => "search_failed",
            AbandonReason::NoEvidence => "no_evidence",
        }
    }
}

/// Terminal outcome of processing one subtopic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtopicOutcome {
    Accepted {
        record: SummaryRecord,
        attempts: usize,
        evidence_count: usize,
        reason: AcceptReason,
    },
    Abandoned {
        attempts: usize,
        reason: AbandonReason,
    },
}

impl SubtopicOutcome {
    pub fn record(&self) -> Option<&SummaryRecord> {
        match self {
            SubtopicOutcome::Accepted { record, .. } => Some(record),
            SubtopicOutcome::Abandoned { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<SummaryRecord> {
        match self {
            SubtopicOutcome::Accepted { record, .. } => Some(record),
            SubtopicOutcome::Abandoned { .. } => None,
        }
    }
}

/// One attempt's summary and whether the model actually produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Draft {
    Generated(String),
    Failed,
}

impl Draft {
    fn into_text(self) -> String {
        match self {
            Draft::Generated(text) => text,
            Draft::Failed => FAILED_SUMMARY_TEXT.to_string(),
        }
    }
}

/// Orchestrates search, summarization and judging for each subtopic.
#[derive(Clone)]
pub struct RefinementLoop {
    source: Arc<dyn EvidenceSource>,
    summarizer: Arc<dyn Summarizer>,
    judge: Arc<dyn Judge>,
    policy: RefinementPolicy,
    sink: Arc<dyn EventSink>,
}

impl RefinementLoop {
    pub fn new(
        source: Arc<dyn EvidenceSource>,
        summarizer: Arc<dyn Summarizer>,
        judge: Arc<dyn Judge>,
    ) -> Self {
        Self {
            source,
            summarizer,
            judge,
            policy: RefinementPolicy::default(),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_policy(mut self, policy: RefinementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn policy(&self) -> &RefinementPolicy {
        &self.policy
    }

    pub(crate) fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Run the loop over every subtopic in order, collecting accepted records.
    ///
    /// Input is validated before any collaborator is called. A blank or
    /// whitespace-only topic counts as missing; blank subtopic entries are
    /// abandoned individually.
    #[instrument(name = "stage.subtopics", skip(self, subtopics), fields(subtopics = subtopics.len()))]
    pub async fn run_stage(
        &self,
        topic: &str,
        subtopics: &[String],
    ) -> Result<Vec<SummaryRecord>, ConfigurationError> {
        validate_stage_input(topic, subtopics)?;

        let mut records = Vec::with_capacity(subtopics.len());
        for subtopic in subtopics {
            if let Some(record) = self.process(topic, subtopic).await.into_record() {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Produce at most one accepted summary for `subtopic`.
    pub async fn process(&self, topic: &str, subtopic: &str) -> SubtopicOutcome {
        self.emit(PipelineEvent::SubtopicStarted {
            topic: topic.to_string(),
            subtopic: subtopic.to_string(),
        });

        if subtopic.trim().is_empty() {
            return self.abandon(subtopic, 0, AbandonReason::BlankSubtopic);
        }

        let query = format!("{topic} {subtopic}");
        let mut budget = self.policy.budget();
        let mut pool: Vec<EvidenceItem> = Vec::new();

        loop {
            let attempt = budget.attempt;
            self.emit(PipelineEvent::SearchIssued {
                subtopic: subtopic.to_string(),
                attempt,
                query: query.clone(),
                evidence_count: budget.evidence_count,
            });

            let fetched = match self.source.search(&query, budget.evidence_count).await {
                Ok(items) => items,
                Err(err) => {
                    self.emit(PipelineEvent::SearchFailed {
                        subtopic: subtopic.to_string(),
                        attempt,
                        reason: err.to_string(),
                    });
                    return self.abandon(subtopic, attempt + 1, AbandonReason::SearchFailed);
                }
            };

            if fetched.is_empty() {
                self.emit(PipelineEvent::EvidenceEmpty {
                    subtopic: subtopic.to_string(),
                    attempt,
                });
                return self.abandon(subtopic, attempt + 1, AbandonReason::NoEvidence);
            }

            match self.policy.strategy {
                EvidenceStrategy::Refetch => pool = fetched,
                EvidenceStrategy::Accumulate => merge_evidence(&mut pool, fetched),
            }

            let draft = match self.summarizer.summarize(topic, subtopic, &pool).await {
                Ok(summary) => Draft::Generated(summary),
                Err(err) => {
                    self.emit(PipelineEvent::SummaryFailed {
                        subtopic: subtopic.to_string(),
                        attempt,
                        reason: err.to_string(),
                    });
                    Draft::Failed
                }
            };

            let need_more = match &draft {
                Draft::Failed => true,
                Draft::Generated(summary) => {
                    match self.judge.need_more_info(subtopic, summary).await {
                        Ok(verdict) => verdict,
                        Err(err) => {
                            self.emit(PipelineEvent::JudgeFailed {
                                subtopic: subtopic.to_string(),
                                attempt,
                                reason: err.to_string(),
                            });
                            true
                        }
                    }
                }
            };

            let used = budget.evidence_count;
            if !need_more {
                return self.accept(subtopic, draft, attempt + 1, used, AcceptReason::Sufficient);
            }
            if budget.is_last_attempt() {
                return self.accept(
                    subtopic,
                    draft,
                    attempt + 1,
                    used,
                    AcceptReason::AttemptsExhausted,
                );
            }

            match budget.escalate() {
                Escalation::CapReached => {
                    self.emit(PipelineEvent::EvidenceCapReached {
                        subtopic: subtopic.to_string(),
                        attempt,
                        evidence_cap: budget.evidence_cap,
                    });
                    return self.accept(
                        subtopic,
                        draft,
                        attempt + 1,
                        used,
                        AcceptReason::EvidenceCapReached,
                    );
                }
                Escalation::Continue => {
                    self.emit(PipelineEvent::Retrying {
                        subtopic: subtopic.to_string(),
                        attempt,
                        next_evidence_count: budget.evidence_count,
                    });
                }
            }
        }
    }

    fn accept(
        &self,
        subtopic: &str,
        draft: Draft,
        attempts: usize,
        evidence_count: usize,
        reason: AcceptReason,
    ) -> SubtopicOutcome {
        self.emit(PipelineEvent::SummaryAccepted {
            subtopic: subtopic.to_string(),
            attempts,
            evidence_count,
            reason,
        });
        SubtopicOutcome::Accepted {
            record: SummaryRecord {
                subtopic: subtopic.to_string(),
                summary: draft.into_text(),
            },
            attempts,
            evidence_count,
            reason,
        }
    }

    fn abandon(&self, subtopic: &str, attempts: usize, reason: AbandonReason) -> SubtopicOutcome {
        self.emit(PipelineEvent::SubtopicAbandoned {
            subtopic: subtopic.to_string(),
            attempts,
            reason,
        });
        SubtopicOutcome::Abandoned { attempts, reason }
    }

    fn emit(&self, event: PipelineEvent) {
        self.sink.emit(event);
    }
}

pub(crate) fn validate_stage_input(
    topic: &str,
    subtopics: &[String],
) -> Result<(), ConfigurationError> {
    if topic.trim().is_empty() {
        return Err(ConfigurationError::MissingTopic);
    }
    if subtopics.is_empty() {
        return Err(ConfigurationError::NoSubtopics);
    }
    Ok(())
}

fn merge_evidence(pool: &mut Vec<EvidenceItem>, fetched: Vec<EvidenceItem>) {
    let mut seen: HashSet<String> = pool.iter().map(|item| item.dedup_key().to_string()).collect();
    for item in fetched {
        if seen.insert(item.dedup_key().to_string()) {
            pool.push(item);
        }
    }
}
