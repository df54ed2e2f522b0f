//! Two-stage research pipeline: subtopic refinement then report composition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::DeepReportError;
use crate::events::{EventSink, PipelineEvent};
use crate::generation::{LanguageModel, LlmJudge, LlmSummarizer};
use crate::providers::{DuckDuckGoSearch, OllamaClient};
use crate::refinement::{RefinementLoop, SummaryRecord};
use crate::report::ReportComposer;

/// Accumulator moved through the stages of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: String,
    pub topic: String,
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub summaries: Vec<SummaryRecord>,
    #[serde(default)]
    pub report: Option<String>,
}

impl PipelineState {
    pub fn new(topic: impl Into<String>, subtopics: Vec<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            subtopics,
            summaries: Vec::new(),
            report: None,
        }
    }
}

#[derive(Clone)]
pub struct ResearchPipeline {
    refinement: RefinementLoop,
    composer: ReportComposer,
}

impl ResearchPipeline {
    pub fn new(refinement: RefinementLoop, composer: ReportComposer) -> Self {
        Self {
            refinement,
            composer,
        }
    }

    /// Wire the Ollama model and DuckDuckGo search described by `config`.
    pub fn from_config(config: &Config, sink: Arc<dyn EventSink>) -> Result<Self, DeepReportError> {
        let policy = config.refinement.policy();
        policy.validate()?;

        let client = OllamaClient::from_config(&config.llm)?;
        info!(model = client.model(), base_url = %config.llm.base_url, "using ollama backend");
        let model: Arc<dyn LanguageModel> = Arc::new(client);
        let source = Arc::new(DuckDuckGoSearch::from_config(&config.search)?);

        let refinement = RefinementLoop::new(
            source,
            Arc::new(LlmSummarizer::new(model.clone())),
            Arc::new(LlmJudge::new(model.clone())),
        )
        .with_policy(policy)
        .with_sink(sink.clone());
        let composer = ReportComposer::new(model).with_sink(sink);

        Ok(Self::new(refinement, composer))
    }

    /// Summaries for every serviceable subtopic, in input order.
    ///
    /// Invalid stage input yields an empty list.
    pub async fn run_subtopic_stage(&self, topic: &str, subtopics: &[String]) -> Vec<SummaryRecord> {
        match self.refinement.run_stage(topic, subtopics).await {
            Ok(records) => records,
            Err(err) => {
                self.refinement.sink().emit(PipelineEvent::StageRejected {
                    reason: err.to_string(),
                });
                Vec::new()
            }
        }
    }

    pub async fn run_report_stage(&self, topic: &str, records: &[SummaryRecord]) -> String {
        self.composer.compose(topic, records).await
    }

    pub async fn summarize(&self, mut state: PipelineState) -> PipelineState {
        state.summaries = self.run_subtopic_stage(&state.topic, &state.subtopics).await;
        state
    }

    pub async fn compose(&self, mut state: PipelineState) -> PipelineState {
        state.report = Some(self.run_report_stage(&state.topic, &state.summaries).await);
        state
    }

    /// Run both stages back to back.
    pub async fn run(&self, state: PipelineState) -> PipelineState {
        let state = self.summarize(state).await;
        self.compose(state).await
    }
}
