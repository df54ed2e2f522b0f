//! graph_flow wiring: the subtopic and report stages as graph tasks sharing a
//! [`PipelineState`] through the session context.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use graph_flow::{
    Context, ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, NextAction,
    Session, SessionStorage, Task, TaskResult,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::pipeline::{PipelineState, ResearchPipeline};

const STATE_KEY: &str = "pipeline.state";

pub struct SubtopicStageTask {
    pipeline: Arc<ResearchPipeline>,
}

#[async_trait]
impl Task for SubtopicStageTask {
    fn id(&self) -> &str {
        "subtopics"
    }

    #[instrument(name = "task.subtopics", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let state: PipelineState = context.get(STATE_KEY).await.unwrap_or_default();
        let requested = state.subtopics.len();

        let state = self.pipeline.summarize(state).await;
        let accepted = state.summaries.len();
        context.set(STATE_KEY, &state).await;

        debug!(requested, accepted, "subtopic stage stored summaries");

        Ok(TaskResult::new(
            Some(format!("{accepted} of {requested} subtopics summarized")),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct ReportStageTask {
    pipeline: Arc<ResearchPipeline>,
}

#[async_trait]
impl Task for ReportStageTask {
    fn id(&self) -> &str {
        "report"
    }

    #[instrument(name = "task.report", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let state: PipelineState = context.get(STATE_KEY).await.unwrap_or_default();

        let state = self.pipeline.compose(state).await;
        let report = state.report.clone().unwrap_or_default();
        context.set(STATE_KEY, &state).await;

        info!(sections = state.summaries.len(), "report stage completed");

        Ok(TaskResult::new(Some(report), NextAction::End))
    }
}

fn build_graph(pipeline: Arc<ResearchPipeline>) -> (Arc<graph_flow::Graph>, &'static str) {
    let subtopics = Arc::new(SubtopicStageTask {
        pipeline: pipeline.clone(),
    });
    let report = Arc::new(ReportStageTask { pipeline });
    let start = "subtopics";

    let graph = GraphBuilder::new("deepreport_workflow")
        .add_task(subtopics.clone())
        .add_task(report.clone())
        .add_edge(subtopics.id(), report.id())
        .set_start_task(subtopics.id())
        .build();

    (Arc::new(graph), start)
}

/// Options for running a research session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub topic: String,
    pub subtopics: Vec<String>,
    pub session_id: Option<String>,
}

impl SessionOptions {
    pub fn new(topic: impl Into<String>, subtopics: Vec<String>) -> Self {
        Self {
            topic: topic.into(),
            subtopics,
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub session_id: String,
    pub state: PipelineState,
}

impl ResearchOutcome {
    pub fn report(&self) -> &str {
        self.state.report.as_deref().unwrap_or_default()
    }
}

/// Run both stages as a graph workflow over an in-memory session.
pub async fn run_research_session(
    pipeline: Arc<ResearchPipeline>,
    options: SessionOptions,
) -> Result<ResearchOutcome> {
    let (graph, start) = build_graph(pipeline);

    let storage = Arc::new(InMemorySessionStorage::new());
    let runner = FlowRunner::new(graph, storage.clone());

    let session_id = options
        .session_id
        .clone()
        .unwrap_or_else(|| format!("session-{}", Uuid::new_v4()));
    let session = Session::new_from_task(session_id.clone(), start);

    let state = PipelineState::new(options.topic, options.subtopics);
    session.context.set(STATE_KEY, &state).await;

    storage
        .save(session)
        .await
        .map_err(|err| anyhow!("failed to persist session: {err}"))?;

    loop {
        let result = runner
            .run(&session_id)
            .await
            .map_err(|err| anyhow!("graph execution failure: {err}"))?;

        match result.status {
            ExecutionStatus::Completed => break,
            ExecutionStatus::WaitingForInput => continue,
            ExecutionStatus::Error(message) => return Err(anyhow!(message)),
        }
    }

    let session = storage
        .get(&session_id)
        .await
        .map_err(|err| anyhow!("failed to reload session: {err}"))?
        .ok_or_else(|| anyhow!("session missing after execution"))?;

    let state: PipelineState = session
        .context
        .get(STATE_KEY)
        .await
        .ok_or_else(|| anyhow!("pipeline state missing after execution"))?;

    Ok(ResearchOutcome { session_id, state })
}
