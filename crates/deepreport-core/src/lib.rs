//! DeepReport core: iterative subtopic research and report composition.
//!
//! For every subtopic a [`RefinementLoop`] searches for evidence, asks a
//! model for a grounded summary and lets a judge decide whether to retry with
//! more evidence. A [`ReportComposer`] then joins the accepted summaries into
//! one report. Both stages run through [`ResearchPipeline`], directly or as a
//! `graph_flow` workflow via [`run_research_session`].

mod config;
mod error;
mod events;
mod evidence;
mod generation;
mod metrics;
mod pipeline;
pub mod providers;
mod refinement;
mod report;
mod telemetry;
mod text;
mod trace;
mod workflow;

pub use config::{
    Config, ConfigLoader, LlmConfig, LoggingConfig, RefinementConfig, SearchConfig,
};
pub use error::{ConfigurationError, DeepReportError, GenerationError, SearchError};
pub use events::{EventCollector, EventRecord, EventSink, MultiSink, PipelineEvent, TracingSink};
pub use evidence::{EvidenceItem, EvidenceSource, render_evidence};
pub use generation::{
    GenerationRequest, Judge, LanguageModel, LlmJudge, LlmSummarizer, Summarizer, parse_verdict,
};
pub use metrics::{MetricsSink, init_metrics_from_env};
pub use pipeline::{PipelineState, ResearchPipeline};
pub use refinement::{
    AbandonReason, AcceptReason, EvidenceStrategy, FAILED_SUMMARY_TEXT, RefinementLoop,
    RefinementPolicy, RetryBudget, SubtopicOutcome, SummaryRecord,
};
pub use report::{INSUFFICIENT_DATA_REPORT, ReportComposer};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use text::strip_think_blocks;
pub use trace::{TraceCollector, TraceStep, TraceSummary};
pub use workflow::{ResearchOutcome, SessionOptions, run_research_session};
