use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use deepreport_core::{
    Config, ConfigLoader, EventCollector, EventSink, MetricsSink, MultiSink, ResearchPipeline,
    SessionOptions, TelemetryOptions, TraceCollector, TracingSink, init_metrics_from_env,
    init_telemetry, run_research_session,
};
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "deepreport-cli",
    version,
    about = "Iterative subtopic research with a local model"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research every subtopic and print the composed report.
    Run(RunArgs),
    /// Research every subtopic and print the accepted summaries as JSON.
    Summarize(SessionArgs),
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Topic the subtopics belong to.
    #[arg(long)]
    topic: String,

    /// Subtopic to research; repeat for several, order is kept.
    #[arg(long = "subtopic")]
    subtopics: Vec<String>,

    /// Configuration file (defaults to `DEEPREPORT_CONFIG` or `deepreport.toml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override `llm.model`.
    #[arg(long)]
    model: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Print the decision trail after the report.
    #[arg(long, default_value_t = false)]
    trace: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await?,
            Command::Summarize(args) => summarize_command(args).await?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

fn load_config(args: &SessionArgs) -> Result<Config> {
    let mut config = ConfigLoader::load(args.config.clone())?;
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }

    init_telemetry(TelemetryOptions {
        default_filter: config.logging.level.clone(),
        ..TelemetryOptions::default()
    })?;
    init_metrics_from_env("deepreport-cli")?;

    Ok(config)
}

async fn run_command(args: RunArgs) -> Result<()> {
    let config = load_config(&args.session)?;
    let (collector, mut receiver) = EventCollector::new();

    let sink = MultiSink::new()
        .with(Arc::new(TracingSink))
        .with(Arc::new(MetricsSink))
        .with(Arc::new(collector));
    let sink: Arc<dyn EventSink> = Arc::new(sink);

    info!(
        topic = %args.session.topic,
        subtopics = args.session.subtopics.len(),
        model = %config.llm.model,
        "starting DeepReport session"
    );

    let pipeline = Arc::new(ResearchPipeline::from_config(&config, sink)?);
    let outcome = run_research_session(
        pipeline,
        SessionOptions::new(args.session.topic, args.session.subtopics),
    )
    .await?;

    println!("{}", outcome.report());

    if args.trace {
        let mut trace = TraceCollector::new();
        trace.drain(&mut receiver);
        println!("\n{}", trace.summary().render_markdown());
    }

    Ok(())
}

async fn summarize_command(args: SessionArgs) -> Result<()> {
    let config = load_config(&args)?;
    let sink = MultiSink::new()
        .with(Arc::new(TracingSink))
        .with(Arc::new(MetricsSink));

    let pipeline = ResearchPipeline::from_config(&config, Arc::new(sink))?;
    let records = pipeline.run_subtopic_stage(&args.topic, &args.subtopics).await;

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
