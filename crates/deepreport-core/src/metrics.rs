use anyhow::Result;
use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

use crate::events::{EventSink, PipelineEvent};

struct RefinementMetrics {
    subtopics: Counter<u64>,
    searches: Counter<u64>,
    evidence_requested: Histogram<f64>,
    reports: Counter<u64>,
}

static METRICS: OnceCell<RefinementMetrics> = OnceCell::new();

fn handles() -> &'static RefinementMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("deepreport.refinement");
        RefinementMetrics {
            subtopics: meter
                .u64_counter("deepreport_subtopics_total")
                .with_description("Processed subtopics by terminal outcome")
                .init(),
            searches: meter
                .u64_counter("deepreport_search_calls_total")
                .with_description("Evidence searches issued by the refinement loop")
                .init(),
            evidence_requested: meter
                .f64_histogram("deepreport_evidence_requested")
                .with_description("Evidence items requested per search")
                .init(),
            reports: meter
                .u64_counter("deepreport_reports_total")
                .with_description("Report stage results by status")
                .init(),
        }
    })
}

/// Hint to operators that OTEL metrics export can be configured externally.
pub fn init_metrics_from_env(service_name: &str) -> Result<()> {
    if std::env::var("DEEPREPORT_OTEL_METRICS_ENDPOINT").is_ok() {
        info!(
            target = "telemetry",
            "DEEPREPORT_OTEL_METRICS_ENDPOINT detected for {service_name}. Configure an OTLP meter provider in your deployment to export refinement metrics."
        );
    }
    Ok(())
}

/// Records OTEL metrics from pipeline events (no-op if no provider installed).
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink;

impl EventSink for MetricsSink {
    fn emit(&self, event: PipelineEvent) {
        let metrics = handles();
        match event {
            PipelineEvent::SearchIssued { evidence_count, .. } => {
                metrics.searches.add(1, &[]);
                metrics
                    .evidence_requested
                    .record(evidence_count as f64, &[]);
            }
            PipelineEvent::SummaryAccepted {
                attempts, reason, ..
            } => {
                let attrs = [
                    KeyValue::new("outcome", "accepted"),
                    KeyValue::new("reason", reason.as_str()),
                    KeyValue::new("attempts", attempts as i64),
                ];
                metrics.subtopics.add(1, &attrs);
            }
            PipelineEvent::SubtopicAbandoned { reason, .. } => {
                let attrs = [
                    KeyValue::new("outcome", "abandoned"),
                    KeyValue::new("reason", reason.as_str()),
                ];
                metrics.subtopics.add(1, &attrs);
            }
            PipelineEvent::ReportComposed { .. } => {
                metrics.reports.add(1, &[KeyValue::new("status", "composed")]);
            }
            PipelineEvent::ReportSkipped { .. } => {
                metrics.reports.add(1, &[KeyValue::new("status", "skipped")]);
            }
            PipelineEvent::ReportFailed { .. } => {
                metrics.reports.add(1, &[KeyValue::new("status", "failed")]);
            }
            _ => {}
        }
    }
}
