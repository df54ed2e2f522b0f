use std::sync::Arc;

use tracing::instrument;

use crate::error::GenerationError;
use crate::events::{EventSink, PipelineEvent, TracingSink};
use crate::generation::{GenerationRequest, LanguageModel};
use crate::refinement::SummaryRecord;
use crate::text::strip_think_blocks;

pub const INSUFFICIENT_DATA_REPORT: &str = "Не удалось сгенерировать отчет из-за отсутствия данных.";

pub const REPORT_SYSTEM_PROMPT: &str = "Ты - эксперт по искусственному интеллекту, задача которого - писать связные и информативные доклады. Отвечай всегда только на русском языке. Строго используй только предоставленную информацию.";

const REPORT_FAILURE_PREFIX: &str = "Произошла ошибка при генерации отчета";

/// Turns accepted subtopic summaries into one prose report.
#[derive(Clone)]
pub struct ReportComposer {
    model: Arc<dyn LanguageModel>,
    sink: Arc<dyn EventSink>,
}

impl ReportComposer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Compose the report; failures are reported inside the returned text.
    #[instrument(name = "stage.report", skip(self, records), fields(sections = records.len()))]
    pub async fn compose(&self, topic: &str, records: &[SummaryRecord]) -> String {
        if records.is_empty() {
            self.sink.emit(PipelineEvent::ReportSkipped {
                topic: topic.to_string(),
            });
            return INSUFFICIENT_DATA_REPORT.to_string();
        }

        let request =
            GenerationRequest::new(report_prompt(topic, records)).with_system(REPORT_SYSTEM_PROMPT);

        let generated = self.model.generate(&request).await.and_then(|raw| {
            let report = strip_think_blocks(&raw);
            if report.is_empty() {
                Err(GenerationError::EmptyResponse)
            } else {
                Ok(report)
            }
        });

        match generated {
            Ok(report) => {
                self.sink.emit(PipelineEvent::ReportComposed {
                    topic: topic.to_string(),
                    sections: records.len(),
                });
                report
            }
            Err(err) => {
                self.sink.emit(PipelineEvent::ReportFailed {
                    topic: topic.to_string(),
                    reason: err.to_string(),
                });
                format!("{REPORT_FAILURE_PREFIX}: {err}")
            }
        }
    }
}

/// `### subtopic` headed blocks in input order, separated by blank lines.
pub fn summary_blocks(records: &[SummaryRecord]) -> String {
    records
        .iter()
        .map(|record| format!("### {}\n{}", record.subtopic, record.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn report_prompt(topic: &str, records: &[SummaryRecord]) -> String {
    format!(
        "Ты - эксперт по искусственному интеллекту. Напиши подробный и связный доклад на тему '{topic}' \
         на основе ТОЛЬКО СЛЕДУЮЩИХ SUMMARIES:\n\n\
         {}\n\n\
         Доклад должен быть логически структурирован, состоять из 4-5 абзацев, связывая информацию между подпунктами, \
         включая примеры, если они есть в предоставленных summary. \
         В самом конце доклада, после основного текста, добавь раздел 'Оглавление' \
         со списком всех рассмотренных подпунктов, как в начале документа. \
         Не придумывай информацию, которой нет в summary. Пиши только на русском языке!",
        summary_blocks(records)
    )
}
