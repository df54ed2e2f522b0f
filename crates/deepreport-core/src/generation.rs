//! Language-model capabilities: raw generation, grounded summarization and
//! the sufficiency judge.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::GenerationError;
use crate::evidence::{EvidenceItem, render_evidence};
use crate::text::strip_think_blocks;

pub const SUMMARIZER_SYSTEM_PROMPT: &str = "Ты - эксперт по искусственному интеллекту, задача которого - создавать точные и информативные summary на основе предоставленных текстов. Отвечай всегда только на русском языке, не выдумывай информацию.";

pub const JUDGE_SYSTEM_PROMPT: &str = "Ты - строгий рецензент. Твоя задача - оценить, достаточно ли информации в summary для раздела доклада. Отвечай одним словом: 'да' или 'нет'.";

/// A single prompt sent to a model backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Opaque text-generation capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Produce a summary of `subtopic` grounded only in `evidence`.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        topic: &str,
        subtopic: &str,
        evidence: &[EvidenceItem],
    ) -> Result<String, GenerationError>;
}

/// Decide whether a summary needs more supporting information.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn need_more_info(
        &self,
        subtopic: &str,
        summary: &str,
    ) -> Result<bool, GenerationError>;
}

pub fn summary_prompt(topic: &str, subtopic: &str, evidence: &[EvidenceItem]) -> String {
    format!(
        "Ты - эксперт по искусственному интеллекту. Создай подробное summary (краткое изложение) \
         по подпункту '{subtopic}' в контексте основной темы '{topic}'. \
         Используй ТОЛЬКО факты из предоставленных текстов ниже, не добавляй ничего выдуманного. \
         Summary должно быть на русском языке, объемом 1-2 абзаца, с примерами, если они явно присутствуют в текстах.\n\n\
         Тексты для анализа:\n{}",
        render_evidence(evidence)
    )
}

pub fn judge_prompt(subtopic: &str, summary: &str) -> String {
    format!(
        "Подпункт доклада: '{subtopic}'.\n\nSummary:\n{summary}\n\n\
         Нужно ли собрать больше информации, чтобы раскрыть этот подпункт? \
         Ответь только 'да' (информации недостаточно) или 'нет' (информации достаточно)."
    )
}

/// Interpret a one-word verdict; `true` means more information is needed.
pub fn parse_verdict(raw: &str) -> Result<bool, GenerationError> {
    let cleaned = strip_think_blocks(raw).to_lowercase();
    let word: String = cleaned
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .chars()
        .take_while(|c| c.is_alphanumeric())
        .collect();

    match word.as_str() {
        "да" | "yes" => Ok(true),
        "нет" | "no" => Ok(false),
        _ => Err(GenerationError::InvalidResponse(format!(
            "unrecognised verdict: {}",
            cleaned.trim()
        ))),
    }
}

/// Summarizer backed by a [`LanguageModel`].
#[derive(Clone)]
pub struct LlmSummarizer {
    model: Arc<dyn LanguageModel>,
}

impl LlmSummarizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        topic: &str,
        subtopic: &str,
        evidence: &[EvidenceItem],
    ) -> Result<String, GenerationError> {
        let request = GenerationRequest::new(summary_prompt(topic, subtopic, evidence))
            .with_system(SUMMARIZER_SYSTEM_PROMPT);
        let raw = self.model.generate(&request).await?;
        let summary = strip_think_blocks(&raw);
        if summary.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        debug!(%subtopic, chars = summary.chars().count(), "summary generated");
        Ok(summary)
    }
}

/// Judge backed by a [`LanguageModel`] answering "да"/"нет".
#[derive(Clone)]
pub struct LlmJudge {
    model: Arc<dyn LanguageModel>,
}

impl LlmJudge {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn need_more_info(
        &self,
        subtopic: &str,
        summary: &str,
    ) -> Result<bool, GenerationError> {
        let request =
            GenerationRequest::new(judge_prompt(subtopic, summary)).with_system(JUDGE_SYSTEM_PROMPT);
        let raw = self.model.generate(&request).await?;
        parse_verdict(&raw)
    }
}
