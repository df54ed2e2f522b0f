//! Evidence items and the search capability the refinement loop consumes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

const MISSING_FIELD: &str = "N/A";

/// One retrieved search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub url: Option<String>,
    pub title: Option<String>,
    pub text: String,
}

impl EvidenceItem {
    pub fn new(url: Option<String>, title: Option<String>, text: impl Into<String>) -> Self {
        Self {
            url,
            title,
            text: text.into(),
        }
    }

    /// Render the item as a labelled block for a summarization prompt.
    pub fn render(&self) -> String {
        format!(
            "URL: {}\nЗаголовок: {}\nТекст: {}",
            self.url.as_deref().unwrap_or(MISSING_FIELD),
            self.title.as_deref().unwrap_or(MISSING_FIELD),
            self.text
        )
    }

    /// Identity used when merging evidence pools across attempts.
    pub(crate) fn dedup_key(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.text)
    }
}

/// Join evidence blocks with blank lines, preserving order.
pub fn render_evidence(items: &[EvidenceItem]) -> String {
    items
        .iter()
        .map(EvidenceItem::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Search capability: return up to `count` items for `query`.
///
/// Implementations may return fewer items than requested.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<EvidenceItem>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_evidence_labels_missing_fields() {
        let items = vec![
            EvidenceItem::new(
                Some("https://example.com/qubits".to_string()),
                Some("Кубиты".to_string()),
                "Кубит может находиться в суперпозиции.",
            ),
            EvidenceItem::new(None, None, "Запутанность связывает кубиты."),
        ];

        insta::assert_snapshot!(render_evidence(&items), @r"
        URL: https://example.com/qubits
        Заголовок: Кубиты
        Текст: Кубит может находиться в суперпозиции.

        URL: N/A
        Заголовок: N/A
        Текст: Запутанность связывает кубиты.
        ");
    }

    #[test]
    fn dedup_key_falls_back_to_text() {
        let with_url = EvidenceItem::new(Some("u".into()), None, "a");
        let without_url = EvidenceItem::new(None, None, "b");
        assert_eq!(with_url.dedup_key(), "u");
        assert_eq!(without_url.dedup_key(), "b");
    }
}
