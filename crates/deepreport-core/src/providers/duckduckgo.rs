//! DuckDuckGo instant-answer API as an [`EvidenceSource`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::{DeepReportError, SearchError};
use crate::evidence::{EvidenceItem, EvidenceSource};

#[derive(Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
}

impl DuckDuckGoSearch {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, DeepReportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|err| {
                DeepReportError::InvalidConfiguration(format!(
                    "failed to create HTTP client: {err}"
                ))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, DeepReportError> {
        Self::new(
            config.base_url.clone(),
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl EvidenceSource for DuckDuckGoSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<EvidenceItem>, SearchError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|err| SearchError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| SearchError::InvalidResponse(err.to_string()))?;

        let items = parse_instant_answer(&body, count);
        debug!(%query, requested = count, returned = items.len(), "duckduckgo search finished");
        Ok(items)
    }
}

/// Extract up to `count` evidence items: the abstract first, then direct
/// results, then related topics (flattening topic groups).
pub fn parse_instant_answer(body: &Value, count: usize) -> Vec<EvidenceItem> {
    let mut items = Vec::new();

    if let Some(text) = non_empty(body.get("AbstractText")) {
        items.push(EvidenceItem::new(
            non_empty(body.get("AbstractURL")).map(str::to_string),
            non_empty(body.get("Heading")).map(str::to_string),
            text,
        ));
    }

    let mut entries = Vec::new();
    if let Some(results) = body.get("Results").and_then(Value::as_array) {
        entries.extend(results.iter());
    }
    if let Some(topics) = body.get("RelatedTopics").and_then(Value::as_array) {
        for topic in topics {
            match topic.get("Topics").and_then(Value::as_array) {
                Some(group) => entries.extend(group.iter()),
                None => entries.push(topic),
            }
        }
    }

    for entry in entries {
        if items.len() >= count {
            break;
        }
        if let Some(text) = non_empty(entry.get("Text")) {
            items.push(EvidenceItem::new(
                non_empty(entry.get("FirstURL")).map(str::to_string),
                topic_title(text),
                text,
            ));
        }
    }

    items.truncate(count);
    items
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// Related-topic texts read "Title - description".
fn topic_title(text: &str) -> Option<String> {
    text.split_once(" - ")
        .map(|(title, _)| title.trim())
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}
