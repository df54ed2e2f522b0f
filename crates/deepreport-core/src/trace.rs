use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::events::EventRecord;

/// Drains collected events into an ordered decision trail.
#[derive(Debug, Default)]
pub struct TraceCollector {
    records: Vec<EventRecord>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Take every record currently buffered in `receiver` without waiting.
    pub fn drain(&mut self, receiver: &mut mpsc::UnboundedReceiver<EventRecord>) -> usize {
        let before = self.records.len();
        while let Ok(record) = receiver.try_recv() {
            self.records.push(record);
        }
        self.records.len() - before
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> TraceSummary {
        TraceSummary::from_records(&self.records)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub index: usize,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSummary {
    pub steps: Vec<TraceStep>,
}

impl TraceSummary {
    pub fn from_records(records: &[EventRecord]) -> Self {
        let steps = records
            .iter()
            .enumerate()
            .map(|(idx, record)| TraceStep {
                index: idx + 1,
                subject: record.event.subject().to_string(),
                message: record.event.describe(),
            })
            .collect();
        Self { steps }
    }

    pub fn render_markdown(&self) -> String {
        if self.steps.is_empty() {
            return "No trace events recorded.".to_string();
        }
        let mut output = String::from("### Trace Summary\n");
        for step in &self.steps {
            let _ = writeln!(
                output,
                "{}. {} → {}",
                step.index, step.subject, step.message
            );
        }
        output
    }
}
