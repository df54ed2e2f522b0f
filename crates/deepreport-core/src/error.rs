use std::path::PathBuf;

use thiserror::Error;

/// Core error type for DeepReport configuration and driver failures.
#[derive(Debug, Error)]
pub enum DeepReportError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeepReportError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }
}

/// Evidence retrieval was unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(String),
    #[error("search backend returned status {status}")]
    Status { status: u16 },
    #[error("search backend returned an unreadable response: {0}")]
    InvalidResponse(String),
}

/// A language-model call failed or produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("model backend returned status {status}")]
    Status { status: u16 },
    #[error("model returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("model returned an empty response")]
    EmptyResponse,
}

/// Stage input is missing a topic or subtopics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("research topic is missing")]
    MissingTopic,
    #[error("no subtopics supplied for the research topic")]
    NoSubtopics,
}
