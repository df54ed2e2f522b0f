//! HTTP adapters for the pipeline capabilities.

mod duckduckgo;
mod ollama;

pub use duckduckgo::{DuckDuckGoSearch, parse_instant_answer};
pub use ollama::OllamaClient;
