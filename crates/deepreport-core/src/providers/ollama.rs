//! Ollama `/api/generate` backend for the [`LanguageModel`] capability.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{DeepReportError, GenerationError};
use crate::generation::{GenerationRequest, LanguageModel};

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DeepReportError> {
        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            DeepReportError::InvalidConfiguration(format!("failed to create HTTP client: {err}"))
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: None,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, DeepReportError> {
        let client = Self::new(
            config.base_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(match config.temperature {
            Some(temperature) => client.with_temperature(temperature),
            None => client,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: self
                .temperature
                .map(|temperature| GenerateOptions { temperature }),
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
            });
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::InvalidResponse(err.to_string()))?;

        if payload.response.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        debug!(model = %self.model, chars = payload.response.chars().count(), "ollama generation finished");
        Ok(payload.response)
    }
}
