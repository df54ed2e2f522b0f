use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::DeepReportError;
use crate::refinement::{
    DEFAULT_EVIDENCE_CAP, DEFAULT_EVIDENCE_STEP, DEFAULT_INITIAL_EVIDENCE, DEFAULT_MAX_ATTEMPTS,
    EvidenceStrategy, RefinementPolicy,
};

const DEFAULT_CONFIG_PATH: &str = "deepreport.toml";
const CONFIG_PATH_ENV: &str = "DEEPREPORT_CONFIG";

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub refinement: RefinementConfig,
    pub logging: LoggingConfig,
}

/// Helper to load configuration with validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `DEEPREPORT_CONFIG` environment variable.
    /// 3. `deepreport.toml` in the current working directory.
    ///
    /// Only the implicit default may be absent, in which case built-in
    /// defaults apply.
    pub fn load(path: Option<PathBuf>) -> Result<Config, DeepReportError> {
        let (candidate, explicit) = resolve_path(path);
        if !explicit && !candidate.exists() {
            let config = Config::default();
            Self::validate(&config)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&candidate)
            .map_err(|err| DeepReportError::config_io(candidate.clone(), err))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Config, DeepReportError> {
        let config: Config = toml::from_str(raw)
            .map_err(|err| DeepReportError::InvalidConfiguration(err.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), DeepReportError> {
        if config.llm.model.trim().is_empty() {
            return Err(DeepReportError::InvalidConfiguration(
                "llm.model must name a model".into(),
            ));
        }
        if config.llm.base_url.trim().is_empty() {
            return Err(DeepReportError::InvalidConfiguration(
                "llm.base_url must not be empty".into(),
            ));
        }
        if config.search.base_url.trim().is_empty() {
            return Err(DeepReportError::InvalidConfiguration(
                "search.base_url must not be empty".into(),
            ));
        }
        config.refinement.policy().validate()
    }
}

fn resolve_path(path: Option<PathBuf>) -> (PathBuf, bool) {
    if let Some(path) = path {
        return (path, true);
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return (PathBuf::from(from_env), true);
        }
    }

    (Path::new(DEFAULT_CONFIG_PATH).to_path_buf(), false)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "qwen3:1.7b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 120,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.duckduckgo.com".to_string(),
            timeout_secs: 15,
            user_agent: concat!("deepreport/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    pub max_attempts: usize,
    pub initial_evidence: usize,
    pub evidence_step: usize,
    pub evidence_cap: usize,
    pub strategy: EvidenceStrategy,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_evidence: DEFAULT_INITIAL_EVIDENCE,
            evidence_step: DEFAULT_EVIDENCE_STEP,
            evidence_cap: DEFAULT_EVIDENCE_CAP,
            strategy: EvidenceStrategy::Refetch,
        }
    }
}

impl RefinementConfig {
    pub fn policy(&self) -> RefinementPolicy {
        RefinementPolicy {
            max_attempts: self.max_attempts,
            initial_evidence: self.initial_evidence,
            evidence_step: self.evidence_step,
            evidence_cap: self.evidence_cap,
            strategy: self.strategy,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
