// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::evaluator::case::CaseField;
use crate::evaluator::chatbot::ChatbotParams;
use crate::evaluator::metric::{validate_metrics, JudgeParams, MetricDefinition};
use crate::evaluator::parser::ParseFailurePolicy;
use crate::evaluator::runner::DEFAULT_CONCURRENCY;
use crate::infra::errors::JudgeError;
use crate::infra::paths;
use crate::provider::retry::{RetryConfig, RetrySettings};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default judge parameters for metrics that do not override them.
    #[serde(default)]
    pub judge: JudgeParams,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub runner: RunnerSettings,

    #[serde(default)]
    pub chatbot: ChatbotParams,

    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub metrics: Vec<MetricSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub concurrency: usize,
    pub on_parse_failure: ParseFailurePolicy,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            on_parse_failure: ParseFailurePolicy::Error,
        }
    }
}

/// Where to reach the provider. The key itself is read from `api_key_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub request_timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: "OPENAI_API_KEY".into(),
            request_timeout_seconds: 60,
        }
    }
}

/// One `[[metrics]]` entry. Judge parameters fall back to `[judge]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSettings {
    pub name: String,
    pub criteria: String,
    pub fields: Vec<CaseField>,
    pub threshold: f32,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl MetricSettings {
    pub fn to_definition(&self, defaults: &JudgeParams) -> MetricDefinition {
        let params = JudgeParams {
            model: self.model.clone().unwrap_or_else(|| defaults.model.clone()),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        };
        MetricDefinition::new(
            self.name.clone(),
            self.criteria.clone(),
            self.fields.clone(),
            self.threshold,
        )
        .with_params(params)
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults.
    pub fn load() -> Result<Self, JudgeError> {
        match paths::config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, JudgeError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validated metric set. Without `[[metrics]]`, the stock correctness
    /// metric is used with the `[judge]` parameters.
    pub fn metric_definitions(&self) -> Result<Vec<MetricDefinition>, JudgeError> {
        let metrics: Vec<MetricDefinition> = if self.metrics.is_empty() {
            vec![MetricDefinition::correctness().with_params(self.judge.clone())]
        } else {
            self.metrics
                .iter()
                .map(|m| m.to_definition(&self.judge))
                .collect()
        };
        validate_metrics(&metrics)?;
        Ok(metrics)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }
}
