// src/provider/resolver.rs — Credential lookup and provider construction
//
// Credentials come from the environment only. The config file names the
// variable to read; it never holds the key itself.

use std::sync::Arc;
use std::time::Duration;

use super::openai::{OpenAIProvider, DEFAULT_BASE_URL};
use super::retry::{RetryConfig, RetryProvider};
use super::ModelProvider;
use crate::infra::config::ProviderSettings;
use crate::infra::errors::JudgeError;

const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Resolved connection details, before any client is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEndpoint {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

/// Resolve credentials and base URL using `lookup` for environment access.
pub fn resolve_endpoint_with<F>(
    settings: &ProviderSettings,
    lookup: F,
) -> Result<ProviderEndpoint, JudgeError>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = lookup(&settings.api_key_env)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| JudgeError::MissingCredential {
            var: settings.api_key_env.clone(),
        })?;

    let base_url = settings
        .base_url
        .clone()
        .or_else(|| lookup(BASE_URL_ENV))
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    Ok(ProviderEndpoint {
        api_key,
        base_url,
        request_timeout: Duration::from_secs(settings.request_timeout_seconds.max(1)),
    })
}

/// Resolve from the process environment.
pub fn resolve_endpoint(settings: &ProviderSettings) -> Result<ProviderEndpoint, JudgeError> {
    resolve_endpoint_with(settings, |var| std::env::var(var).ok())
}

/// Build the HTTP provider wrapped with retry and per-attempt timeout.
/// Fails with `MissingCredential` before any request is sent.
pub fn build_provider(
    settings: &ProviderSettings,
    retry: RetryConfig,
) -> Result<Arc<dyn ModelProvider>, JudgeError> {
    let endpoint = resolve_endpoint(settings)?;
    tracing::debug!(base_url = %endpoint.base_url, "building OpenAI-compatible provider");

    let inner: Arc<dyn ModelProvider> = Arc::new(OpenAIProvider::with_base_url(
        endpoint.api_key,
        endpoint.base_url,
        endpoint.request_timeout,
    )?);
    Ok(Arc::new(RetryProvider::with_config(inner, retry)))
}
