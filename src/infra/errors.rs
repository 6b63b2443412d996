// src/infra/errors.rs — Error types for llm-judge

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evaluator::assertion::AssertionReport;
use crate::evaluator::case::CaseField;
use crate::evaluator::parser::ParseFailure;

#[derive(Error, Debug)]
pub enum JudgeError {
    // Configuration errors (reported before any external call)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metric '{metric}' requires field '{field}', which the case does not provide")]
    MissingField { metric: String, field: CaseField },

    #[error("Metric '{metric}' has threshold {threshold}, expected a value in [0, 1]")]
    InvalidThreshold { metric: String, threshold: f32 },

    #[error("Missing credential: set the {var} environment variable")]
    MissingCredential { var: String },

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Provider errors (retriable unless stated otherwise)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Provider '{provider}' timed out after {after_ms}ms")]
    Timeout { provider: String, after_ms: u64 },

    #[error("Provider '{provider}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        provider: String,
        attempts: u32,
        last_error: String,
    },

    // Judge produced text we could not score
    #[error("Metric '{metric}': could not parse judge response ({failure})")]
    ScoreParsing {
        metric: String,
        failure: ParseFailure,
        raw: String,
    },

    // Quality failure
    #[error("{0}")]
    AssertionFailed(AssertionReport),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification so tooling can separate "evaluation infrastructure
/// error" from "quality regression".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Infrastructure,
    Parsing,
    Quality,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Infrastructure => "evaluation infrastructure error",
            ErrorKind::Parsing => "score parsing error",
            ErrorKind::Quality => "quality regression",
        };
        f.write_str(s)
    }
}

impl JudgeError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            JudgeError::Provider {
                retriable: true,
                ..
            } | JudgeError::RateLimited { .. }
                | JudgeError::Timeout { .. }
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            JudgeError::Config(_)
            | JudgeError::MissingField { .. }
            | JudgeError::InvalidThreshold { .. }
            | JudgeError::MissingCredential { .. }
            | JudgeError::Toml(_)
            | JudgeError::Io(_) => ErrorKind::Configuration,
            JudgeError::Provider { .. }
            | JudgeError::RateLimited { .. }
            | JudgeError::Timeout { .. }
            | JudgeError::RetriesExhausted { .. }
            | JudgeError::Other(_) => ErrorKind::Infrastructure,
            JudgeError::ScoreParsing { .. } => ErrorKind::Parsing,
            JudgeError::AssertionFailed(_) => ErrorKind::Quality,
        }
    }

    /// The structured report, when this is a quality failure.
    pub fn report(&self) -> Option<&AssertionReport> {
        match self {
            JudgeError::AssertionFailed(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_variants() {
        assert!(JudgeError::Provider {
            provider: "openai".into(),
            message: "HTTP 503".into(),
            retriable: true,
        }
        .is_retriable());
        assert!(JudgeError::RateLimited {
            provider: "openai".into(),
            retry_after_ms: 1000,
        }
        .is_retriable());
        assert!(JudgeError::Timeout {
            provider: "openai".into(),
            after_ms: 100,
        }
        .is_retriable());
    }

    #[test]
    fn test_not_retriable_variants() {
        assert!(!JudgeError::Provider {
            provider: "openai".into(),
            message: "HTTP 401".into(),
            retriable: false,
        }
        .is_retriable());
        assert!(!JudgeError::RetriesExhausted {
            provider: "openai".into(),
            attempts: 3,
            last_error: "boom".into(),
        }
        .is_retriable());
        assert!(!JudgeError::Config("bad".into()).is_retriable());
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            JudgeError::MissingCredential {
                var: "OPENAI_API_KEY".into()
            }
            .kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            JudgeError::MissingField {
                metric: "Correctness".into(),
                field: CaseField::ExpectedOutput,
            }
            .kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            JudgeError::RetriesExhausted {
                provider: "openai".into(),
                attempts: 3,
                last_error: "connection reset".into(),
            }
            .kind(),
            ErrorKind::Infrastructure
        );
        assert_eq!(
            JudgeError::ScoreParsing {
                metric: "Correctness".into(),
                failure: ParseFailure::NoScore,
                raw: "Great question!".into(),
            }
            .kind(),
            ErrorKind::Parsing
        );
    }

    #[test]
    fn test_missing_field_message_uses_label() {
        let err = JudgeError::MissingField {
            metric: "Correctness".into(),
            field: CaseField::ExpectedOutput,
        };
        assert_eq!(
            err.to_string(),
            "Metric 'Correctness' requires field 'Expected Output', which the case does not provide"
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(
            ErrorKind::Infrastructure.to_string(),
            "evaluation infrastructure error"
        );
        assert_eq!(ErrorKind::Quality.to_string(), "quality regression");
    }
}
