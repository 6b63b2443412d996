// src/evaluator/suite.rs — Suite files: evaluation cases in TOML

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::case::{EvaluationCase, EvaluationCaseBuilder};
use super::metric::MetricDefinition;
use crate::infra::errors::JudgeError;

/// One case as written in a suite file. `actual_output` may be left out
/// when a chatbot is configured to produce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSpec {
    #[serde(default)]
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub actual_output: Option<String>,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub retrieval_context: Vec<String>,
}

impl CaseSpec {
    pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            actual_output: None,
            expected_output: None,
            retrieval_context: Vec::new(),
        }
    }

    pub fn with_actual_output(mut self, output: impl Into<String>) -> Self {
        self.actual_output = Some(output.into());
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_retrieval_context<I, S>(mut self, context: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retrieval_context = context.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_actual_output(&self) -> bool {
        self.actual_output
            .as_deref()
            .is_some_and(|o| !o.trim().is_empty())
    }

    /// Builder pre-filled with everything except the actual output.
    pub fn builder(&self) -> EvaluationCaseBuilder {
        EvaluationCase::builder(self.input.clone())
            .maybe_expected_output(self.expected_output.clone())
            .retrieval_context(self.retrieval_context.clone())
    }

    /// Build the case with `actual_output` and check it against `metrics`.
    pub fn to_case(
        &self,
        actual_output: &str,
        metrics: &[MetricDefinition],
    ) -> Result<EvaluationCase, JudgeError> {
        self.builder()
            .actual_output(actual_output)
            .build_for(metrics)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    #[serde(default)]
    pub cases: Vec<CaseSpec>,
}

impl Suite {
    pub fn load(path: &Path) -> Result<Self, JudgeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, JudgeError> {
        let mut suite: Suite = toml::from_str(content)?;
        if suite.cases.is_empty() {
            return Err(JudgeError::Config("suite contains no cases".into()));
        }
        for (i, case) in suite.cases.iter_mut().enumerate() {
            if case.name.trim().is_empty() {
                case.name = format!("case-{}", i + 1);
            }
        }
        Ok(suite)
    }

    /// Check every case against `metrics` without calling anything.
    /// Cases without an actual output only get their reference fields checked.
    pub fn validate(&self, metrics: &[MetricDefinition]) -> Result<(), JudgeError> {
        for spec in &self.cases {
            let actual = spec
                .actual_output
                .as_deref()
                .filter(|o| !o.trim().is_empty())
                .unwrap_or("<generated by the model under test>");

            spec.to_case(actual, metrics).map_err(|e| match e {
                JudgeError::MissingField { metric, field } => JudgeError::Config(format!(
                    "case '{}': metric '{}' requires field '{}'",
                    spec.name, metric, field
                )),
                other => other,
            })?;
        }
        Ok(())
    }
}
