// src/evaluator/case.rs — Evaluation case model

use serde::{Deserialize, Serialize};

use super::metric::MetricDefinition;
use crate::infra::errors::JudgeError;

/// A case field a metric can hand to the judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseField {
    Input,
    ActualOutput,
    ExpectedOutput,
    RetrievalContext,
}

impl CaseField {
    /// Human label used in judge prompts and reports.
    pub fn label(&self) -> &'static str {
        match self {
            CaseField::Input => "Input",
            CaseField::ActualOutput => "Actual Output",
            CaseField::ExpectedOutput => "Expected Output",
            CaseField::RetrievalContext => "Retrieval Context",
        }
    }
}

impl std::fmt::Display for CaseField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Borrowed view of one populated case field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Snippets(&'a [String]),
}

/// One unit of input/output/reference data to be judged. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationCase {
    input: String,
    actual_output: String,
    expected_output: Option<String>,
    retrieval_context: Vec<String>,
}

impl EvaluationCase {
    pub fn builder(input: impl Into<String>) -> EvaluationCaseBuilder {
        EvaluationCaseBuilder {
            input: input.into(),
            actual_output: None,
            expected_output: None,
            retrieval_context: Vec::new(),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn actual_output(&self) -> &str {
        &self.actual_output
    }

    pub fn expected_output(&self) -> Option<&str> {
        self.expected_output.as_deref()
    }

    pub fn retrieval_context(&self) -> &[String] {
        &self.retrieval_context
    }

    /// The value of `field`, or `None` when it is absent or blank.
    pub fn field_value(&self, field: CaseField) -> Option<FieldValue<'_>> {
        match field {
            CaseField::Input => non_blank(&self.input).map(FieldValue::Text),
            CaseField::ActualOutput => non_blank(&self.actual_output).map(FieldValue::Text),
            CaseField::ExpectedOutput => self
                .expected_output
                .as_deref()
                .and_then(non_blank)
                .map(FieldValue::Text),
            CaseField::RetrievalContext => {
                if self.retrieval_context.iter().any(|s| !s.trim().is_empty()) {
                    Some(FieldValue::Snippets(&self.retrieval_context))
                } else {
                    None
                }
            }
        }
    }

    /// Check that every field in `fields` is populated on this case.
    pub fn validate_for(&self, metric: &str, fields: &[CaseField]) -> Result<(), JudgeError> {
        for field in fields {
            if self.field_value(*field).is_none() {
                return Err(JudgeError::MissingField {
                    metric: metric.to_string(),
                    field: *field,
                });
            }
        }
        Ok(())
    }
}

fn non_blank(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

pub struct EvaluationCaseBuilder {
    input: String,
    actual_output: Option<String>,
    expected_output: Option<String>,
    retrieval_context: Vec<String>,
}

impl EvaluationCaseBuilder {
    pub fn actual_output(mut self, output: impl Into<String>) -> Self {
        self.actual_output = Some(output.into());
        self
    }

    pub fn expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn maybe_expected_output(mut self, expected: Option<String>) -> Self {
        self.expected_output = expected;
        self
    }

    pub fn retrieval_context<I, S>(mut self, context: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retrieval_context = context.into_iter().map(Into::into).collect();
        self
    }

    /// Build the case. The actual output must be present and non-blank.
    pub fn build(self) -> Result<EvaluationCase, JudgeError> {
        let actual_output = self
            .actual_output
            .filter(|o| !o.trim().is_empty())
            .ok_or_else(|| {
                JudgeError::Config("actual output must be populated before evaluation".into())
            })?;

        Ok(EvaluationCase {
            input: self.input,
            actual_output,
            expected_output: self.expected_output,
            retrieval_context: self.retrieval_context,
        })
    }

    /// Build and check the case against every metric it will be judged by.
    pub fn build_for(self, metrics: &[MetricDefinition]) -> Result<EvaluationCase, JudgeError> {
        let case = self.build()?;
        for metric in metrics {
            case.validate_for(metric.name(), metric.fields())?;
        }
        Ok(case)
    }
}
