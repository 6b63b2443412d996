// src/evaluator/metric.rs — Metric definitions (criteria, fields, threshold, judge params)

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::case::{CaseField, EvaluationCase};
use super::parser::{self, ParseFailurePolicy};
use super::verdict::{self, Verdict};
use crate::infra::errors::JudgeError;
use crate::provider::ModelProvider;

pub const CORRECTNESS_CRITERIA: &str =
    "Determine if the 'actual output' is correct based on the 'expected output'.";

/// Parameters for the judge call. Low temperature keeps judge variance down;
/// it cannot remove it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for JudgeParams {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            temperature: 0.0,
            max_tokens: 512,
        }
    }
}

/// A named, reusable judging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    name: String,
    criteria: String,
    fields: Vec<CaseField>,
    threshold: f32,
    params: JudgeParams,
}

impl MetricDefinition {
    pub fn new(
        name: impl Into<String>,
        criteria: impl Into<String>,
        fields: Vec<CaseField>,
        threshold: f32,
    ) -> Self {
        Self {
            name: name.into(),
            criteria: criteria.into(),
            fields,
            threshold,
            params: JudgeParams::default(),
        }
    }

    /// The stock correctness metric: actual vs. expected output at 0.5.
    pub fn correctness() -> Self {
        Self::new(
            "Correctness",
            CORRECTNESS_CRITERIA,
            vec![CaseField::ActualOutput, CaseField::ExpectedOutput],
            0.5,
        )
    }

    pub fn with_params(mut self, params: JudgeParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.params.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.params.temperature = temperature;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn criteria(&self) -> &str {
        &self.criteria
    }

    pub fn fields(&self) -> &[CaseField] {
        &self.fields
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn params(&self) -> &JudgeParams {
        &self.params
    }

    /// Check the definition itself, independent of any case.
    pub fn validate(&self) -> Result<(), JudgeError> {
        if self.name.trim().is_empty() {
            return Err(JudgeError::Config("metric name must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(JudgeError::InvalidThreshold {
                metric: self.name.clone(),
                threshold: self.threshold,
            });
        }
        if self.criteria.trim().is_empty() {
            return Err(JudgeError::Config(format!(
                "metric '{}' has empty criteria",
                self.name
            )));
        }
        if self.fields.is_empty() {
            return Err(JudgeError::Config(format!(
                "metric '{}' must reference at least one case field",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.fields.iter().find(|f| !seen.insert(**f)) {
            return Err(JudgeError::Config(format!(
                "metric '{}' lists field '{}' more than once",
                self.name, dup
            )));
        }
        if !self.params.temperature.is_finite() || self.params.temperature < 0.0 {
            return Err(JudgeError::Config(format!(
                "metric '{}' has invalid judge temperature {}",
                self.name, self.params.temperature
            )));
        }
        if self.params.model.trim().is_empty() {
            return Err(JudgeError::Config(format!(
                "metric '{}' has no judge model",
                self.name
            )));
        }
        Ok(())
    }

    /// Judge `case` and decide pass/fail. Unparseable judge output is a hard error.
    pub async fn evaluate(
        &self,
        judge: &dyn ModelProvider,
        case: &EvaluationCase,
    ) -> Result<Verdict, JudgeError> {
        self.evaluate_with_policy(judge, case, ParseFailurePolicy::Error)
            .await
    }

    /// Judge `case` with an explicit parse-failure policy.
    ///
    /// All validation happens before the judge is called, so a
    /// configuration error guarantees no request went out.
    pub async fn evaluate_with_policy(
        &self,
        judge: &dyn ModelProvider,
        case: &EvaluationCase,
        policy: ParseFailurePolicy,
    ) -> Result<Verdict, JudgeError> {
        self.validate()?;
        case.validate_for(&self.name, &self.fields)?;

        let raw = super::judge::invoke_judge(judge, self, case).await?;

        let (score, rationale) = match parser::extract(&raw) {
            Ok(judgment) => (judgment.score, judgment.rationale),
            Err(failure) => match policy {
                ParseFailurePolicy::Error => {
                    return Err(JudgeError::ScoreParsing {
                        metric: self.name.clone(),
                        failure,
                        raw,
                    });
                }
                ParseFailurePolicy::FailClosed => {
                    tracing::warn!(
                        metric = %self.name,
                        "judge response unparseable ({}), failing closed with score 0",
                        failure
                    );
                    (0.0, Some(format!("unparseable judge response: {failure}")))
                }
            },
        };

        let verdict = verdict::decide(&self.name, score, self.threshold, rationale);
        tracing::info!(
            metric = %verdict.metric,
            score = verdict.score,
            threshold = verdict.threshold,
            passed = verdict.passed,
            "verdict"
        );
        Ok(verdict)
    }
}

/// Validate a whole metric set: each definition, plus unique names.
pub fn validate_metrics(metrics: &[MetricDefinition]) -> Result<(), JudgeError> {
    if metrics.is_empty() {
        return Err(JudgeError::Config("at least one metric is required".into()));
    }
    let mut names = HashSet::new();
    for metric in metrics {
        metric.validate()?;
        if !names.insert(metric.name()) {
            return Err(JudgeError::Config(format!(
                "metric name '{}' is used more than once",
                metric.name()
            )));
        }
    }
    Ok(())
}
