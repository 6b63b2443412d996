// src/evaluator/assertion.rs — Run metrics against a case and assert the result

use serde::{Deserialize, Serialize};

use super::case::EvaluationCase;
use super::metric::MetricDefinition;
use super::parser::ParseFailurePolicy;
use super::verdict::Verdict;
use crate::infra::errors::JudgeError;
use crate::provider::ModelProvider;

/// Diagnostic payload for a case where at least one metric failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    pub failures: Vec<Verdict>,
    #[serde(default)]
    pub passed: Vec<Verdict>,
}

impl AssertionReport {
    pub fn failed_metrics(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|v| v.metric.as_str())
    }
}

impl std::fmt::Display for AssertionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.failures.len() + self.passed.len();
        match &self.case {
            Some(name) => write!(f, "Case '{name}': ")?,
            None => {}
        }
        write!(
            f,
            "{} of {} metric(s) failed",
            self.failures.len(),
            total
        )?;
        for v in &self.failures {
            write!(
                f,
                "\n  - {} (score: {}, threshold: {})",
                v.metric, v.score, v.threshold
            )?;
            if let Some(reason) = &v.rationale {
                write!(f, "\n    reason: {reason}")?;
            }
        }
        Ok(())
    }
}

/// All verdicts for one case, in metric order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseEvaluation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    pub verdicts: Vec<Verdict>,
}

impl CaseEvaluation {
    pub fn with_case_name(mut self, name: impl Into<String>) -> Self {
        self.case = Some(name.into());
        self
    }

    /// Logical AND over all verdicts.
    pub fn passed(&self) -> bool {
        self.verdicts.iter().all(|v| v.passed)
    }

    /// The failure report, if any metric failed.
    pub fn report(&self) -> Option<AssertionReport> {
        if self.passed() {
            return None;
        }
        let (passed, failures): (Vec<Verdict>, Vec<Verdict>) =
            self.verdicts.iter().cloned().partition(|v| v.passed);
        Some(AssertionReport {
            case: self.case.clone(),
            failures,
            passed,
        })
    }

    /// `Ok(verdicts)` when every metric passed, `AssertionFailed` otherwise.
    pub fn into_result(self) -> Result<Vec<Verdict>, JudgeError> {
        match self.report() {
            Some(report) => Err(JudgeError::AssertionFailed(report)),
            None => Ok(self.verdicts),
        }
    }
}

/// Evaluate every metric against `case`, in order.
///
/// Every metric is checked against the case before the first judge call,
/// so configuration problems never cost a request.
pub async fn evaluate_case(
    judge: &dyn ModelProvider,
    case: &EvaluationCase,
    metrics: &[MetricDefinition],
    policy: ParseFailurePolicy,
) -> Result<CaseEvaluation, JudgeError> {
    if metrics.is_empty() {
        return Err(JudgeError::Config("at least one metric is required".into()));
    }
    for metric in metrics {
        metric.validate()?;
        case.validate_for(metric.name(), metric.fields())?;
    }

    let mut verdicts = Vec::with_capacity(metrics.len());
    for metric in metrics {
        verdicts.push(metric.evaluate_with_policy(judge, case, policy).await?);
    }

    Ok(CaseEvaluation {
        case: None,
        verdicts,
    })
}

/// Test-runner entry point: evaluate and fail with a structured report.
///
/// ```ignore
/// #[tokio::test]
/// async fn refund_answer_is_correct() -> Result<(), JudgeError> {
///     let judge = build_judge()?;
///     let case = EvaluationCase::builder("What if these shoes don't fit?")
///         .actual_output(answer)
///         .expected_output("We offer a 30-day full refund at no extra costs.")
///         .build()?;
///     assert_test(judge.as_ref(), &case, &[MetricDefinition::correctness()]).await?;
///     Ok(())
/// }
/// ```
pub async fn assert_test(
    judge: &dyn ModelProvider,
    case: &EvaluationCase,
    metrics: &[MetricDefinition],
) -> Result<Vec<Verdict>, JudgeError> {
    evaluate_case(judge, case, metrics, ParseFailurePolicy::Error)
        .await?
        .into_result()
}
