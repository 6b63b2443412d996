// src/evaluator/runner.rs — Batch evaluation through a bounded worker pool
//
// Cases are independent: metric definitions are shared read-only and each
// case gets its own task. A semaphore caps in-flight cases so provider rate
// limits are respected. Cancelling stops new cases from starting; cases
// already talking to a provider run to completion and keep their verdicts.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::assertion::{evaluate_case, AssertionReport};
use super::chatbot::RagChatbot;
use super::metric::{validate_metrics, MetricDefinition};
use super::parser::ParseFailurePolicy;
use super::suite::CaseSpec;
use super::verdict::Verdict;
use crate::infra::errors::{ErrorKind, JudgeError};
use crate::provider::ModelProvider;

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseOutcome {
    Passed { verdicts: Vec<Verdict> },
    Failed { report: AssertionReport },
    Error { kind: ErrorKind, message: String },
    Skipped,
}

impl CaseOutcome {
    fn from_error(err: &JudgeError) -> Self {
        CaseOutcome::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CaseOutcome::Passed { .. } => "PASS",
            CaseOutcome::Failed { .. } => "FAIL",
            CaseOutcome::Error { .. } => "ERROR",
            CaseOutcome::Skipped => "SKIP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub index: usize,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    #[serde(flatten)]
    pub outcome: CaseOutcome,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub configuration_errors: usize,
    pub infrastructure_errors: usize,
    pub parsing_errors: usize,
    pub skipped: usize,
}

impl BatchSummary {
    fn from_results(results: &[CaseResult]) -> Self {
        let mut s = BatchSummary {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            match &r.outcome {
                CaseOutcome::Passed { .. } => s.passed += 1,
                CaseOutcome::Failed { .. } => s.failed += 1,
                CaseOutcome::Error { kind, .. } => match kind {
                    ErrorKind::Configuration => s.configuration_errors += 1,
                    ErrorKind::Infrastructure => s.infrastructure_errors += 1,
                    ErrorKind::Parsing => s.parsing_errors += 1,
                    ErrorKind::Quality => s.failed += 1,
                },
                CaseOutcome::Skipped => s.skipped += 1,
            }
        }
        s
    }

    pub fn errors(&self) -> usize {
        self.configuration_errors + self.infrastructure_errors + self.parsing_errors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub results: Vec<CaseResult>,
}

impl BatchReport {
    pub fn all_passed(&self) -> bool {
        self.summary.passed == self.summary.total
    }

    /// 0 = all passed, 1 = quality failures only, 2 = errors or skipped cases.
    pub fn exit_code(&self) -> i32 {
        if self.summary.errors() > 0 || self.summary.skipped > 0 {
            2
        } else if self.summary.failed > 0 {
            1
        } else {
            0
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, JudgeError> {
        serde_json::to_string_pretty(self).map_err(|e| JudgeError::Other(e.into()))
    }
}

/// Shared, read-only state handed to each case task.
#[derive(Clone)]
struct CaseContext {
    judge: Arc<dyn ModelProvider>,
    metrics: Arc<[MetricDefinition]>,
    chatbot: Option<Arc<RagChatbot>>,
    policy: ParseFailurePolicy,
    cancel: CancellationToken,
}

pub struct BatchRunner {
    ctx: CaseContext,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(judge: Arc<dyn ModelProvider>, metrics: Vec<MetricDefinition>) -> Self {
        Self {
            ctx: CaseContext {
                judge,
                metrics: metrics.into(),
                chatbot: None,
                policy: ParseFailurePolicy::default(),
                cancel: CancellationToken::new(),
            },
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Produce missing actual outputs with this model-under-test.
    pub fn with_chatbot(mut self, chatbot: Arc<RagChatbot>) -> Self {
        self.ctx.chatbot = Some(chatbot);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_policy(mut self, policy: ParseFailurePolicy) -> Self {
        self.ctx.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.ctx.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run(&self, cases: Vec<CaseSpec>) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = cases.len();
        tracing::info!(%run_id, total, concurrency = self.concurrency, "starting batch");

        let names: Vec<String> = cases.iter().map(|c| c.name.clone()).collect();
        let mut slots: Vec<Option<CaseResult>> = vec![None; total];

        if let Err(e) = validate_metrics(&self.ctx.metrics) {
            tracing::error!("metric configuration invalid: {}", e);
            for (index, name) in names.iter().enumerate() {
                slots[index] = Some(CaseResult {
                    index,
                    name: name.clone(),
                    actual_output: None,
                    outcome: CaseOutcome::from_error(&e),
                    duration_ms: 0,
                });
            }
            return finish(run_id, started_at, slots, &names);
        }

        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (index, spec) in cases.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => None,
                permit = sem.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                slots[index] = Some(skipped(index, spec.name, None));
                continue;
            };

            let ctx = self.ctx.clone();
            join_set.spawn(async move {
                let _permit = permit;
                run_case(ctx, index, spec).await
            });
        }

        let mut done = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    done += 1;
                    tracing::info!(
                        case = %result.name,
                        outcome = result.outcome.label(),
                        done,
                        total,
                        "case finished"
                    );
                    let index = result.index;
                    slots[index] = Some(result);
                }
                Err(e) => tracing::error!("evaluation task failed: {}", e),
            }
        }

        finish(run_id, started_at, slots, &names)
    }
}

fn skipped(index: usize, name: String, actual_output: Option<String>) -> CaseResult {
    CaseResult {
        index,
        name,
        actual_output,
        outcome: CaseOutcome::Skipped,
        duration_ms: 0,
    }
}

fn finish(
    run_id: Uuid,
    started_at: DateTime<Utc>,
    slots: Vec<Option<CaseResult>>,
    names: &[String],
) -> BatchReport {
    let results: Vec<CaseResult> = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| CaseResult {
                index,
                name: names.get(index).cloned().unwrap_or_default(),
                actual_output: None,
                outcome: CaseOutcome::Error {
                    kind: ErrorKind::Infrastructure,
                    message: "evaluation task aborted".into(),
                },
                duration_ms: 0,
            })
        })
        .collect();

    BatchReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        summary: BatchSummary::from_results(&results),
        results,
    }
}

/// Evaluate a single case: model-under-test first (if needed), then judge.
async fn run_case(ctx: CaseContext, index: usize, spec: CaseSpec) -> CaseResult {
    let started = Instant::now();
    let elapsed = |started: Instant| started.elapsed().as_millis() as u64;

    if ctx.cancel.is_cancelled() {
        return skipped(index, spec.name, None);
    }

    let actual_output = if spec.has_actual_output() {
        spec.actual_output.clone().unwrap_or_default()
    } else {
        let Some(chatbot) = &ctx.chatbot else {
            let err = JudgeError::Config(format!(
                "case '{}' has no actual_output and no model under test is configured",
                spec.name
            ));
            return CaseResult {
                index,
                name: spec.name,
                actual_output: None,
                outcome: CaseOutcome::from_error(&err),
                duration_ms: elapsed(started),
            };
        };
        match chatbot.respond(&spec.input, &spec.retrieval_context).await {
            Ok(answer) => answer,
            Err(e) => {
                return CaseResult {
                    index,
                    name: spec.name,
                    actual_output: None,
                    outcome: CaseOutcome::from_error(&e),
                    duration_ms: elapsed(started),
                };
            }
        }
    };

    if ctx.cancel.is_cancelled() {
        return skipped(index, spec.name, Some(actual_output));
    }

    let outcome = match spec.to_case(&actual_output, &ctx.metrics) {
        Err(e) => CaseOutcome::from_error(&e),
        Ok(case) => match evaluate_case(ctx.judge.as_ref(), &case, &ctx.metrics, ctx.policy).await
        {
            Ok(evaluation) => {
                let evaluation = evaluation.with_case_name(spec.name.clone());
                match evaluation.report() {
                    Some(report) => CaseOutcome::Failed { report },
                    None => CaseOutcome::Passed {
                        verdicts: evaluation.verdicts,
                    },
                }
            }
            Err(e) => CaseOutcome::from_error(&e),
        },
    };

    CaseResult {
        index,
        name: spec.name,
        actual_output: Some(actual_output),
        outcome,
        duration_ms: elapsed(started),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::verdict::decide;

    fn result(outcome: CaseOutcome) -> CaseResult {
        CaseResult {
            index: 0,
            name: "c".into(),
            actual_output: None,
            outcome,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            result(CaseOutcome::Passed { verdicts: vec![] }),
            result(CaseOutcome::Failed {
                report: AssertionReport {
                    case: None,
                    failures: vec![decide("m", 0.1, 0.5, None)],
                    passed: vec![],
                },
            }),
            result(CaseOutcome::Error {
                kind: ErrorKind::Infrastructure,
                message: "x".into(),
            }),
            result(CaseOutcome::Error {
                kind: ErrorKind::Parsing,
                message: "y".into(),
            }),
            result(CaseOutcome::Skipped),
        ];
        let s = BatchSummary::from_results(&results);
        assert_eq!(s.total, 5);
        assert_eq!(s.passed, 1);
        assert_eq!(s.failed, 1);
        assert_eq!(s.infrastructure_errors, 1);
        assert_eq!(s.parsing_errors, 1);
        assert_eq!(s.skipped, 1);
        assert_eq!(s.errors(), 2);
    }

    fn report_with(summary: BatchSummary) -> BatchReport {
        BatchReport {
            run_id: Uuid::nil(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            summary,
            results: vec![],
        }
    }

    #[test]
    fn test_exit_codes() {
        let ok = report_with(BatchSummary {
            total: 2,
            passed: 2,
            ..Default::default()
        });
        assert_eq!(ok.exit_code(), 0);
        assert!(ok.all_passed());

        let quality = report_with(BatchSummary {
            total: 2,
            passed: 1,
            failed: 1,
            ..Default::default()
        });
        assert_eq!(quality.exit_code(), 1);

        let infra = report_with(BatchSummary {
            total: 2,
            failed: 1,
            infrastructure_errors: 1,
            ..Default::default()
        });
        assert_eq!(infra.exit_code(), 2);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(result(CaseOutcome::Error {
            kind: ErrorKind::Infrastructure,
            message: "timed out".into(),
        }))
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "infrastructure");
        assert_eq!(json["name"], "c");
    }

    #[test]
    fn test_concurrency_minimum_is_one() {
        let judge: Arc<dyn ModelProvider> =
            Arc::new(crate::provider::scripted::ScriptedProvider::constant("SCORE: 1"));
        let runner = BatchRunner::new(judge, vec![MetricDefinition::correctness()])
            .with_concurrency(0);
        assert_eq!(runner.concurrency(), 1);
    }
}
