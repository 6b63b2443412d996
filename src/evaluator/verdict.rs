// src/evaluator/verdict.rs — Threshold decision

use serde::{Deserialize, Serialize};

/// Score plus pass/fail decision for one metric on one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub metric: String,
    pub score: f32,
    pub threshold: f32,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Decide pass/fail. The boundary is inclusive: `score == threshold` passes.
pub fn decide(
    metric: impl Into<String>,
    score: f32,
    threshold: f32,
    rationale: Option<String>,
) -> Verdict {
    Verdict {
        metric: metric.into(),
        score,
        threshold,
        passed: score >= threshold,
        rationale,
    }
}
