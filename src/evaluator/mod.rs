// src/evaluator/mod.rs — Evaluation metric engine
//
// Case + metric -> judge prompt -> raw text -> score -> verdict -> assertion.

pub mod assertion;
pub mod case;
pub mod chatbot;
pub mod judge;
pub mod metric;
pub mod parser;
pub mod runner;
pub mod suite;
pub mod verdict;

pub use assertion::{assert_test, evaluate_case, AssertionReport, CaseEvaluation};
pub use case::{CaseField, EvaluationCase};
pub use chatbot::{ChatbotParams, RagChatbot};
pub use metric::{JudgeParams, MetricDefinition};
pub use parser::{extract, Judgment, ParseFailure, ParseFailurePolicy};
pub use runner::{BatchReport, BatchRunner, CaseOutcome};
pub use suite::{CaseSpec, Suite};
pub use verdict::{decide, Verdict};
