// tests/evaluation_test.rs — Integration test: metric engine with scripted providers

use std::sync::Arc;
use std::time::Duration;

use llm_judge::evaluator::chatbot::{ChatbotParams, RagChatbot};
use llm_judge::evaluator::*;
use llm_judge::infra::errors::{ErrorKind, JudgeError};
use llm_judge::provider::retry::{RetryConfig, RetryProvider};
use llm_judge::provider::scripted::ScriptedProvider;
use llm_judge::provider::ModelProvider;

const QUERY: &str = "What if these shoes don't fit?";
const CONTEXT: &str = "All customers are eligible for a 30 day full refund at no extra costs.";
const EXPECTED: &str = "We offer a 30-day full refund at no extra costs.";

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        attempt_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn transport_error() -> JudgeError {
    JudgeError::Provider {
        provider: "scripted".into(),
        message: "connection reset by peer".into(),
        retriable: true,
    }
}

/// Ask the chatbot, then build the case from its answer.
async fn answered_case(answer: &str) -> EvaluationCase {
    let model_under_test = Arc::new(ScriptedProvider::constant(answer));
    let bot = RagChatbot::new(model_under_test, ChatbotParams::default());
    let actual = bot.respond(QUERY, &[CONTEXT.to_string()]).await.unwrap();

    EvaluationCase::builder(QUERY)
        .actual_output(actual)
        .expected_output(EXPECTED)
        .retrieval_context([CONTEXT])
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_correct_answer_passes() {
    let case = answered_case(EXPECTED).await;
    let judge = ScriptedProvider::constant("SCORE: 1.0\nREASON: Matches the reference exactly.");

    let verdicts = assert_test(&judge, &case, &[MetricDefinition::correctness()])
        .await
        .unwrap();

    assert_eq!(verdicts.len(), 1);
    assert!(verdicts[0].passed);
    assert_eq!(verdicts[0].score, 1.0);
    assert_eq!(verdicts[0].threshold, 0.5);
}

#[tokio::test]
async fn test_wrong_answer_fails_with_report() {
    let case = answered_case("I don't know").await;
    let judge =
        ScriptedProvider::constant("SCORE: 0.1\nREASON: The answer omits the refund policy.");

    let err = assert_test(&judge, &case, &[MetricDefinition::correctness()])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Quality);
    let report = err.report().expect("quality failure carries a report");
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.metric, "Correctness");
    assert!((failure.score - 0.1).abs() < 1e-6);
    assert_eq!(failure.threshold, 0.5);
    assert!(!failure.passed);

    let text = err.to_string();
    assert!(text.contains("Correctness"));
    assert!(text.contains("score: 0.1,"));
    assert!(text.contains("threshold: 0.5)"));
    assert!(text.contains("omits the refund policy"));
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let case = answered_case(EXPECTED).await;
    let inner = Arc::new(ScriptedProvider::from_results(vec![
        Err(transport_error()),
        Err(transport_error()),
        Ok("SCORE: 0.9".to_string()),
    ]));
    let judge = RetryProvider::with_config(inner.clone(), fast_retry(3));

    let verdict = MetricDefinition::correctness()
        .evaluate(&judge, &case)
        .await
        .unwrap();

    assert!(verdict.passed);
    assert!((verdict.score - 0.9).abs() < 1e-6);
    assert_eq!(inner.calls(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_are_infrastructure_errors() {
    let case = answered_case(EXPECTED).await;
    let inner = Arc::new(ScriptedProvider::from_results(vec![
        Err(transport_error()),
        Err(transport_error()),
        Err(transport_error()),
    ]));
    let judge = RetryProvider::with_config(inner, fast_retry(3));

    let err = assert_test(&judge, &case, &[MetricDefinition::correctness()])
        .await
        .unwrap_err();

    assert!(matches!(err, JudgeError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert!(err.report().is_none());
}

#[tokio::test]
async fn test_missing_expected_output_fails_before_any_call() {
    let case = EvaluationCase::builder(QUERY)
        .actual_output("We offer refunds.")
        .retrieval_context([CONTEXT])
        .build()
        .unwrap();
    let judge = ScriptedProvider::constant("SCORE: 1.0");

    let err = assert_test(&judge, &case, &[MetricDefinition::correctness()])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        JudgeError::MissingField {
            field: CaseField::ExpectedOutput,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(judge.calls(), 0);
}

#[tokio::test]
async fn test_second_metric_misconfigured_means_no_calls_at_all() {
    let case = answered_case(EXPECTED).await;
    let judge = ScriptedProvider::constant("SCORE: 1.0");
    let metrics = vec![
        MetricDefinition::correctness(),
        MetricDefinition::new(
            "Strict",
            "Exact match only.",
            vec![CaseField::ActualOutput],
            1.5,
        ),
    ];

    let err = assert_test(&judge, &case, &metrics).await.unwrap_err();
    assert!(matches!(err, JudgeError::InvalidThreshold { .. }));
    assert_eq!(judge.calls(), 0);
}

#[tokio::test]
async fn test_malformed_judge_output_is_parse_error() {
    let case = answered_case(EXPECTED).await;
    let judge = ScriptedProvider::constant("Great question!");

    let err = assert_test(&judge, &case, &[MetricDefinition::correctness()])
        .await
        .unwrap_err();

    match &err {
        JudgeError::ScoreParsing {
            metric,
            failure,
            raw,
        } => {
            assert_eq!(metric, "Correctness");
            assert_eq!(*failure, ParseFailure::NoScore);
            assert_eq!(raw, "Great question!");
        }
        other => panic!("expected ScoreParsing, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Parsing);
}

#[tokio::test]
async fn test_fail_closed_policy_never_passes() {
    let case = answered_case(EXPECTED).await;
    let judge = ScriptedProvider::constant("Great question!");

    let verdict = MetricDefinition::correctness()
        .evaluate_with_policy(&judge, &case, ParseFailurePolicy::FailClosed)
        .await
        .unwrap();
    assert!(!verdict.passed);
    assert_eq!(verdict.score, 0.0);
    assert!(verdict
        .rationale
        .as_deref()
        .unwrap_or_default()
        .starts_with("unparseable judge response:"));
}

#[tokio::test]
async fn test_out_of_range_score_is_rejected() {
    let case = answered_case(EXPECTED).await;
    let judge = ScriptedProvider::constant("SCORE: 1.2");

    let err = MetricDefinition::correctness()
        .evaluate(&judge, &case)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        JudgeError::ScoreParsing {
            failure: ParseFailure::OutOfRange { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_repeated_evaluation_is_deterministic() {
    let case = answered_case(EXPECTED).await;
    let judge = ScriptedProvider::constant("SCORE: 0.65\nREASON: Mostly right.");
    let metric = MetricDefinition::correctness();

    let first = metric.evaluate(&judge, &case).await.unwrap();
    for _ in 0..5 {
        assert_eq!(metric.evaluate(&judge, &case).await.unwrap(), first);
    }

    let requests = judge.requests();
    assert_eq!(requests.len(), 6);
    assert!(requests.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_metrics_evaluated_in_order_and_all_reported() {
    let case = answered_case(EXPECTED).await;
    let judge = ScriptedProvider::new(vec![
        "SCORE: 0.9\nREASON: correct",
        "SCORE: 0.2\nREASON: cites nothing",
    ]);
    let metrics = vec![
        MetricDefinition::correctness(),
        MetricDefinition::new(
            "Faithfulness",
            "Is every claim in the actual output supported by the retrieval context?",
            vec![CaseField::ActualOutput, CaseField::RetrievalContext],
            0.6,
        ),
    ];

    let evaluation = evaluate_case(&judge, &case, &metrics, ParseFailurePolicy::Error)
        .await
        .unwrap();
    assert!(!evaluation.passed());
    let report = evaluation.report().unwrap();
    assert_eq!(report.failed_metrics().collect::<Vec<_>>(), vec!["Faithfulness"]);
    assert_eq!(report.passed[0].metric, "Correctness");

    let second_prompt = &judge.requests()[1].messages[1].content;
    assert!(second_prompt.contains("## Retrieval Context\n[1] All customers are eligible"));
}

#[tokio::test]
async fn test_judge_handle_is_shared_across_cases() {
    let judge: Arc<dyn ModelProvider> = Arc::new(ScriptedProvider::constant("SCORE: 0.8"));
    let metric = Arc::new(MetricDefinition::correctness());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let judge = judge.clone();
        let metric = metric.clone();
        handles.push(tokio::spawn(async move {
            let case = EvaluationCase::builder(QUERY)
                .actual_output(EXPECTED)
                .expected_output(EXPECTED)
                .build()
                .unwrap();
            metric.evaluate(judge.as_ref(), &case).await
        }));
    }
    for h in handles {
        assert!(h.await.unwrap().unwrap().passed);
    }
}
