// src/cli/run.rs — Evaluate a suite and report

use std::path::Path;
use std::sync::Arc;

use crate::evaluator::chatbot::RagChatbot;
use crate::evaluator::parser::ParseFailurePolicy;
use crate::evaluator::runner::{BatchReport, BatchRunner, CaseOutcome};
use crate::evaluator::suite::Suite;
use crate::infra::config::Config;
use crate::provider::resolver;

pub struct RunOptions<'a> {
    pub suite: &'a Path,
    pub concurrency: Option<usize>,
    pub report: Option<&'a Path>,
    pub fail_closed: bool,
}

/// Run the suite and return the process exit code.
pub async fn run_suite(config: &Config, opts: RunOptions<'_>) -> anyhow::Result<i32> {
    // Configuration problems surface here, before any request.
    let metrics = config.metric_definitions()?;
    let suite = Suite::load(opts.suite)?;
    let provider = resolver::build_provider(&config.provider, config.retry_config())?;

    let policy = if opts.fail_closed {
        ParseFailurePolicy::FailClosed
    } else {
        config.runner.on_parse_failure
    };

    let mut runner = BatchRunner::new(provider.clone(), metrics)
        .with_concurrency(opts.concurrency.unwrap_or(config.runner.concurrency))
        .with_policy(policy);
    if suite.cases.iter().any(|c| !c.has_actual_output()) {
        runner = runner.with_chatbot(Arc::new(RagChatbot::new(
            provider,
            config.chatbot.clone(),
        )));
    }

    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight cases");
            cancel.cancel();
        }
    });

    let report = runner.run(suite.cases).await;
    print_report(&report);

    if let Some(path) = opts.report {
        std::fs::write(path, report.to_json_pretty()?)?;
        println!("report written to {}", path.display());
    }

    Ok(report.exit_code())
}

fn print_report(report: &BatchReport) {
    for result in &report.results {
        println!(
            "[{}] {} ({} ms)",
            result.outcome.label(),
            result.name,
            result.duration_ms
        );
        match &result.outcome {
            CaseOutcome::Passed { verdicts } => {
                for v in verdicts {
                    println!(
                        "    {}: {} >= {}",
                        v.metric, v.score, v.threshold
                    );
                }
            }
            CaseOutcome::Failed { report } => {
                for line in report.to_string().lines().skip(1) {
                    println!("  {line}");
                }
            }
            CaseOutcome::Error { kind, message } => println!("    {kind}: {message}"),
            CaseOutcome::Skipped => println!("    cancelled before evaluation"),
        }
    }

    let s = &report.summary;
    println!();
    println!(
        "{} passed, {} failed, {} infrastructure error(s), {} parsing error(s), {} configuration error(s), {} skipped",
        s.passed,
        s.failed,
        s.infrastructure_errors,
        s.parsing_errors,
        s.configuration_errors,
        s.skipped
    );
}
