// src/cli/check.rs — Offline validation of config, metrics and suite

use std::path::Path;

use crate::evaluator::suite::Suite;
use crate::infra::config::Config;

/// Validate everything a run would need, without credentials or network.
pub fn run_check(config: &Config, suite_path: &Path) -> anyhow::Result<()> {
    let metrics = config.metric_definitions()?;
    let suite = Suite::load(suite_path)?;
    suite.validate(&metrics)?;

    let generated = suite.cases.iter().filter(|c| !c.has_actual_output()).count();
    println!(
        "ok: {} case(s), {} metric(s); {} case(s) will be answered by {}",
        suite.cases.len(),
        metrics.len(),
        generated,
        config.chatbot.model
    );
    for m in &metrics {
        let fields: Vec<&str> = m.fields().iter().map(|f| f.label()).collect();
        println!(
            "  {} (threshold {:.2}, judge {}): {}",
            m.name(),
            m.threshold(),
            m.params().model,
            fields.join(", ")
        );
    }
    Ok(())
}
