// src/main.rs — llm-judge entry point

use std::path::Path;

use clap::Parser;

use llm_judge::cli::run::RunOptions;
use llm_judge::cli::{Cli, Commands};
use llm_judge::infra::config::Config;
use llm_judge::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Respects RUST_LOG; --verbose raises the default
    logger::init_logging(if cli.verbose { "debug" } else { "warn" });

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = match cli.config {
        Some(ref path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Check { suite } => {
            llm_judge::cli::check::run_check(&config, Path::new(&suite))?;
            Ok(0)
        }
        Commands::Run {
            suite,
            concurrency,
            report,
            fail_closed,
        } => {
            llm_judge::cli::run::run_suite(
                &config,
                RunOptions {
                    suite: Path::new(&suite),
                    concurrency,
                    report: report.as_deref().map(Path::new),
                    fail_closed,
                },
            )
            .await
        }
    }
}
