// src/cli/mod.rs — CLI definition (clap derive)

pub mod check;
pub mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "llm-judge", about = "LLM-as-judge evaluation harness", version)]
pub struct Cli {
    /// Config file path (defaults to $LLM_JUDGE_HOME/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate every case in a suite file
    Run {
        /// Suite file (TOML with [[cases]])
        suite: String,
        /// Max cases evaluated at once (overrides [runner] concurrency)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// Write the JSON report here
        #[arg(long)]
        report: Option<String>,
        /// Score unparseable judge responses as 0 instead of erroring
        #[arg(long)]
        fail_closed: bool,
    },
    /// Validate config, metrics and suite without calling any model
    Check {
        /// Suite file (TOML with [[cases]])
        suite: String,
    },
}
