// src/lib.rs — Library root for llm-judge

pub mod cli;
pub mod evaluator;
pub mod infra;
pub mod provider;
