// src/infra/paths.rs — Config file location
//
// LLM_JUDGE_HOME overrides everything. Otherwise the platform config dir is
// used (~/.config/llm-judge on Linux). A missing home directory is not an
// error; callers fall back to built-in defaults.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Returns the LLM_JUDGE_HOME override, if set.
fn judge_home() -> Option<PathBuf> {
    std::env::var_os("LLM_JUDGE_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Configuration directory: $LLM_JUDGE_HOME/ or the platform config dir.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(home) = judge_home() {
        return Some(home);
    }
    ProjectDirs::from("", "", "llm-judge").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Config file path
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
