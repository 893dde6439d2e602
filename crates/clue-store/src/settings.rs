//! Data directory layout and `config.toml` loading.

use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use clue_core::AnalysisConfig;

use crate::error::{Result, StoreError};

pub const DB_FILE: &str = "clue.db";
pub const CONFIG_FILE: &str = "config.toml";
pub const PID_FILE: &str = "clue-serve.pid";

/// `$CLUE_DATA_DIR`, else `~/.clue-lab`.
pub fn default_base_dir() -> PathBuf {
    env::var("CLUE_DATA_DIR")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| dirs_home().join(".clue-lab"))
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Read tuning overrides from `<dir>/config.toml`. A missing file yields the
/// defaults; a present but invalid one is an error.
pub fn load_config(dir: &Path) -> Result<AnalysisConfig> {
    let path = dir.join(CONFIG_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(AnalysisConfig::default()),
        Err(e) => return Err(StoreError::Io(e)),
    };
    let config = parse_config(&content)
        .map_err(|e| StoreError::InvalidData(format!("{}: {e}", path.display())))?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}

fn parse_config(content: &str) -> std::result::Result<AnalysisConfig, String> {
    let config: AnalysisConfig = toml::from_str(content).map_err(|e| e.to_string())?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}
