//! Session file written by a running agent (`<home>/agent.json`)

use crate::error::{Result, SdkError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const HOME_ENV: &str = "SNIPPET_RUN_HOME";
const DEFAULT_HOME: &str = "~/.snippet-run";
const SESSION_FILE: &str = "agent.json";

/// Where and how to reach the local agent
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub url: String,
    pub port: u16,
    pub token: String,
    pub pid: u32,
    pub version: String,
}

impl SessionInfo {
    /// Session file of the default agent home (`$SNIPPET_RUN_HOME` or `~/.snippet-run`)
    pub fn default_path() -> PathBuf {
        let home = std::env::var(HOME_ENV)
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOME.to_string());
        PathBuf::from(shellexpand::tilde(&home).as_ref()).join(SESSION_FILE)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SdkError::Session(format!(
                "cannot read {} (is the agent running?): {}",
                path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
