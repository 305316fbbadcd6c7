//! Agent configuration
//!
//! Layered with the `config` crate: built-in defaults, then
//! `<home>/agent.toml` (optional), then `SNIPPET_RUN_*` environment
//! variables (nested keys use `__`, e.g. `SNIPPET_RUN_SHELL__PROGRAM`).

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use snippet_run_core::port::WorkspaceLayout;
use snippet_run_infra_system::ShellConfig;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "SNIPPET_RUN";
pub const HOME_ENV: &str = "SNIPPET_RUN_HOME";
const DEFAULT_HOME: &str = "~/.snippet-run";
const DEFAULT_HOST: &str = "127.0.0.1";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub layout: WorkspaceLayout,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub host: String,
    /// 0 picks a free port
    pub port: u16,
    /// Session token; a random one is generated when unset
    pub token: Option<String>,
    /// Browser origin allowed to connect (`*` for any). Unset refuses every
    /// request that carries an `Origin` header.
    pub allowed_origin: Option<String>,
    /// Debug logging (matched rules, every output chunk)
    pub verbose: bool,
    /// Also write logs to `<home>/logs/agent.log`
    pub log_to_file: bool,
    pub log_format: LogFormat,
    pub shell: ShellConfig,
    pub workspace: WorkspaceConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            token: None,
            allowed_origin: None,
            verbose: false,
            log_to_file: false,
            log_format: LogFormat::default(),
            shell: ShellConfig::default(),
            workspace: WorkspaceConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load from `paths.config_file` and the process environment
    pub fn load(paths: &AgentPaths) -> Result<Self> {
        Self::from_sources(paths, Some(environment()))
    }

    /// Load from `paths.config_file` and an explicit environment source
    pub fn from_sources(paths: &AgentPaths, env: Option<Environment>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            File::from(paths.config_file.clone())
                .format(FileFormat::Toml)
                .required(false),
        );
        if let Some(env) = env {
            builder = builder.add_source(env);
        }

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| format!("invalid configuration ({})", paths.config_file.display()))
    }
}

/// `SNIPPET_RUN_*` environment source
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Files and directories owned by the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPaths {
    pub home: PathBuf,
    /// Working directory for materialized snippets (emptied at startup)
    pub run_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub log_file: PathBuf,
    /// User rules, evaluated before the built-in ones
    pub rules_file: PathBuf,
    /// Optional agent settings
    pub config_file: PathBuf,
    /// Connection details for local clients, present while the agent runs
    pub session_file: PathBuf,
}

impl AgentPaths {
    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let logs_dir = home.join("logs");
        Self {
            run_dir: home.join("run"),
            log_file: logs_dir.join("agent.log"),
            logs_dir,
            rules_file: home.join("rules.toml"),
            config_file: home.join("agent.toml"),
            session_file: home.join("agent.json"),
            home,
        }
    }

    /// `$SNIPPET_RUN_HOME`, else `~/.snippet-run`
    pub fn resolve() -> Self {
        let home = std::env::var(HOME_ENV)
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOME.to_string());
        Self::from_home(expand(&home))
    }

    pub fn create_dirs(&self) -> Result<()> {
        for dir in [&self.home, &self.run_dir, &self.logs_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

fn expand(path: &str) -> PathBuf {
    Path::new(shellexpand::tilde(path).as_ref()).to_path_buf()
}
