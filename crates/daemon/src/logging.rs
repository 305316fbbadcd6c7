//! Tracing setup
//!
//! `RUST_LOG` wins when set; otherwise `snippet_run=info` (or `debug` when
//! verbose). With `log_to_file`, output is mirrored to `<home>/logs/agent.log`.

use crate::config::{AgentConfig, AgentPaths, LogFormat};
use anyhow::{anyhow, Result};
use std::ffi::OsStr;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the background log writer alive; drop it last
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn env_filter(verbose: bool) -> EnvFilter {
    if std::env::var_os("RUST_LOG").is_some() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
    }
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::new(format!("snippet_run={level}"))
}

pub fn init(config: &AgentConfig, paths: &AgentPaths) -> Result<LoggingGuard> {
    let (writer, file_guard) = if config.log_to_file {
        let (file_writer, guard) = file_writer(&paths.log_file);
        (
            BoxMakeWriter::new(std::io::stdout.and(file_writer)),
            Some(guard),
        )
    } else {
        (BoxMakeWriter::new(std::io::stdout), None)
    };
    let ansi = file_guard.is_none();
    let filter = env_filter(config.verbose);

    let result = match config.log_format {
        LogFormat::Json => fmt::Subscriber::builder()
            .with_writer(writer)
            .with_env_filter(filter)
            .with_ansi(false)
            .json()
            .finish()
            .try_init(),
        LogFormat::Pretty => fmt::Subscriber::builder()
            .with_writer(writer)
            .with_env_filter(filter)
            .with_ansi(ansi)
            .pretty()
            .finish()
            .try_init(),
    };
    result.map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn file_writer(path: &Path) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_else(|| OsStr::new("agent.log"));
    tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
}
