//! Session file
//!
//! `<home>/agent.json` tells local clients where the agent listens and which
//! token to present. Written once the server is bound, removed at shutdown.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// WebSocket URL, e.g. `ws://127.0.0.1:53817`
    pub url: String,
    pub port: u16,
    pub token: String,
    pub pid: u32,
    pub version: String,
    pub started_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn new(addr: SocketAddr, token: impl Into<String>) -> Self {
        Self {
            url: format!("ws://{}", addr),
            port: addr.port(),
            token: token.into(),
            pid: std::process::id(),
            version: snippet_run_core::VERSION.to_string(),
            started_at: Utc::now(),
        }
    }
}

/// Session file owned by the running agent; removed on drop
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// Write `info` to `path`, readable by the current user only
    pub fn write(path: &Path, info: &SessionInfo) -> Result<Self> {
        let json = serde_json::to_vec_pretty(info)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(path)
            .with_context(|| format!("failed to write session file {}", path.display()))?;
        file.write_all(&json)?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove session file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_written_then_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.json");
        let info = SessionInfo::new("127.0.0.1:4567".parse().unwrap(), "tok");

        let session = SessionFile::write(&path, &info).unwrap();
        let read: SessionInfo =
            serde_json::from_slice(&std::fs::read(session.path()).unwrap()).unwrap();
        assert_eq!(read, info);
        assert_eq!(read.url, "ws://127.0.0.1:4567");

        drop(session);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.json");
        let _session = SessionFile::write(
            &path,
            &SessionInfo::new("127.0.0.1:1".parse().unwrap(), "tok"),
        )
        .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
