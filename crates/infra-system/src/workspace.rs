// Filesystem workspace: snippets become real files under the run directory

use snippet_run_core::domain::Snippet;
use snippet_run_core::error::{AppError, Result};
use snippet_run_core::port::{SnippetWorkspace, WorkspaceLayout};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct FsWorkspace {
    run_dir: PathBuf,
    layout: WorkspaceLayout,
}

impl FsWorkspace {
    pub fn new(run_dir: impl Into<PathBuf>, layout: WorkspaceLayout) -> Self {
        Self {
            run_dir: run_dir.into(),
            layout,
        }
    }

    /// Where `snippet` lands for the configured layout
    pub fn path_for(&self, snippet: &Snippet) -> PathBuf {
        match self.layout {
            WorkspaceLayout::Shared => self.run_dir.join(snippet.filename()),
            WorkspaceLayout::PerChannel => self
                .run_dir
                .join(channel_dir(&snippet.channel))
                .join(snippet.filename()),
        }
    }

    /// Remove everything left in the run directory by a previous agent
    ///
    /// Creates the directory if missing.
    pub fn clear(&self) -> Result<()> {
        if self.run_dir.exists() {
            for entry in std::fs::read_dir(&self.run_dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    std::fs::remove_dir_all(&path)?;
                } else {
                    std::fs::remove_file(&path)?;
                }
            }
        }
        std::fs::create_dir_all(&self.run_dir)?;
        Ok(())
    }
}

impl SnippetWorkspace for FsWorkspace {
    fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    fn materialize(&self, snippet: &Snippet) -> Result<PathBuf> {
        let path = self.path_for(snippet);
        let map_err = |e: std::io::Error| {
            AppError::Materialization(format!("failed to write {}: {}", path.display(), e))
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(map_err)?;
        }
        // fs::write truncates, so a shorter snippet leaves no residue
        std::fs::write(&path, snippet.content()).map_err(map_err)?;

        debug!(path = %path.display(), bytes = snippet.content().len(), "Materialized snippet");
        Ok(path)
    }
}

/// Directory name for a channel
///
/// `[A-Za-z0-9_-]` is kept, every other byte becomes `%XX`, so distinct
/// channels never share a directory.
fn channel_dir(channel: &str) -> String {
    let mut dir = String::with_capacity(channel.len());
    for byte in channel.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            dir.push(char::from(byte));
        } else {
            dir.push_str(&format!("%{:02X}", byte));
        }
    }
    dir
}
