// Snippet Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Channel identifier (correlates a request, its events and its stop signal)
pub type Channel = String;

/// Maximum accepted channel identifier length
const MAX_CHANNEL_LEN: usize = 256;

/// File attributes of a snippet that are needed for execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetFile {
    pub filename: String,
    #[serde(default)]
    pub filetype: String,
    pub content: String,
}

/// Snippet submitted for execution
///
/// Immutable once received. The channel identifies the in-flight invocation
/// its events and stop signals belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub channel: Channel,
    pub file: SnippetFile,
}

impl Snippet {
    pub fn new(
        channel: impl Into<Channel>,
        filename: impl Into<String>,
        filetype: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            file: SnippetFile {
                filename: filename.into(),
                filetype: filetype.into(),
                content: content.into(),
            },
        }
    }

    pub fn filename(&self) -> &str {
        &self.file.filename
    }

    pub fn filetype(&self) -> &str {
        &self.file.filetype
    }

    pub fn content(&self) -> &str {
        &self.file.content
    }

    /// Validate the parts of a snippet that end up on the filesystem
    ///
    /// The filename must be a single path component: it is joined onto the
    /// working directory, so separators and `.`/`..` are refused.
    pub fn validate(&self) -> Result<()> {
        if self.channel.trim().is_empty() {
            return Err(DomainError::InvalidSnippet(
                "channel cannot be empty".to_string(),
            ));
        }
        if self.channel.len() > MAX_CHANNEL_LEN {
            return Err(DomainError::InvalidSnippet(format!(
                "channel too long (max {} characters)",
                MAX_CHANNEL_LEN
            )));
        }

        let filename = self.filename();
        if filename.trim().is_empty() {
            return Err(DomainError::InvalidSnippet(
                "filename cannot be empty".to_string(),
            ));
        }
        if filename == "." || filename == ".." {
            return Err(DomainError::InvalidSnippet(format!(
                "filename '{}' is not a file name",
                filename
            )));
        }
        if filename.contains(['/', '\\', '\0']) {
            return Err(DomainError::InvalidSnippet(format!(
                "filename '{}' must not contain path separators",
                filename
            )));
        }
        Ok(())
    }
}
