// Snippet Workspace Port
// Where snippets are materialized before a command runs against them

use crate::domain::Snippet;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How working files are laid out inside the run directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceLayout {
    /// `<run_dir>/<filename>`: stable path, concurrent runs of the same filename overwrite
    #[default]
    Shared,
    /// `<run_dir>/<channel>/<filename>`: one directory per invocation
    PerChannel,
}

/// Materializes snippet content to a real file so shell tooling can use it
///
/// Blocking: callers run it off the async executor.
pub trait SnippetWorkspace: Send + Sync {
    /// Run directory handed to generators as `run_dir`
    fn run_dir(&self) -> &Path;

    /// Write the snippet content (overwrite, never append) and return its path
    ///
    /// # Errors
    /// - AppError::Materialization if the file cannot be written
    fn materialize(&self, snippet: &Snippet) -> Result<PathBuf>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory workspace recording every write
    pub struct InMemoryWorkspace {
        run_dir: PathBuf,
        files: Mutex<HashMap<PathBuf, String>>,
        writes: Mutex<usize>,
        fail_with: Option<String>,
    }

    impl InMemoryWorkspace {
        pub fn new(run_dir: impl Into<PathBuf>) -> Self {
            Self {
                run_dir: run_dir.into(),
                files: Mutex::new(HashMap::new()),
                writes: Mutex::new(0),
                fail_with: None,
            }
        }

        /// Workspace whose writes always fail (disk full, permissions...)
        pub fn failing(run_dir: impl Into<PathBuf>, message: impl Into<String>) -> Self {
            Self {
                fail_with: Some(message.into()),
                ..Self::new(run_dir)
            }
        }

        pub fn content_of(&self, path: &Path) -> Option<String> {
            self.files.lock().unwrap().get(path).cloned()
        }

        pub fn write_count(&self) -> usize {
            *self.writes.lock().unwrap()
        }
    }

    impl SnippetWorkspace for InMemoryWorkspace {
        fn run_dir(&self) -> &Path {
            &self.run_dir
        }

        fn materialize(&self, snippet: &Snippet) -> Result<PathBuf> {
            if let Some(message) = &self.fail_with {
                return Err(AppError::Materialization(message.clone()));
            }
            let path = self.run_dir.join(snippet.filename());
            self.files
                .lock()
                .unwrap()
                .insert(path.clone(), snippet.content().to_string());
            *self.writes.lock().unwrap() += 1;
            Ok(path)
        }
    }
}
