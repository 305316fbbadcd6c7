// Process Supervisor Port
// Spawns a resolved command, streams its output and reports how it ended

use crate::domain::{OutputStream, RunEvent};
use crate::port::stop::StopToken;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

/// How a supervised process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code reported to the client (`128 + signal` when killed by a signal)
    pub code: i32,
    /// A stop signal was delivered while the process was running
    pub stopped: bool,
}

impl ExitOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            code,
            stopped: false,
        }
    }
}

/// Output side of an invocation's event queue
///
/// Only output events can be pushed through a sink. The single exit event is
/// sent by the dispatcher once the supervisor has returned, so it always
/// comes last.
#[derive(Clone, Debug)]
pub struct OutputSink {
    tx: mpsc::Sender<RunEvent>,
}

impl OutputSink {
    pub fn new(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx }
    }

    /// Forward one chunk. Returns false once the consumer is gone.
    pub async fn emit(&self, stream: OutputStream, data: impl Into<String>) -> bool {
        self.tx.send(RunEvent::output(stream, data)).await.is_ok()
    }
}

/// Process Supervisor trait
///
/// Implementations:
/// - ShellSupervisor: runs the command through the user's shell
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Run `command` to completion, forwarding output chunks through `sink`
    ///
    /// Never fails: a command that cannot be spawned is reported through
    /// `sink` and a non-zero exit code, exactly like a command that fails.
    /// Returns only after every output chunk has been forwarded.
    async fn supervise(
        &self,
        command: &str,
        working_dir: &Path,
        sink: OutputSink,
        stop: StopToken,
    ) -> ExitOutcome;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Exit code the scripted supervisor reports when stopped (128 + SIGTERM)
    pub const STOPPED_EXIT_CODE: i32 = 143;

    /// Supervisor replaying scripted output
    pub struct ScriptedSupervisor {
        chunks: Vec<(OutputStream, String)>,
        code: i32,
        run_until_stopped: bool,
        calls: Mutex<Vec<(String, PathBuf)>>,
    }

    impl ScriptedSupervisor {
        pub fn new(chunks: Vec<(OutputStream, &str)>, code: i32) -> Self {
            Self {
                chunks: chunks
                    .into_iter()
                    .map(|(stream, data)| (stream, data.to_string()))
                    .collect(),
                code,
                run_until_stopped: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Emit the scripted chunks, then keep "running" until stopped
        pub fn long_running(chunks: Vec<(OutputStream, &str)>) -> Self {
            Self {
                run_until_stopped: true,
                ..Self::new(chunks, 0)
            }
        }

        /// Commands (and working directories) this supervisor was asked to run
        pub fn calls(&self) -> Vec<(String, PathBuf)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessSupervisor for ScriptedSupervisor {
        async fn supervise(
            &self,
            command: &str,
            working_dir: &Path,
            sink: OutputSink,
            mut stop: StopToken,
        ) -> ExitOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((command.to_string(), working_dir.to_path_buf()));

            for (stream, data) in &self.chunks {
                sink.emit(*stream, data.clone()).await;
            }

            if self.run_until_stopped {
                stop.wait().await;
                return ExitOutcome {
                    code: STOPPED_EXIT_CODE,
                    stopped: true,
                };
            }
            ExitOutcome::exited(self.code)
        }
    }
}
