// Shell supervisor: runs resolved commands through the user's shell
// reason: tokio::process for async pipes, nix for process-group signals
use async_trait::async_trait;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::decoder::Utf8ChunkDecoder;
use crate::shell::ShellConfig;
use snippet_run_core::application::constants::{
    OUTPUT_DRAIN_TIMEOUT, READ_CHUNK_SIZE, SIGNAL_EXIT_CODE_BASE, SPAWN_FAILURE_EXIT_CODE,
    SPAWN_NOT_FOUND_EXIT_CODE, SPAWN_PERMISSION_EXIT_CODE,
};
use snippet_run_core::domain::OutputStream;
use snippet_run_core::port::{ExitOutcome, OutputSink, ProcessSupervisor, StopToken, TimeProvider};

/// Shell supervisor
///
/// Each command runs in its own process group, so stopping it also reaches
/// whatever the shell started (pipelines, compilers, the compiled binary).
pub struct ShellSupervisor {
    time_provider: Arc<dyn TimeProvider>,
    shell: ShellConfig,
}

impl ShellSupervisor {
    /// Create a new shell supervisor
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for duration tracking
    /// * `shell` - Shell program and login flag
    ///
    /// # Example
    /// ```ignore
    /// let supervisor = ShellSupervisor::new(Arc::new(SystemTimeProvider), ShellConfig::default());
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>, shell: ShellConfig) -> Self {
        Self {
            time_provider,
            shell,
        }
    }

    fn spawn(&self, command: &str, working_dir: &Path) -> std::io::Result<Child> {
        let mut cmd = self.shell.command(command);
        cmd.current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn()
    }
}

#[async_trait]
impl ProcessSupervisor for ShellSupervisor {
    async fn supervise(
        &self,
        command: &str,
        working_dir: &Path,
        sink: OutputSink,
        mut stop: StopToken,
    ) -> ExitOutcome {
        let start_time = self.time_provider.now_millis();

        let mut child = match self.spawn(command, working_dir) {
            Ok(child) => child,
            Err(e) => {
                let code = spawn_failure_code(&e);
                warn!(
                    shell = %self.shell.resolve_program(),
                    error = %e,
                    exit_code = code,
                    "Failed to spawn process"
                );
                sink.emit(
                    OutputStream::Stderr,
                    format!(
                        "Error: failed to start '{}': {}\n",
                        self.shell.resolve_program(),
                        e
                    ),
                )
                .await;
                return ExitOutcome::exited(code);
            }
        };

        // The shell leads its own process group, so its pid is the group id
        let group = child.id();
        debug!(pid = ?group, "Process spawned");

        let mut pump = tokio::spawn(pump_output(
            Pipe::new(child.stdout.take(), OutputStream::Stdout),
            Pipe::new(child.stderr.take(), OutputStream::Stderr),
            sink,
        ));

        let mut stopped = false;
        let status = loop {
            let stop_requested = tokio::select! {
                status = child.wait() => break status,
                _ = stop.wait(), if !stopped => true,
            };
            if stop_requested {
                stopped = true;
                terminate(&mut child);
            }
        };

        let code = match status {
            Ok(status) => exit_code(status),
            Err(e) => {
                warn!(error = %e, "Failed to wait for process");
                SPAWN_FAILURE_EXIT_CODE
            }
        };

        // Descendants may keep the pipes open after the shell is gone
        match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut pump).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Output reader task failed"),
            Err(_) => {
                warn!(
                    timeout_ms = OUTPUT_DRAIN_TIMEOUT.as_millis() as u64,
                    "Output still open after exit, killing leftover processes"
                );
                // Once the channel is released nothing could stop them
                kill_leftovers(group);
                pump.abort();
                let _ = pump.await;
            }
        }

        debug!(
            exit_code = code,
            stopped,
            duration_ms = self.time_provider.elapsed_millis(start_time),
            "Process reaped"
        );

        ExitOutcome { code, stopped }
    }
}

/// One of the child's output pipes
struct Pipe<R> {
    reader: Option<R>,
    stream: OutputStream,
    decoder: Utf8ChunkDecoder,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> Pipe<R> {
    fn new(reader: Option<R>, stream: OutputStream) -> Self {
        Self {
            reader,
            stream,
            decoder: Utf8ChunkDecoder::new(),
            buf: vec![0; READ_CHUNK_SIZE],
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Read one chunk; closes the pipe on EOF or error
    async fn read(&mut self) -> String {
        let Some(reader) = self.reader.as_mut() else {
            return String::new();
        };
        match reader.read(&mut self.buf).await {
            Ok(0) => {
                self.reader = None;
                self.decoder.finish()
            }
            Ok(n) => self.decoder.decode(&self.buf[..n]),
            Err(e) => {
                warn!(stream = %self.stream, error = %e, "Read failed, closing pipe");
                self.reader = None;
                self.decoder.finish()
            }
        }
    }
}

/// Forward both pipes until they close
///
/// Single task, stdout polled first, so output written to stdout before
/// stderr is forwarded in that order.
async fn pump_output<O, E>(mut stdout: Pipe<O>, mut stderr: Pipe<E>, sink: OutputSink)
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut consumer_gone = false;
    while stdout.is_open() || stderr.is_open() {
        let (stream, text) = tokio::select! {
            biased;
            text = stdout.read(), if stdout.is_open() => (OutputStream::Stdout, text),
            text = stderr.read(), if stderr.is_open() => (OutputStream::Stderr, text),
            else => break,
        };
        if text.is_empty() || consumer_gone {
            // Keep reading so the child never blocks on a full pipe
            continue;
        }

        debug!(stream = %stream, bytes = text.len(), text = %text, "Output chunk");
        if !sink.emit(stream, text).await {
            debug!("Event consumer gone, discarding further output");
            consumer_gone = true;
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped
        return;
    };
    info!(pid, "Sending SIGTERM to process group");
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!(pid, error = %e, "killpg failed, killing shell only");
        if let Err(e) = child.start_kill() {
            warn!(pid, error = %e, "Kill failed");
        }
    }
}

/// Kill whatever is left in the group of an already reaped shell
#[cfg(unix)]
fn kill_leftovers(group: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = group else {
        return;
    };
    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) => info!(pgid, "Killed leftover process group"),
        Err(Errno::ESRCH) => debug!(pgid, "Process group already gone"),
        Err(e) => warn!(pgid, error = %e, "killpg failed"),
    }
}

#[cfg(windows)]
fn kill_leftovers(_group: Option<u32>) {}

#[cfg(windows)]
fn terminate(child: &mut Child) {
    info!(pid = ?child.id(), "Killing process");
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Kill failed");
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return SIGNAL_EXIT_CODE_BASE + signal;
        }
    }

    SPAWN_FAILURE_EXIT_CODE
}

fn spawn_failure_code(e: &std::io::Error) -> i32 {
    match e.kind() {
        std::io::ErrorKind::NotFound => SPAWN_NOT_FOUND_EXIT_CODE,
        std::io::ErrorKind::PermissionDenied => SPAWN_PERMISSION_EXIT_CODE,
        _ => SPAWN_FAILURE_EXIT_CODE,
    }
}
