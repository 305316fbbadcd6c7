// Dispatcher - runs one invocation per snippet, from rule resolution to exit

mod registry;

pub use registry::{InvocationRegistry, Registration};

use crate::application::constants::EVENT_BUFFER_SIZE;
use crate::application::resolver::{CommandResolver, Resolution};
use crate::domain::{Channel, InvocationLifecycle, InvocationState, RuleSet, RunEvent, Snippet};
use crate::error::{AppError, Result};
use crate::port::{OutputSink, ProcessSupervisor, SnippetWorkspace, StopToken, TimeProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// Ordered events of one invocation; the last one is always `RunEvent::Exit`
#[derive(Debug)]
pub struct EventStream {
    channel: Channel,
    rx: mpsc::Receiver<RunEvent>,
}

impl EventStream {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next event, None once the exit event has been delivered
    pub async fn recv(&mut self) -> Option<RunEvent> {
        self.rx.recv().await
    }

    /// Collect every remaining event
    pub async fn collect(mut self) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

/// Dispatcher (one per agent)
///
/// Invocations are independent: no queue, no admission control, no limit on
/// how many run at once.
pub struct Dispatcher {
    resolver: Arc<CommandResolver>,
    supervisor: Arc<dyn ProcessSupervisor>,
    registry: Arc<InvocationRegistry>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Dispatcher {
    /// Create a dispatcher
    ///
    /// # Arguments
    /// * `rules` - Rule set loaded once at startup (never reloaded)
    /// * `workspace` - Where snippets are materialized
    /// * `supervisor` - Runs resolved commands
    /// * `time_provider` - Clock for duration tracking
    /// * `user_config_path` - Rule file named in the "no rule matched" message
    pub fn new(
        rules: Arc<RuleSet>,
        workspace: Arc<dyn SnippetWorkspace>,
        supervisor: Arc<dyn ProcessSupervisor>,
        time_provider: Arc<dyn TimeProvider>,
        user_config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver: Arc::new(CommandResolver::new(rules, workspace, user_config_path)),
            supervisor,
            registry: InvocationRegistry::new(),
            time_provider,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        self.resolver.rules()
    }

    /// Number of invocations currently in flight
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    /// Start an invocation for `snippet`
    ///
    /// Resolution (rule selection, working file, generator) completes before
    /// this returns; the process then runs on its own task and reports through
    /// the returned stream.
    ///
    /// # Errors
    /// - AppError::Domain if the snippet is invalid
    /// - AppError::Conflict if the channel already has an invocation in flight
    /// - AppError::Materialization / AppError::Generator if resolution fails
    pub async fn dispatch(&self, snippet: Snippet) -> Result<EventStream> {
        snippet.validate()?;

        let channel = snippet.channel.clone();
        let span = info_span!("invocation", channel = %channel, filename = %snippet.filename());
        let mut lifecycle = InvocationLifecycle::default();

        let (registration, stop) = self.registry.register(&channel)?;
        advance(&mut lifecycle, InvocationState::Resolving, &span)?;

        let resolution = match self.resolve(snippet, span.clone()).await {
            Ok(resolution) => resolution,
            Err(e) => {
                advance(&mut lifecycle, InvocationState::Done, &span)?;
                warn!(parent: &span, error = %e, "Dispatch failed");
                return Err(e);
            }
        };

        if resolution.is_fallback() {
            advance(&mut lifecycle, InvocationState::NoMatch, &span)?;
        } else {
            advance(&mut lifecycle, InvocationState::Matched, &span)?;
            advance(&mut lifecycle, InvocationState::Materialized, &span)?;
        }

        let working_dir = resolution
            .context
            .as_ref()
            .map(|ctx| ctx.run_dir.clone())
            .unwrap_or_else(|| self.resolver.run_dir().to_path_buf());

        let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let invocation = Invocation {
            lifecycle,
            resolution,
            working_dir,
            registration,
            stop,
            tx,
            supervisor: Arc::clone(&self.supervisor),
            time_provider: Arc::clone(&self.time_provider),
        };
        tokio::spawn(invocation.run().instrument(span));

        Ok(EventStream { channel, rx })
    }

    /// Signal the invocation on `channel` to stop
    ///
    /// Returns false (no-op) when nothing is running on that channel.
    pub fn stop(&self, channel: &str) -> bool {
        let stopped = self.registry.stop(channel);
        if stopped {
            info!(channel = %channel, "Stop requested");
        } else {
            debug!(channel = %channel, "Stop ignored: no running invocation");
        }
        stopped
    }

    /// Resolve on the blocking pool (generators and file writes block)
    async fn resolve(&self, snippet: Snippet, span: Span) -> Result<Resolution> {
        let resolver = Arc::clone(&self.resolver);
        tokio::task::spawn_blocking(move || span.in_scope(|| resolver.resolve(&snippet)))
            .await
            .map_err(|e| AppError::Internal(format!("resolver task failed: {}", e)))?
    }
}

/// One running invocation, owned by its task
struct Invocation {
    lifecycle: InvocationLifecycle,
    resolution: Resolution,
    working_dir: PathBuf,
    registration: Registration,
    stop: StopToken,
    tx: mpsc::Sender<RunEvent>,
    supervisor: Arc<dyn ProcessSupervisor>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Invocation {
    async fn run(self) {
        let Invocation {
            mut lifecycle,
            resolution,
            working_dir,
            registration,
            stop,
            tx,
            supervisor,
            time_provider,
        } = self;

        let started_at = time_provider.now_millis();
        let spawned = if resolution.is_fallback() {
            InvocationState::FallbackSpawned
        } else {
            InvocationState::Spawned
        };
        transition(&mut lifecycle, spawned);
        transition(&mut lifecycle, InvocationState::Running);

        info!(
            rule = resolution.rule.as_deref().unwrap_or("<none>"),
            command = %resolution.command,
            working_dir = %working_dir.display(),
            "Starting process"
        );

        let outcome = supervisor
            .supervise(
                &resolution.command,
                &working_dir,
                OutputSink::new(tx.clone()),
                stop,
            )
            .await;

        transition(
            &mut lifecycle,
            if outcome.stopped {
                InvocationState::Killed
            } else {
                InvocationState::Exited
            },
        );

        // Release the channel before reporting exit so a client reacting to the
        // exit event can reuse it immediately.
        drop(registration);
        transition(&mut lifecycle, InvocationState::Done);

        if tx.send(RunEvent::exit(outcome.code)).await.is_err() {
            debug!("Client went away before the exit event");
        }

        info!(
            exit_code = outcome.code,
            stopped = outcome.stopped,
            duration_ms = time_provider.elapsed_millis(started_at),
            "Process exited"
        );
    }
}

/// Checked transition during dispatch (illegal transitions are errors)
fn advance(lifecycle: &mut InvocationLifecycle, next: InvocationState, span: &Span) -> Result<()> {
    lifecycle.advance(next)?;
    debug!(parent: span, state = %next, "Invocation state");
    Ok(())
}

fn transition(lifecycle: &mut InvocationLifecycle, next: InvocationState) {
    match lifecycle.advance(next) {
        Ok(()) => debug!(state = %next, "Invocation state"),
        Err(e) => error!(error = %e, "Invocation lifecycle violated"),
    }
}
