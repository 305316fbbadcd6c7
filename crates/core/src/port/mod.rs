// Port Layer - Interfaces for external dependencies

pub mod process_supervisor;
pub mod stop;
pub mod time_provider;
pub mod workspace;

// Re-exports
pub use process_supervisor::{ExitOutcome, OutputSink, ProcessSupervisor};
pub use stop::{stop_channel, StopSender, StopToken};
pub use time_provider::TimeProvider;
pub use workspace::{SnippetWorkspace, WorkspaceLayout};
