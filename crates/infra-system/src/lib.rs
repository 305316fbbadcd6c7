// Snippet Run Infrastructure - System Adapters
// Implements: SnippetWorkspace, ProcessSupervisor

pub mod decoder;
pub mod shell;
pub mod shell_supervisor;
pub mod workspace;

pub use decoder::Utf8ChunkDecoder;
pub use shell::ShellConfig;
pub use shell_supervisor::ShellSupervisor;
pub use workspace::FsWorkspace;
