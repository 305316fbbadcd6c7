// Dispatch constants (no magic values)
use std::time::Duration;

/// Exit code of the synthetic command reported when no rule matches
pub const NO_RULE_EXIT_CODE: i32 = 127;

/// Exit code reported when an invocation fails before anything is spawned
/// (working file not writable, generator error)
pub const DISPATCH_FAILURE_EXIT_CODE: i32 = 1;

/// Exit codes for commands that cannot be spawned at all
pub const SPAWN_NOT_FOUND_EXIT_CODE: i32 = 127;
pub const SPAWN_PERMISSION_EXIT_CODE: i32 = 126;
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 1;

/// Exit code base for processes terminated by a signal (128 + signal number)
pub const SIGNAL_EXIT_CODE_BASE: i32 = 128;

/// Capacity of the per-invocation event queue
pub const EVENT_BUFFER_SIZE: usize = 256;

/// Size of a single read from a child's stdout/stderr
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// How long to keep draining output after the child exited
/// (descendants may still hold the pipes open)
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
