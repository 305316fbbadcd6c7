// Invocation lifecycle

use crate::domain::error::{DomainError, Result};

/// Per-invocation state machine
///
/// ```text
/// Idle -> Resolving -> NoMatch -> FallbackSpawned
///                   -> Matched -> Materialized -> Spawned
/// Spawned | FallbackSpawned -> Running -> Exited | Killed -> Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Idle,
    Resolving,
    NoMatch,
    Matched,
    Materialized,
    FallbackSpawned,
    Spawned,
    Running,
    Exited,
    Killed,
    Done,
}

impl std::fmt::Display for InvocationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InvocationState::Idle => "IDLE",
            InvocationState::Resolving => "RESOLVING",
            InvocationState::NoMatch => "NO_MATCH",
            InvocationState::Matched => "MATCHED",
            InvocationState::Materialized => "MATERIALIZED",
            InvocationState::FallbackSpawned => "FALLBACK_SPAWNED",
            InvocationState::Spawned => "SPAWNED",
            InvocationState::Running => "RUNNING",
            InvocationState::Exited => "EXITED",
            InvocationState::Killed => "KILLED",
            InvocationState::Done => "DONE",
        };
        f.write_str(name)
    }
}

impl InvocationState {
    pub fn can_transition_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, NoMatch)
                | (Resolving, Matched)
                // Resolution failed (materialization or generator error)
                | (Resolving, Done)
                | (NoMatch, FallbackSpawned)
                | (Matched, Materialized)
                | (Materialized, Spawned)
                | (Spawned, Running)
                | (FallbackSpawned, Running)
                | (Running, Exited)
                | (Running, Killed)
                | (Exited, Done)
                | (Killed, Done)
        )
    }
}

/// Tracks the state of one invocation, refusing illegal transitions
#[derive(Debug, Clone)]
pub struct InvocationLifecycle {
    state: InvocationState,
}

impl Default for InvocationLifecycle {
    fn default() -> Self {
        Self {
            state: InvocationState::Idle,
        }
    }
}

impl InvocationLifecycle {
    pub fn state(&self) -> InvocationState {
        self.state
    }

    pub fn advance(&mut self, next: InvocationState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvocationState::*;

    #[test]
    fn test_matched_path() {
        let mut lifecycle = InvocationLifecycle::default();
        for next in [Resolving, Matched, Materialized, Spawned, Running, Exited, Done] {
            lifecycle.advance(next).unwrap();
        }
        assert_eq!(lifecycle.state(), Done);
    }

    #[test]
    fn test_fallback_path_with_kill() {
        let mut lifecycle = InvocationLifecycle::default();
        for next in [Resolving, NoMatch, FallbackSpawned, Running, Killed, Done] {
            lifecycle.advance(next).unwrap();
        }
        assert_eq!(lifecycle.state(), Done);
    }

    #[test]
    fn test_illegal_transitions_are_refused() {
        let mut lifecycle = InvocationLifecycle::default();
        let err = lifecycle.advance(Running).unwrap_err();
        assert!(err.to_string().contains("IDLE -> RUNNING"));

        assert!(!Done.can_transition_to(Running));
        assert!(!NoMatch.can_transition_to(Materialized));
        assert!(!Exited.can_transition_to(Killed));
    }
}
