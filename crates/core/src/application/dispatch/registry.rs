// Invocation Registry - stop senders of the invocations currently in flight

use crate::domain::Channel;
use crate::error::{AppError, Result};
use crate::port::{stop_channel, StopSender, StopToken};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Channels with an invocation in flight, keyed to their stop sender
#[derive(Default)]
pub struct InvocationRegistry {
    running: Mutex<HashMap<Channel, StopSender>>,
}

impl InvocationRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn running(&self) -> MutexGuard<'_, HashMap<Channel, StopSender>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim a channel for a new invocation
    ///
    /// The channel is released when the returned registration is dropped.
    ///
    /// # Errors
    /// - AppError::Conflict if the channel already has an invocation in flight
    pub fn register(self: &Arc<Self>, channel: &str) -> Result<(Registration, StopToken)> {
        let mut running = self.running();
        if running.contains_key(channel) {
            return Err(AppError::Conflict(format!(
                "channel '{}' already has a running invocation",
                channel
            )));
        }
        let (sender, token) = stop_channel();
        running.insert(channel.to_string(), sender);

        Ok((
            Registration {
                registry: Arc::clone(self),
                channel: channel.to_string(),
            },
            token,
        ))
    }

    /// Signal the invocation on `channel` to stop
    ///
    /// Returns false when nothing is running on that channel (already
    /// finished or never started); that is not an error.
    pub fn stop(&self, channel: &str) -> bool {
        match self.running().get(channel) {
            Some(sender) => {
                sender.stop();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.running().len()
    }

    pub fn is_empty(&self) -> bool {
        self.running().is_empty()
    }

    fn release(&self, channel: &str) {
        self.running().remove(channel);
    }
}

/// Claim on a channel; releases it on drop
pub struct Registration {
    registry: Arc<InvocationRegistry>,
    channel: Channel,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.release(&self.channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_release() {
        let registry = InvocationRegistry::new();
        let (registration, _token) = registry.register("c1").unwrap();
        assert_eq!(registry.len(), 1);

        drop(registration);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_in_flight_channel_conflicts() {
        let registry = InvocationRegistry::new();
        let (_registration, _token) = registry.register("c1").unwrap();

        let err = registry.register("c1").err().unwrap();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_channel_reusable_after_release() {
        let registry = InvocationRegistry::new();
        let (first, _) = registry.register("c1").unwrap();
        drop(first);
        assert!(registry.register("c1").is_ok());
    }

    #[test]
    fn test_stop_scoped_to_channel() {
        let registry = InvocationRegistry::new();
        let (_a, token_a) = registry.register("a").unwrap();
        let (_b, token_b) = registry.register("b").unwrap();

        assert!(registry.stop("a"));
        assert!(token_a.is_stopped());
        assert!(!token_b.is_stopped());
    }

    #[test]
    fn test_stop_unknown_channel_is_noop() {
        let registry = InvocationRegistry::new();
        assert!(!registry.stop("ghost"));
    }
}
