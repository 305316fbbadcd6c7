// Stop Signal - out-of-band cancellation for one invocation

use tokio::sync::watch;

/// Receiving side of a stop signal, handed to the process supervisor
#[derive(Clone, Debug)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// Check if a stop was requested
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until a stop is requested
    ///
    /// Never resolves if the sender goes away without stopping.
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Sending side of a stop signal, kept by the invocation registry
#[derive(Debug)]
pub struct StopSender {
    tx: watch::Sender<bool>,
}

impl StopSender {
    /// Request a stop. Returns false if one was already requested.
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }
}

/// Create a stop channel
pub fn stop_channel() -> (StopSender, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopSender { tx }, StopToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_resolves_after_stop() {
        let (sender, mut token) = stop_channel();
        assert!(!token.is_stopped());

        let waiter = tokio::spawn(async move {
            token.wait().await;
            token.is_stopped()
        });
        assert!(sender.stop());
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_second_stop_is_noop() {
        let (sender, mut token) = stop_channel();
        assert!(sender.stop());
        assert!(!sender.stop());
        // Already stopped: wait returns immediately
        tokio::time::timeout(Duration::from_millis(100), token.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_sender_does_not_count_as_stop() {
        let (sender, mut token) = stop_channel();
        drop(sender);
        let waited = tokio::time::timeout(Duration::from_millis(50), token.wait()).await;
        assert!(waited.is_err());
        assert!(!token.is_stopped());
    }

    #[test]
    fn test_wait_pends_until_stopped() {
        let (sender, mut token) = stop_channel();
        let mut waiting = tokio_test::task::spawn(async move { token.wait().await });

        tokio_test::assert_pending!(waiting.poll());
        sender.stop();
        assert!(waiting.is_woken());
        tokio_test::assert_ready!(waiting.poll());
    }
}
