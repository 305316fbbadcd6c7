//! RPC Method Handlers
//!
//! Implements each JSON-RPC method on top of the dispatcher.

use crate::error::to_rpc_error;
use crate::types::{
    HandshakeRequest, HandshakeResponse, RuleSummary, RulesRequest, RulesResponse, RunRequest,
    StopRequest, StopResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::{PendingSubscriptionSink, SubscriptionMessage, SubscriptionSink};
use snippet_run_core::application::constants::DISPATCH_FAILURE_EXIT_CODE;
use snippet_run_core::application::{Dispatcher, EventStream};
use snippet_run_core::domain::{ChannelEvent, OutputStream, RunEvent, Snippet};
use snippet_run_core::error::AppError;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use jsonrpsee::core::SubscriptionResult;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    dispatcher: Arc<Dispatcher>,
    token: String,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(dispatcher: Arc<Dispatcher>, token: impl Into<String>) -> Self {
        Self {
            dispatcher,
            token: token.into(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Compare the presented token without an early exit on the first mismatch
    fn authorize(&self, token: &str) -> Result<(), ErrorObjectOwned> {
        let expected = self.token.as_bytes();
        let presented = token.as_bytes();
        let diff = expected
            .iter()
            .zip(presented)
            .fold(expected.len() ^ presented.len(), |acc, (a, b)| {
                acc | usize::from(a ^ b)
            });
        if diff == 0 {
            Ok(())
        } else {
            warn!("Rejected request with invalid token");
            Err(to_rpc_error(AppError::Unauthorized(
                "invalid token".to_string(),
            )))
        }
    }

    /// handshake.v1
    pub async fn handshake(
        &self,
        params: HandshakeRequest,
    ) -> Result<HandshakeResponse, ErrorObjectOwned> {
        self.authorize(&params.token)?;
        Ok(HandshakeResponse {
            status: "ok".to_string(),
            version: snippet_run_core::VERSION.to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }

    /// command.stop.v1
    pub async fn stop(&self, params: StopRequest) -> Result<StopResponse, ErrorObjectOwned> {
        self.authorize(&params.token)?;
        let stopped = self.dispatcher.stop(&params.channel);
        Ok(StopResponse {
            channel: params.channel,
            stopped,
        })
    }

    /// rules.list.v1
    pub async fn rules(&self, params: RulesRequest) -> Result<RulesResponse, ErrorObjectOwned> {
        self.authorize(&params.token)?;
        let rules = self
            .dispatcher
            .rules()
            .iter()
            .enumerate()
            .map(|(index, rule)| RuleSummary {
                index,
                label: rule.label().to_string(),
            })
            .collect();
        Ok(RulesResponse { rules })
    }

    /// command.run.v1
    ///
    /// Request errors (token, invalid snippet, busy channel) reject the
    /// subscription. Anything that goes wrong after that is reported on the
    /// event stream as output followed by an exit code.
    pub async fn run(
        &self,
        params: RunRequest,
        pending: PendingSubscriptionSink,
    ) -> SubscriptionResult {
        if let Err(e) = self.authorize(&params.token) {
            pending.reject(e).await;
            return Ok(());
        }

        let RunRequest { channel, file, .. } = params;
        let snippet = Snippet::new(channel.clone(), file.filename, file.filetype, file.content);

        match self.dispatcher.dispatch(snippet).await {
            Ok(stream) => {
                let sink = match pending.accept().await {
                    Ok(sink) => sink,
                    Err(e) => {
                        // The invocation is already running; nobody will read it
                        info!(channel = %channel, "Subscriber gone before accept, stopping invocation");
                        self.dispatcher.stop(&channel);
                        return Err(e.into());
                    }
                };
                self.relay(stream, sink).await
            }
            Err(e) if e.is_request_error() => {
                debug!(channel = %channel, error = %e, "Run rejected");
                pending.reject(to_rpc_error(e)).await;
                Ok(())
            }
            Err(e) => {
                let sink = pending.accept().await?;
                let events = [
                    RunEvent::output(OutputStream::Stderr, format!("Error: {}\n", e)),
                    RunEvent::exit(DISPATCH_FAILURE_EXIT_CODE),
                ];
                for event in events {
                    let message = SubscriptionMessage::from_json(&ChannelEvent {
                        channel: channel.clone(),
                        event,
                    })?;
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                Ok(())
            }
        }
    }

    /// Forward invocation events to the subscriber until the exit event
    ///
    /// A subscriber that goes away (unsubscribe or disconnect) stops the
    /// invocation.
    async fn relay(&self, mut stream: EventStream, sink: SubscriptionSink) -> SubscriptionResult {
        let channel = stream.channel().to_string();

        loop {
            tokio::select! {
                event = stream.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    let is_exit = event.is_exit();
                    let message = SubscriptionMessage::from_json(&ChannelEvent {
                        channel: channel.clone(),
                        event,
                    })?;
                    if sink.send(message).await.is_err() {
                        info!(channel = %channel, "Subscriber gone, stopping invocation");
                        self.dispatcher.stop(&channel);
                        break;
                    }
                    if is_exit {
                        break;
                    }
                }
                _ = sink.closed() => {
                    info!(channel = %channel, "Subscriber gone, stopping invocation");
                    self.dispatcher.stop(&channel);
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use snippet_run_core::domain::generator;
    use snippet_run_core::domain::{Matcher, Rule, RuleSet};
    use snippet_run_core::port::process_supervisor::mocks::ScriptedSupervisor;
    use snippet_run_core::port::time_provider::SystemTimeProvider;
    use snippet_run_core::port::workspace::mocks::InMemoryWorkspace;

    fn handler() -> RpcHandler {
        let rules = RuleSet::new(vec![Rule::new(
            "shell",
            Matcher::pattern(r"\.sh$").unwrap(),
            generator::from_fn(|_, path, _| Ok(format!("sh {}", path.display()))),
        )]);
        let dispatcher = Dispatcher::new(
            Arc::new(rules),
            Arc::new(InMemoryWorkspace::new("/run")),
            Arc::new(ScriptedSupervisor::new(vec![], 0)),
            Arc::new(SystemTimeProvider),
            "/rules.toml",
        );
        RpcHandler::new(Arc::new(dispatcher), "secret")
    }

    #[tokio::test]
    async fn test_handshake() {
        let handler = handler();
        let response = handler
            .handshake(HandshakeRequest {
                token: "secret".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, snippet_run_core::VERSION);
    }

    #[tokio::test]
    async fn test_wrong_token_is_unauthorized() {
        let handler = handler();
        for token in ["", "secre", "secret!", "SECRET"] {
            let err = handler
                .handshake(HandshakeRequest {
                    token: token.to_string(),
                })
                .await
                .unwrap_err();
            assert_eq!(err.code(), code::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_rules_lists_effective_order() {
        let response = handler()
            .rules(RulesRequest {
                token: "secret".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.rules.len(), 1);
        assert_eq!(response.rules[0].index, 0);
        assert_eq!(response.rules[0].label, "shell");
    }

    #[tokio::test]
    async fn test_stop_unknown_channel_is_noop() {
        let response = handler()
            .stop(StopRequest {
                token: "secret".to_string(),
                channel: "nobody".to_string(),
            })
            .await
            .unwrap();
        assert!(!response.stopped);
        assert_eq!(response.channel, "nobody");
    }
}
