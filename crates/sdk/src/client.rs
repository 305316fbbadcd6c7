//! Snippet Run Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{ChannelEvent, FileSpec, HandshakeResponse, RulesResponse, RunEvent, StopResponse};
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use std::time::Duration;

const METHOD_HANDSHAKE: &str = "handshake.v1";
const METHOD_RUN: &str = "command.run.v1";
const METHOD_UNSUBSCRIBE: &str = "command.unsubscribe.v1";
const METHOD_STOP: &str = "command.stop.v1";
const METHOD_RULES: &str = "rules.list.v1";

/// Snippet Run agent client (WebSocket)
///
/// # Example
///
/// ```no_run
/// use snippet_run_sdk::{FileSpec, SnippetRunClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SnippetRunClient::connect("ws://127.0.0.1:53817", "token").await?;
/// let mut run = client
///     .run("c1", FileSpec::new("hello.sh", "shell", "echo hi"))
///     .await?;
/// while let Some(event) = run.next().await {
///     println!("{:?}", event?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SnippetRunClient {
    client: WsClient,
    token: String,
}

impl SnippetRunClient {
    /// Connect to a running agent
    ///
    /// # Arguments
    ///
    /// * `url` - WebSocket endpoint (e.g., `ws://127.0.0.1:53817`)
    /// * `token` - Session token printed by the agent (also in its session file)
    pub async fn connect(url: impl AsRef<str>, token: impl Into<String>) -> Result<Self> {
        let url = url.as_ref();

        let client = WsClientBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .build(url)
            .await
            .map_err(|e| SdkError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        Ok(Self {
            client,
            token: token.into(),
        })
    }

    fn params(&self) -> Result<ObjectParams> {
        let mut params = ObjectParams::new();
        params.insert("token", &self.token)?;
        Ok(params)
    }

    /// Check the token and read the agent version
    pub async fn handshake(&self) -> Result<HandshakeResponse> {
        let response = self.client.request(METHOD_HANDSHAKE, self.params()?).await?;
        Ok(response)
    }

    /// Run a snippet on `channel`
    ///
    /// Fails with an RPC error when the token is wrong or the channel is busy.
    pub async fn run(
        &self,
        channel: impl Into<String>,
        file: FileSpec,
    ) -> Result<RunSubscription> {
        let channel = channel.into();
        let mut params = self.params()?;
        params.insert("channel", &channel)?;
        params.insert("file", &file)?;

        let inner = self
            .client
            .subscribe(METHOD_RUN, params, METHOD_UNSUBSCRIBE)
            .await?;

        Ok(RunSubscription {
            channel,
            inner,
            finished: false,
        })
    }

    /// Stop the snippet running on `channel` (no-op if none)
    pub async fn stop(&self, channel: impl Into<String>) -> Result<StopResponse> {
        let mut params = self.params()?;
        params.insert("channel", channel.into())?;
        let response = self.client.request(METHOD_STOP, params).await?;
        Ok(response)
    }

    /// Rules in evaluation order
    pub async fn rules(&self) -> Result<RulesResponse> {
        let response = self.client.request(METHOD_RULES, self.params()?).await?;
        Ok(response)
    }
}

/// Events of one run, ending with the exit event
///
/// Dropping it before the exit stops the snippet.
pub struct RunSubscription {
    channel: String,
    inner: Subscription<ChannelEvent>,
    finished: bool,
}

impl RunSubscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next event; None after the exit event or if the connection closed
    pub async fn next(&mut self) -> Option<Result<RunEvent>> {
        if self.finished {
            return None;
        }
        match self.inner.next().await? {
            Ok(ChannelEvent { event, .. }) => {
                if matches!(event, RunEvent::Exit { .. }) {
                    self.finished = true;
                }
                Some(Ok(event))
            }
            Err(e) => Some(Err(e.into())),
        }
    }

    /// Collect events until the exit event
    pub async fn collect(mut self) -> Result<Vec<RunEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event?);
        }
        Ok(events)
    }

    /// True once the exit event was received
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
