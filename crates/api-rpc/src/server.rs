//! JSON-RPC Server
//!
//! Serves the agent over WebSocket (and HTTP for unary calls) on localhost.

use crate::handler::RpcHandler;
use crate::origin::OriginFilterLayer;
use crate::types::{HandshakeRequest, RulesRequest, RunRequest, StopRequest};
use jsonrpsee::core::RegisterMethodError;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use snippet_run_core::application::Dispatcher;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";

pub const METHOD_HANDSHAKE: &str = "handshake.v1";
pub const METHOD_RUN: &str = "command.run.v1";
pub const NOTIFICATION_EVENT: &str = "command.event.v1";
pub const METHOD_UNSUBSCRIBE: &str = "command.unsubscribe.v1";
pub const METHOD_STOP: &str = "command.stop.v1";
pub const METHOD_RULES: &str = "rules.list.v1";

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    /// 0 picks a free port
    pub port: u16,
    /// Only browser origin allowed to connect (`*` for any); requests
    /// without an `Origin` header are unaffected
    pub allowed_origin: Option<String>,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: 0,
            allowed_origin: None,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        dispatcher: Arc<Dispatcher>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(dispatcher, token)),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (the real port when configured with 0).
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let http_middleware = tower::ServiceBuilder::new()
            .layer(OriginFilterLayer::new(self.config.allowed_origin.clone()));

        let server = Server::builder()
            .set_http_middleware(http_middleware)
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = build_module(self.handler).map_err(|e| e.to_string())?;

        info!(
            addr = %local_addr,
            allowed_origin = self.config.allowed_origin.as_deref().unwrap_or("<none>"),
            "JSON-RPC server started"
        );

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}

/// Register every method on a fresh module
pub fn build_module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>, RegisterMethodError> {
    let mut module = RpcModule::new(());

    let h = handler.clone();
    module.register_async_method(METHOD_HANDSHAKE, move |params, _, _| {
        let handler = h.clone();
        async move {
            let req: HandshakeRequest = params.parse()?;
            handler.handshake(req).await
        }
    })?;

    let h = handler.clone();
    module.register_async_method(METHOD_STOP, move |params, _, _| {
        let handler = h.clone();
        async move {
            let req: StopRequest = params.parse()?;
            handler.stop(req).await
        }
    })?;

    let h = handler.clone();
    module.register_async_method(METHOD_RULES, move |params, _, _| {
        let handler = h.clone();
        async move {
            let req: RulesRequest = params.parse()?;
            handler.rules(req).await
        }
    })?;

    let h = handler;
    module.register_subscription(
        METHOD_RUN,
        NOTIFICATION_EVENT,
        METHOD_UNSUBSCRIBE,
        move |params, pending, _, _| {
            let handler = h.clone();
            async move {
                let req: RunRequest = match params.parse() {
                    Ok(req) => req,
                    Err(e) => {
                        pending.reject(e).await;
                        return Ok(());
                    }
                };
                handler.run(req, pending).await
            }
        },
    )?;

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use crate::types::{HandshakeResponse, StopResponse};
    use jsonrpsee::core::client::{ClientT, SubscriptionClientT};
    use jsonrpsee::core::params::ObjectParams;
    use jsonrpsee::core::server::MethodsError;
    use jsonrpsee::ws_client::WsClientBuilder;
    use snippet_run_core::domain::generator;
    use snippet_run_core::domain::{ChannelEvent, Matcher, OutputStream, Rule, RuleSet, RunEvent};
    use snippet_run_core::port::process_supervisor::mocks::ScriptedSupervisor;
    use snippet_run_core::port::time_provider::SystemTimeProvider;
    use snippet_run_core::port::workspace::mocks::InMemoryWorkspace;
    use std::time::Duration;

    fn module_with(workspace: InMemoryWorkspace) -> RpcModule<()> {
        let rules = RuleSet::new(vec![Rule::new(
            "shell",
            Matcher::pattern(r"\.sh$").unwrap(),
            generator::from_fn(|_, path, _| Ok(format!("sh {}", path.display()))),
        )]);
        let dispatcher = Dispatcher::new(
            Arc::new(rules),
            Arc::new(workspace),
            Arc::new(ScriptedSupervisor::new(
                vec![(OutputStream::Stdout, "hi\n")],
                0,
            )),
            Arc::new(SystemTimeProvider),
            "/rules.toml",
        );
        build_module(Arc::new(RpcHandler::new(Arc::new(dispatcher), "secret"))).unwrap()
    }

    fn module() -> RpcModule<()> {
        module_with(InMemoryWorkspace::new("/run"))
    }

    fn run_params(token: &str, channel: &str, filename: &str) -> ObjectParams {
        let mut params = ObjectParams::new();
        params.insert("token", token).unwrap();
        params.insert("channel", channel).unwrap();
        params
            .insert(
                "file",
                serde_json::json!({"filename": filename, "filetype": "shell", "content": "echo hi"}),
            )
            .unwrap();
        params
    }

    #[tokio::test]
    async fn test_handshake_by_name() {
        let mut params = ObjectParams::new();
        params.insert("token", "secret").unwrap();

        let response: HandshakeResponse = module().call(METHOD_HANDSHAKE, params).await.unwrap();
        assert_eq!(response.status, "ok");
    }

    #[tokio::test]
    async fn test_stop_requires_token() {
        let mut params = ObjectParams::new();
        params.insert("token", "wrong").unwrap();
        params.insert("channel", "c1").unwrap();

        let err = module()
            .call::<_, StopResponse>(METHOD_STOP, params)
            .await
            .unwrap_err();
        match err {
            MethodsError::JsonRpc(e) => assert_eq!(e.code(), code::UNAUTHORIZED),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_streams_events_until_exit() {
        let module = module();
        let mut sub = module
            .subscribe_unbounded(METHOD_RUN, run_params("secret", "c1", "hello.sh"))
            .await
            .unwrap();

        let (first, _) = sub.next::<ChannelEvent>().await.unwrap().unwrap();
        assert_eq!(first.channel, "c1");
        assert_eq!(first.event, RunEvent::output(OutputStream::Stdout, "hi\n"));

        let (last, _) = sub.next::<ChannelEvent>().await.unwrap().unwrap();
        assert_eq!(last.event, RunEvent::exit(0));
    }

    #[tokio::test]
    async fn test_run_with_bad_token_is_rejected() {
        let err = module()
            .subscribe_unbounded(METHOD_RUN, run_params("nope", "c1", "hello.sh"))
            .await
            .err()
            .unwrap();
        match err {
            MethodsError::JsonRpc(e) => assert_eq!(e.code(), code::UNAUTHORIZED),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_materialization_failure_arrives_as_events() {
        let module = module_with(InMemoryWorkspace::failing("/run", "disk full"));
        let mut sub = module
            .subscribe_unbounded(METHOD_RUN, run_params("secret", "c1", "hello.sh"))
            .await
            .unwrap();

        let (first, _) = sub.next::<ChannelEvent>().await.unwrap().unwrap();
        let RunEvent::Output { data, stream } = first.event else {
            panic!("expected output event");
        };
        assert_eq!(stream, OutputStream::Stderr);
        assert!(data.starts_with("Error: "));
        assert!(data.contains("disk full"));

        let (last, _) = sub.next::<ChannelEvent>().await.unwrap().unwrap();
        assert_eq!(last.event, RunEvent::exit(1));
    }

    async fn start_server(
        dispatcher: Arc<Dispatcher>,
        allowed_origin: Option<&str>,
    ) -> (String, ServerHandle) {
        let config = RpcServerConfig {
            allowed_origin: allowed_origin.map(str::to_string),
            ..RpcServerConfig::default()
        };
        let (addr, handle) = RpcServer::new(config, dispatcher, "secret")
            .start()
            .await
            .unwrap();
        (format!("ws://{}", addr), handle)
    }

    fn idle_dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            Arc::new(RuleSet::new(vec![])),
            Arc::new(InMemoryWorkspace::new("/run")),
            Arc::new(ScriptedSupervisor::new(vec![], 0)),
            Arc::new(SystemTimeProvider),
            "/rules.toml",
        ))
    }

    fn token_params() -> ObjectParams {
        let mut params = ObjectParams::new();
        params.insert("token", "secret").unwrap();
        params
    }

    #[tokio::test]
    async fn test_client_gone_before_accept_stops_invocation() {
        // Resolution outlives the client, so the subscription is accepted too late
        let rules = RuleSet::new(vec![Rule::new(
            "slow",
            Matcher::pattern(r"\.sh$").unwrap(),
            generator::from_fn(|_, path, _| {
                std::thread::sleep(Duration::from_millis(500));
                Ok(format!("sh {}", path.display()))
            }),
        )]);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(rules),
            Arc::new(InMemoryWorkspace::new("/run")),
            Arc::new(ScriptedSupervisor::long_running(vec![])),
            Arc::new(SystemTimeProvider),
            "/rules.toml",
        ));
        let (url, handle) = start_server(dispatcher.clone(), None).await;

        let client = WsClientBuilder::default().build(&url).await.unwrap();
        let subscribe = client.subscribe::<ChannelEvent, _>(
            METHOD_RUN,
            run_params("secret", "c1", "slow.sh"),
            METHOD_UNSUBSCRIBE,
        );
        assert!(tokio::time::timeout(Duration::from_millis(100), subscribe)
            .await
            .is_err());
        assert_eq!(dispatcher.in_flight(), 1);
        drop(client);

        tokio::time::timeout(Duration::from_secs(3), async {
            while dispatcher.in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("invocation still registered after the client left");

        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_foreign_origin_cannot_connect() {
        let (url, handle) = start_server(idle_dispatcher(), Some("https://app.test")).await;

        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::ORIGIN,
            http::HeaderValue::from_static("https://evil.test"),
        );
        let refused = WsClientBuilder::default().set_headers(headers).build(&url).await;
        assert!(refused.is_err());

        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_allowed_origin_and_plain_clients_connect() {
        let (url, handle) = start_server(idle_dispatcher(), Some("https://app.test")).await;

        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::ORIGIN,
            http::HeaderValue::from_static("https://app.test"),
        );
        let browser = WsClientBuilder::default()
            .set_headers(headers)
            .build(&url)
            .await
            .unwrap();
        let response: HandshakeResponse = browser
            .request(METHOD_HANDSHAKE, token_params())
            .await
            .unwrap();
        assert_eq!(response.status, "ok");

        let editor = WsClientBuilder::default().build(&url).await.unwrap();
        let response: HandshakeResponse = editor
            .request(METHOD_HANDSHAKE, token_params())
            .await
            .unwrap();
        assert_eq!(response.status, "ok");

        handle.stop().unwrap();
    }
}
