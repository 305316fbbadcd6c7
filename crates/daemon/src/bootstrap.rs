//! Agent startup and shutdown (dependency wiring lives here)

use crate::config::{AgentConfig, AgentPaths};
use crate::rules::{load_rule_set, seed_user_rules};
use crate::session::{SessionFile, SessionInfo};
use anyhow::{anyhow, Context, Result};
use jsonrpsee::server::ServerHandle;
use snippet_run_api_rpc::{RpcServer, RpcServerConfig};
use snippet_run_core::application::Dispatcher;
use snippet_run_core::port::time_provider::SystemTimeProvider;
use snippet_run_infra_system::{FsWorkspace, ShellSupervisor};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A running agent
pub struct Agent {
    addr: SocketAddr,
    token: String,
    dispatcher: Arc<Dispatcher>,
    handle: ServerHandle,
    session: SessionFile,
}

impl Agent {
    /// Prepare the home directory, load rules and start serving
    pub async fn start(config: &AgentConfig, paths: &AgentPaths) -> Result<Self> {
        paths.create_dirs()?;

        let workspace = Arc::new(FsWorkspace::new(&paths.run_dir, config.workspace.layout));
        workspace
            .clear()
            .with_context(|| format!("failed to clear {}", paths.run_dir.display()))?;

        seed_user_rules(&paths.rules_file)?;
        let rules = Arc::new(load_rule_set(&paths.rules_file)?);

        let time_provider = Arc::new(SystemTimeProvider);
        let supervisor = Arc::new(ShellSupervisor::new(
            time_provider.clone(),
            config.shell.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            rules,
            workspace,
            supervisor,
            time_provider,
            paths.rules_file.clone(),
        ));

        let token = config
            .token
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let rpc_config = RpcServerConfig {
            host: config.host.clone(),
            port: config.port,
            allowed_origin: config.allowed_origin.clone(),
        };
        let (addr, handle) = RpcServer::new(rpc_config, dispatcher.clone(), token.clone())
            .start()
            .await
            .map_err(|e| anyhow!("RPC server start failed: {}", e))?;

        let session = SessionFile::write(&paths.session_file, &SessionInfo::new(addr, &token))?;
        info!(path = %session.path().display(), "Session file written");

        Ok(Self {
            addr,
            token,
            dispatcher,
            handle,
            session,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Stop serving and remove the session file
    pub async fn shutdown(self) -> Result<()> {
        let Agent {
            handle, session, ..
        } = self;

        handle
            .stop()
            .map_err(|e| anyhow!("RPC server stop failed: {}", e))?;
        handle.stopped().await;
        drop(session);
        Ok(())
    }
}
