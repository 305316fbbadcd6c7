//! Snippet Run Agent - Main Entry Point

use anyhow::Result;
use snippet_run_daemon::{logging, Agent, AgentConfig, AgentPaths};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let paths = AgentPaths::resolve();
    paths.create_dirs()?;
    let config = AgentConfig::load(&paths)?;

    // 2. Initialize logging
    let _log_guard = logging::init(&config, &paths)?;
    info!(home = %paths.home.display(), "Snippet Run agent v{} starting...", VERSION);

    // 3. Prepare workspace, load rules, start JSON-RPC server
    let agent = Agent::start(&config, &paths).await?;

    info!(url = %agent.url(), "Agent ready");
    info!(token = %agent.token(), "Session token");
    info!(rules = %paths.rules_file.display(), "User rules");
    info!("Press Ctrl+C to shutdown");

    // 4. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");
    agent.shutdown().await?;
    info!("Shutdown complete.");

    Ok(())
}
