//! Snippet Run agent: configuration, rule files, logging and wiring

pub mod bootstrap;
pub mod config;
pub mod logging;
pub mod rules;
pub mod session;

pub use bootstrap::Agent;
pub use config::{AgentConfig, AgentPaths};
