//! Snippet Run SDK - Rust Client Library
//!
//! Provides a convenient client for running snippets through a local
//! Snippet Run agent.
//!
//! # Example
//!
//! ```no_run
//! use snippet_run_sdk::{FileSpec, RunEvent, SessionInfo, SnippetRunClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connection details of the local agent
//!     let session = SessionInfo::load(&SessionInfo::default_path())?;
//!     let client = SnippetRunClient::connect(&session.url, session.token).await?;
//!
//!     // Run a snippet and print its output
//!     let events = client
//!         .run("example", FileSpec::new("hello.py", "python", "print('hi')"))
//!         .await?
//!         .collect()
//!         .await?;
//!
//!     for event in events {
//!         if let RunEvent::Output { data, .. } = event {
//!             print!("{}", data);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod session;
mod types;

pub use client::{RunSubscription, SnippetRunClient};
pub use error::{Result, SdkError};
pub use session::SessionInfo;
pub use types::{
    ChannelEvent, FileSpec, HandshakeResponse, OutputStream, RuleSummary, RulesResponse,
    RunEvent, StopResponse,
};
