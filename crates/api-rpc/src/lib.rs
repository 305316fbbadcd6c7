//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 over WebSocket (unary calls also work over HTTP) for the
//! Snippet Run agent. Every method is versioned (`*.v1`) and takes the
//! session token in its params.

pub mod error;
pub mod handler;
pub mod origin;
pub mod server;
pub mod types;

pub use origin::OriginFilterLayer;
pub use server::{RpcServer, RpcServerConfig};
