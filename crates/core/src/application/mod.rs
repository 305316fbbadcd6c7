// Application Layer - Use Cases

pub mod constants;
pub mod dispatch;
pub mod resolver;

// Re-exports
pub use dispatch::{Dispatcher, EventStream};
pub use resolver::{CommandResolver, ExecutionContext, Resolution};
