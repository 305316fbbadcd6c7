// Domain Layer - Pure business logic and entities

pub mod error;
pub mod event;
pub mod generator;
pub mod invocation;
pub mod rule;
pub mod snippet;

// Re-exports
pub use error::DomainError;
pub use event::{ChannelEvent, OutputStream, RunEvent};
pub use generator::{CommandGenerator, GeneratorContext, TemplateGenerator};
pub use invocation::{InvocationLifecycle, InvocationState};
pub use rule::{Matcher, Rule, RuleSet};
pub use snippet::{Channel, Snippet, SnippetFile};
