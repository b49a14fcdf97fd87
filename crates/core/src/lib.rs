//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley agent
//! orchestration runtime. This crate has no framework dependencies: it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of a turn (LLM client, tool set, conversation store)
//! is a trait here. Implementations live in their respective crates, so
//! tests can swap in scripted doubles and the dependency graph points inward
//! on core.

pub mod agent;
pub mod error;
pub mod event;
pub mod llm;
pub mod message;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentConfiguration, AgentResponse, AgentState, LlmResponse};
pub use error::{Error, ErrorKind, ProviderError, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use llm::{Completion, LlmClient, LlmRequest, Usage};
pub use message::{ConversationContext, ConversationId, Message, MessageType, Role};
pub use store::ConversationStore;
pub use tool::{
    ArgValue, ToolAnnotations, ToolArguments, ToolCall, ToolDebugSink, ToolDefinition,
    ToolResponse, ToolSet, ToolSetRegistry,
};
