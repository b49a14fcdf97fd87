//! Agent orchestration for Parley: the turn-taking pipeline.
//!
//! One turn flows through three layers:
//!
//! 1. [`ChatOrchestrator`] appends the user message and owns the turn
//! 2. [`LlmOrchestrator`] runs every active agent against a snapshot
//! 3. [`AgentExecutor`] drives one agent: LLM call, tool dispatch, follow-up
//!
//! All conversation state lives in the [`ContextManager`]; nothing below the
//! chat layer writes to it.

pub mod chat_orchestrator;
pub mod context_manager;
pub mod executor;
pub mod llm_orchestrator;

#[cfg(test)]
mod test_helpers;

pub use chat_orchestrator::ChatOrchestrator;
pub use context_manager::{ContextManager, TurnGuard};
pub use executor::AgentExecutor;
pub use llm_orchestrator::{APOLOGY, LlmOrchestrator, merge_responses};
