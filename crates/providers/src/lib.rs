//! LLM client implementations for Parley.
//!
//! All clients implement the `parley_core::LlmClient` trait.
//! The router selects the correct client for each agent's request.

pub mod router;
pub mod simulated;

pub use router::{ClientRouter, build_from_config};
pub use simulated::SimulatedClient;
