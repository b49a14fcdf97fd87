//! Reference tool sets for Parley.
//!
//! Tool sets give agents the ability to act: search travel packages and
//! edit user profiles. Both are backed by deterministic mock data so full
//! turns can run offline.

pub mod debug_sink;
pub mod travel_search;
pub mod user_management;

use parley_core::error::ToolError;
use parley_core::tool::{ToolCall, ToolDebugSink, ToolResponse, ToolSetRegistry};
use std::sync::Arc;
use tracing::{debug, warn};

pub use debug_sink::{CollectingDebugSink, TracingDebugSink};
pub use travel_search::TravelToolSet;
pub use user_management::{UserProfile, UserToolSet};

/// Create a registry with both reference tool sets.
pub fn default_registry() -> Result<ToolSetRegistry, ToolError> {
    let mut registry = ToolSetRegistry::new();
    registry.register(Arc::new(TravelToolSet::new()))?;
    registry.register(Arc::new(UserToolSet::new()))?;
    Ok(registry)
}

/// Every listed argument must be a non-empty string.
pub(crate) fn require_args(call: &ToolCall, keys: &[&str]) -> Result<(), ToolError> {
    keys.iter()
        .try_for_each(|key| call.arguments.require_str(key).map(|_| ()))
}

/// Turn a tool outcome into a response and report it to the sink.
pub(crate) fn finish(
    tool_set_id: &str,
    call: &ToolCall,
    result: Result<String, ToolError>,
    sink: Option<&dyn ToolDebugSink>,
) -> ToolResponse {
    match result {
        Ok(content) => {
            debug!(tool = %call.name, tool_set = %tool_set_id, "Tool response");
            if let Some(sink) = sink {
                sink.on_tool_executed(&call.name, tool_set_id, &call.arguments.summary(), &content);
            }
            ToolResponse::success(call, content)
        }
        Err(e) => {
            warn!(tool = %call.name, tool_set = %tool_set_id, error = %e, "Tool failed");
            if let Some(sink) = sink {
                sink.on_tool_error(&call.name, tool_set_id, &e.to_string());
            }
            ToolResponse::from_error(call, &e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::tool::ToolArguments;

    #[test]
    fn default_registry_claims_every_tool_once() {
        let registry = default_registry().unwrap();
        assert_eq!(
            registry.tool_set_ids(),
            vec!["travel-search-toolset", "user-management-toolset"]
        );
        assert_eq!(registry.definitions().len(), 6);
        assert!(registry.resolve("search_by_country").is_some());
        assert!(registry.resolve("add_user_comment").is_some());
    }

    #[test]
    fn second_travel_set_is_rejected() {
        let mut registry = default_registry().unwrap();
        assert!(matches!(
            registry.register(Arc::new(TravelToolSet::new())),
            Err(ToolError::AlreadyClaimed { .. })
        ));
    }

    #[test]
    fn require_args_stops_at_first_missing() {
        let call = ToolCall::new(
            "c",
            "add_user_comment",
            ToolArguments::new().with("id", "1"),
        );
        let err = require_args(&call, &["id", "travelId", "comment"]).unwrap_err();
        assert!(err.to_string().contains("travelId"));
    }
}
