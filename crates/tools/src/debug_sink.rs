//! Tool debug sinks.
//!
//! A sink observes tool executions without touching the conversation.
//! `TracingDebugSink` forwards to the log; `CollectingDebugSink` keeps the
//! records in memory so a caller can render or assert on them.

use parley_core::tool::ToolDebugSink;
use std::sync::Mutex;
use tracing::{debug, warn};

const MAX_RESPONSE_CHARS: usize = 200;

/// One observed tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionRecord {
    pub tool_name: String,
    pub tool_set_id: String,
    pub arguments: String,
    /// Response text, truncated to 200 characters
    pub response: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolErrorRecord {
    pub tool_name: String,
    pub tool_set_id: String,
    pub error: String,
}

/// Records every execution and error it is shown.
#[derive(Default)]
pub struct CollectingDebugSink {
    executions: Mutex<Vec<ToolExecutionRecord>>,
    errors: Mutex<Vec<ToolErrorRecord>>,
}

impl CollectingDebugSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executions(&self) -> Vec<ToolExecutionRecord> {
        self.executions
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<ToolErrorRecord> {
        self.errors
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Human-readable lines, one per record (executions first).
    pub fn render(&self) -> Vec<String> {
        let executed = self.executions().into_iter().map(|r| {
            format!(
                "Tool executed: {} from {}\nParameters: {}\nResult: {}",
                r.tool_name, r.tool_set_id, r.arguments, r.response
            )
        });
        let failed = self.errors().into_iter().map(|r| {
            format!(
                "Tool error: {} from {}\nError: {}",
                r.tool_name, r.tool_set_id, r.error
            )
        });
        executed.chain(failed).collect()
    }
}

impl ToolDebugSink for CollectingDebugSink {
    fn on_tool_executed(&self, tool_name: &str, tool_set_id: &str, arguments: &str, response: &str) {
        if let Ok(mut records) = self.executions.lock() {
            records.push(ToolExecutionRecord {
                tool_name: tool_name.into(),
                tool_set_id: tool_set_id.into(),
                arguments: arguments.into(),
                response: truncate(response, MAX_RESPONSE_CHARS),
            });
        }
    }

    fn on_tool_error(&self, tool_name: &str, tool_set_id: &str, error: &str) {
        if let Ok(mut records) = self.errors.lock() {
            records.push(ToolErrorRecord {
                tool_name: tool_name.into(),
                tool_set_id: tool_set_id.into(),
                error: error.into(),
            });
        }
    }
}

/// Forwards tool activity to `tracing`.
pub struct TracingDebugSink;

impl ToolDebugSink for TracingDebugSink {
    fn on_tool_executed(&self, tool_name: &str, tool_set_id: &str, arguments: &str, response: &str) {
        debug!(
            tool = %tool_name,
            tool_set = %tool_set_id,
            arguments = %arguments,
            response = %truncate(response, MAX_RESPONSE_CHARS),
            "Tool executed"
        );
    }

    fn on_tool_error(&self, tool_name: &str, tool_set_id: &str, error: &str) {
        warn!(tool = %tool_name, tool_set = %tool_set_id, error = %error, "Tool error");
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_responses_are_truncated() {
        let sink = CollectingDebugSink::new();
        let long = "x".repeat(500);
        sink.on_tool_executed("search_by_country", "travel-search-toolset", "country=Spain", &long);

        let record = &sink.executions()[0];
        assert_eq!(record.response.len(), MAX_RESPONSE_CHARS + 3);
        assert!(record.response.ends_with("..."));
    }

    #[test]
    fn render_lists_executions_then_errors() {
        let sink = CollectingDebugSink::new();
        sink.on_tool_error("update_user_name", "user-management-toolset", "Missing 'name'");
        sink.on_tool_executed("get_travel_details", "travel-search-toolset", "travelId=travel_001", "{}");

        let lines = sink.render();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Tool executed: get_travel_details"));
        assert!(lines[1].contains("Missing 'name'"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("short", 10), "short");
    }
}
