//! Offline simulation client.
//!
//! Answers without any network access by reading the conversation:
//! trip questions become a `search_by_country` call, profile renames become
//! `update_user_name`, and tool results are summarized back to the user.
//! Tools are only requested when the request actually offers them.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::llm::{Completion, LlmClient, LlmRequest, Usage};
use parley_core::message::{Message, Role};
use parley_core::tool::{ToolArguments, ToolCall};
use tracing::debug;

const KNOWN_COUNTRIES: &[&str] = &["Spain", "France", "Italy", "Japan", "Thailand", "Peru"];

/// Keyword-driven stand-in for a real model.
pub struct SimulatedClient {
    name: String,
    default_user_id: String,
}

impl SimulatedClient {
    pub fn new() -> Self {
        Self {
            name: "simulated".into(),
            default_user_id: "1".into(),
        }
    }

    /// Register under a different client name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// User id used for profile tools when the message names none.
    pub fn with_default_user(mut self, user_id: impl Into<String>) -> Self {
        self.default_user_id = user_id.into();
        self
    }

    fn plan(&self, request: &LlmRequest) -> Completion {
        let trailing_tools: Vec<&Message> = request
            .messages
            .iter()
            .rev()
            .take_while(|m| m.role == Role::Tool)
            .collect();
        if !trailing_tools.is_empty() {
            return Completion::text(summarize(trailing_tools.into_iter().rev()));
        }

        let Some(user) = request.messages.iter().rev().find(|m| m.role == Role::User) else {
            return Completion::text("How can I help you today?");
        };
        let text = user.content.as_str();
        let lower = text.to_lowercase();
        let offers = |tool: &str| request.tools.iter().any(|t| t.name == tool);

        if lower.contains("update") && lower.contains("name") && offers("update_user_name") {
            if let Some(name) = word_after(text, " to ") {
                let id = word_after(&lower, "user ")
                    .filter(|w| w.chars().any(|c| c.is_ascii_digit()))
                    .unwrap_or_else(|| self.default_user_id.clone());
                let args = ToolArguments::new().with("id", id).with("name", name);
                return Completion::with_tool_calls(vec![ToolCall::generate(
                    "update_user_name",
                    args,
                )]);
            }
        }

        if lower.contains("details") && offers("get_travel_details") {
            if let Some(travel_id) = text
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .find(|w| w.starts_with("travel_"))
            {
                let args = ToolArguments::new().with("travelId", travel_id);
                return Completion::with_tool_calls(vec![ToolCall::generate(
                    "get_travel_details",
                    args,
                )]);
            }
        }

        if (lower.contains("travel") || lower.contains("trip")) && offers("search_by_country") {
            let country = country_in(text).unwrap_or_else(|| KNOWN_COUNTRIES[0].to_string());
            let args = ToolArguments::new().with("country", country);
            return Completion::with_tool_calls(vec![ToolCall::generate(
                "search_by_country",
                args,
            )]);
        }

        Completion::text(format!(
            "(simulated) I received your message: \"{}\". Ask me about a trip or your profile.",
            text.trim()
        ))
    }
}

impl Default for SimulatedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for SimulatedClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: LlmRequest) -> std::result::Result<Completion, ProviderError> {
        if request.messages.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "request carried no messages".into(),
            ));
        }

        let mut completion = self.plan(&request);
        completion.model = request.model.clone();

        let prompt_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        completion.usage = Some(Usage::new(
            estimate_tokens(prompt_chars),
            estimate_tokens(completion.content.len()),
        ));

        debug!(
            client = %self.name,
            tool_calls = completion.tool_calls.len(),
            "Simulated completion"
        );
        Ok(completion)
    }
}

fn estimate_tokens(chars: usize) -> u32 {
    chars.div_ceil(4) as u32
}

/// The word following `marker`, stripped of punctuation.
fn word_after(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let word: String = text[start..]
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string();
    (!word.is_empty()).then_some(word)
}

fn country_in(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    if let Some(known) = KNOWN_COUNTRIES
        .iter()
        .find(|c| lower.contains(&c.to_lowercase()))
    {
        return Some(known.to_string());
    }
    [" to ", " in "]
        .iter()
        .filter_map(|marker| word_after(text, marker))
        .find(|w| w.chars().next().is_some_and(char::is_uppercase))
}

fn summarize<'a>(results: impl Iterator<Item = &'a Message>) -> String {
    let mut lines = vec!["Here is what I found:".to_string()];
    for message in results {
        let line = match serde_json::from_str::<serde_json::Value>(&message.content) {
            Ok(serde_json::Value::Array(items)) => {
                let names: Vec<String> = items
                    .iter()
                    .map(|item| match (item.get("name"), item.get("price")) {
                        (Some(name), Some(price)) => format!(
                            "{} ({})",
                            name.as_str().unwrap_or_default(),
                            price.as_str().unwrap_or_default()
                        ),
                        _ => item.to_string(),
                    })
                    .collect();
                format!("- {} options: {}", items.len(), names.join(", "))
            }
            Ok(serde_json::Value::Object(map)) => match map.get("name").and_then(|n| n.as_str()) {
                Some(name) => format!("- {name}"),
                None => format!("- {}", message.content),
            },
            _ => format!("- {}", message.content),
        };
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::ConversationId;
    use parley_core::tool::{ToolAnnotations, ToolDefinition};

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: String::new(),
            parameters: serde_json::json!({"type": "object"}),
            annotations: ToolAnnotations::default(),
        }
    }

    fn request(text: &str, tools: &[&str]) -> LlmRequest {
        let conv = ConversationId::from("sim");
        let mut req = LlmRequest::new("gpt-4o-mini", vec![Message::user(&conv, text)]);
        req.tools = tools.iter().map(|t| tool(t)).collect();
        req
    }

    #[tokio::test]
    async fn trip_question_requests_country_search() {
        let client = SimulatedClient::new();
        let completion = client
            .complete(request("Plan a trip to Japan please", &["search_by_country"]))
            .await
            .unwrap();

        assert_eq!(completion.tool_calls.len(), 1);
        let call = &completion.tool_calls[0];
        assert_eq!(call.name, "search_by_country");
        assert_eq!(call.arguments.get_str("country"), Some("Japan"));
        assert_eq!(completion.model, "gpt-4o-mini");
        assert!(completion.usage.is_some());
    }

    #[tokio::test]
    async fn tools_are_not_requested_unless_offered() {
        let client = SimulatedClient::new();
        let completion = client
            .complete(request("Find me travel ideas", &[]))
            .await
            .unwrap();
        assert!(!completion.has_tool_calls());
        assert!(completion.content.contains("Find me travel ideas"));
    }

    #[tokio::test]
    async fn rename_parses_target_name() {
        let client = SimulatedClient::new();
        let completion = client
            .complete(request(
                "Please update my name to Alice.",
                &["update_user_name"],
            ))
            .await
            .unwrap();
        let call = &completion.tool_calls[0];
        assert_eq!(call.arguments.get_str("name"), Some("Alice"));
        assert_eq!(call.arguments.get_str("id"), Some("1"));
    }

    #[tokio::test]
    async fn tool_results_are_summarized() {
        let conv = ConversationId::from("sim");
        let call = ToolCall::new("call_1", "search_by_country", ToolArguments::new());
        let messages = vec![
            Message::user(&conv, "trip to Spain"),
            Message::assistant_tool_calls(&conv, "", vec![call]),
            Message::tool_result(
                &conv,
                "call_1",
                r#"[{"id":"travel_001","name":"Adventure in Spain","price":"$1200"}]"#,
            ),
        ];
        let completion = SimulatedClient::new()
            .complete(LlmRequest::new("m", messages))
            .await
            .unwrap();
        assert!(!completion.has_tool_calls());
        assert!(completion.content.contains("Adventure in Spain"));
    }

    #[tokio::test]
    async fn empty_request_is_malformed() {
        let err = SimulatedClient::new()
            .complete(LlmRequest::new("m", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }
}
