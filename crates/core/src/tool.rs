//! ToolSet trait: the abstraction over agent capabilities.
//!
//! A ToolSet groups related tools (user management, travel search, ...).
//! Agents reach tools only through the [`ToolSetRegistry`], which maps each
//! tool name to the single ToolSet that claims it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, ErrorKind, ToolError};

/// A loosely-typed tool argument value decoded from the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// An explicit JSON `null`; lookups treat it as absent.
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ArgValue>),
    Map(BTreeMap<String, ArgValue>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgValue::String(s) => f.write_str(s),
            ArgValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            ArgValue::Number(n) => write!(f, "{n}"),
            ArgValue::Bool(b) => write!(f, "{b}"),
            other => {
                let json = serde_json::to_string(other).map_err(|_| std::fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::String(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::String(s)
    }
}

impl From<f64> for ArgValue {
    fn from(n: f64) -> Self {
        ArgValue::Number(n)
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        ArgValue::Number(n as f64)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

impl From<Vec<ArgValue>> for ArgValue {
    fn from(items: Vec<ArgValue>) -> Self {
        ArgValue::Array(items)
    }
}

/// Flat key → value argument map of a tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArguments(BTreeMap<String, ArgValue>);

impl ToolArguments {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Decode the JSON object an LLM sends as the `arguments` of a tool call.
    ///
    /// An empty string is treated as "no arguments".
    pub fn from_json_str(raw: &str) -> Result<Self, Error> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(raw)
            .map_err(|e| Error::InvalidInput(format!("malformed tool arguments: {e}")))
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ArgValue::as_str)
    }

    /// Integer view of a numeric (or numeric string) argument.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            ArgValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            ArgValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ArgValue::as_bool)
    }

    /// A required, non-empty string argument.
    pub fn require_str(&self, key: &str) -> Result<&str, ToolError> {
        match self.get(key) {
            Some(ArgValue::String(s)) if !s.trim().is_empty() => Ok(s),
            Some(ArgValue::Null) | None => Err(ToolError::InvalidArguments(format!(
                "Missing '{key}' argument"
            ))),
            Some(_) => Err(ToolError::InvalidArguments(format!(
                "'{key}' must be a non-empty string"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.0.iter()
    }

    /// Compact `key=value` rendering for logs.
    pub fn summary(&self) -> String {
        if self.0.is_empty() {
            return "(none)".into();
        }
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    pub arguments: ToolArguments,

    pub call_timestamp: DateTime<Utc>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            call_timestamp: Utc::now(),
        }
    }

    /// A call with a freshly generated id.
    pub fn generate(name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self::new(format!("call_{}", Uuid::new_v4().simple()), name, arguments)
    }
}

/// The outcome of one tool call. Failures are data, never panics or `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub tool_call_id: String,
    pub tool_name: String,

    /// Serialized result (typically JSON text); on failure, the error text
    /// that is shown to the model.
    pub content: String,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    pub response_timestamp: DateTime<Utc>,
}

impl ToolResponse {
    pub fn success(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: content.into(),
            success: true,
            error_message: None,
            error_kind: None,
            response_timestamp: Utc::now(),
        }
    }

    pub fn failure(call: &ToolCall, kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: format!("Error: {message}"),
            success: false,
            error_message: Some(message),
            error_kind: Some(kind),
            response_timestamp: Utc::now(),
        }
    }

    pub fn from_error(call: &ToolCall, error: &ToolError) -> Self {
        Self::failure(call, error.kind(), error.to_string())
    }
}

/// Behavioural hints shown alongside a tool definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolAnnotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub read_only_hint: bool,
    #[serde(default)]
    pub destructive_hint: bool,
    #[serde(default)]
    pub idempotent_hint: bool,
    #[serde(default)]
    pub open_world_hint: bool,
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,

    #[serde(default)]
    pub annotations: ToolAnnotations,
}

impl ToolDefinition {
    /// `{name, description, parameters}`: the shape LLM clients receive.
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }
}

/// Observer for tool executions, supplied per call.
pub trait ToolDebugSink: Send + Sync {
    fn on_tool_executed(&self, tool_name: &str, tool_set_id: &str, arguments: &str, response: &str);

    fn on_tool_error(&self, tool_name: &str, tool_set_id: &str, error: &str);
}

/// The core ToolSet trait.
///
/// `execute` never fails: every problem is reported through a
/// `ToolResponse { success: false, .. }`.
#[async_trait]
pub trait ToolSet: Send + Sync {
    /// Stable identifier, e.g. "travel-search-toolset".
    fn tool_set_id(&self) -> &str;

    /// Definitions of every tool this set implements.
    fn list_tools(&self) -> Vec<ToolDefinition>;

    fn supports(&self, tool_name: &str) -> bool;

    /// Cheap pre-flight check of a call before it is executed.
    async fn validate(&self, call: &ToolCall) -> Result<(), ToolError> {
        if self.supports(&call.name) {
            Ok(())
        } else {
            Err(ToolError::NotFound(call.name.clone()))
        }
    }

    async fn execute(&self, call: &ToolCall, sink: Option<&dyn ToolDebugSink>) -> ToolResponse;
}

/// Capability-keyed registry of ToolSets.
///
/// Every tool name is claimed by at most one set; lookups go straight from
/// the name to its owner.
pub struct ToolSetRegistry {
    sets: HashMap<String, Arc<dyn ToolSet>>,
    order: Vec<String>,
    claims: HashMap<String, String>,
}

impl ToolSetRegistry {
    pub fn new() -> Self {
        Self {
            sets: HashMap::new(),
            order: Vec::new(),
            claims: HashMap::new(),
        }
    }

    /// Register a ToolSet. Nothing is registered if its id or any of its
    /// tool names is already taken.
    pub fn register(&mut self, tool_set: Arc<dyn ToolSet>) -> Result<(), ToolError> {
        let set_id = tool_set.tool_set_id().to_string();
        if self.sets.contains_key(&set_id) {
            return Err(ToolError::AlreadyClaimed {
                tool_name: set_id.clone(),
                tool_set_id: set_id,
            });
        }

        let names: Vec<String> = tool_set.list_tools().into_iter().map(|d| d.name).collect();
        for name in &names {
            if let Some(owner) = self.claims.get(name) {
                return Err(ToolError::AlreadyClaimed {
                    tool_name: name.clone(),
                    tool_set_id: owner.clone(),
                });
            }
        }

        for name in names {
            self.claims.insert(name, set_id.clone());
        }
        debug!(tool_set = %set_id, "ToolSet registered");
        self.order.push(set_id.clone());
        self.sets.insert(set_id, tool_set);
        Ok(())
    }

    /// Remove a ToolSet and release its tool names.
    pub fn unregister(&mut self, tool_set_id: &str) -> bool {
        if self.sets.remove(tool_set_id).is_none() {
            return false;
        }
        self.order.retain(|id| id != tool_set_id);
        self.claims.retain(|_, owner| owner != tool_set_id);
        debug!(tool_set = %tool_set_id, "ToolSet unregistered");
        true
    }

    /// The ToolSet that owns `tool_name`, if any.
    pub fn resolve(&self, tool_name: &str) -> Option<Arc<dyn ToolSet>> {
        let owner = self.claims.get(tool_name)?;
        self.sets
            .get(owner)
            .filter(|set| set.supports(tool_name))
            .cloned()
    }

    pub fn tool_set(&self, tool_set_id: &str) -> Option<Arc<dyn ToolSet>> {
        self.sets.get(tool_set_id).cloned()
    }

    /// Registered ToolSet ids in registration order.
    pub fn tool_set_ids(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Resolve an agent's tool identifiers into definitions.
    ///
    /// An identifier names either a whole ToolSet or a single tool.
    /// Unknown identifiers are skipped; each tool appears once, in the
    /// order its identifier was listed.
    pub fn catalogue_for(&self, identifiers: &[String]) -> Vec<ToolDefinition> {
        let mut seen = HashSet::new();
        let mut catalogue = Vec::new();

        for identifier in identifiers {
            let definitions = if let Some(set) = self.sets.get(identifier) {
                set.list_tools()
            } else if let Some(set) = self.resolve(identifier) {
                set.list_tools()
                    .into_iter()
                    .filter(|d| d.name == *identifier)
                    .collect()
            } else {
                warn!(identifier = %identifier, "Unknown tool identifier in agent configuration");
                continue;
            };

            for definition in definitions {
                if seen.insert(definition.name.clone()) {
                    catalogue.push(definition);
                }
            }
        }

        catalogue
    }

    /// Every tool definition across all sets (registration order).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|id| self.sets.get(id))
            .flat_map(|set| set.list_tools())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl Default for ToolSetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple tool set for unit tests.
    struct EchoToolSet {
        id: &'static str,
        tools: Vec<&'static str>,
    }

    #[async_trait]
    impl ToolSet for EchoToolSet {
        fn tool_set_id(&self) -> &str {
            self.id
        }

        fn list_tools(&self) -> Vec<ToolDefinition> {
            self.tools
                .iter()
                .map(|name| ToolDefinition {
                    name: name.to_string(),
                    description: "Echoes back the input".into(),
                    parameters: serde_json::json!({
                        "type": "object",
                        "properties": { "text": { "type": "string" } },
                        "required": ["text"]
                    }),
                    annotations: ToolAnnotations::default(),
                })
                .collect()
        }

        fn supports(&self, tool_name: &str) -> bool {
            self.tools.contains(&tool_name)
        }

        async fn execute(&self, call: &ToolCall, _sink: Option<&dyn ToolDebugSink>) -> ToolResponse {
            match call.arguments.require_str("text") {
                Ok(text) => ToolResponse::success(call, text),
                Err(e) => ToolResponse::from_error(call, &e),
            }
        }
    }

    fn echo(id: &'static str, tools: Vec<&'static str>) -> Arc<dyn ToolSet> {
        Arc::new(EchoToolSet { id, tools })
    }

    #[test]
    fn arguments_decode_from_wire() {
        let args = ToolArguments::from_json_str(
            r#"{"country":"Spain","days":7,"flexible":true,"tags":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(args.get_str("country"), Some("Spain"));
        assert_eq!(args.get_i64("days"), Some(7));
        assert_eq!(args.get_bool("flexible"), Some(true));
        assert!(matches!(args.get("tags"), Some(ArgValue::Array(items)) if items.len() == 2));
    }

    #[test]
    fn null_arguments_read_as_absent() {
        let args =
            ToolArguments::from_json_str(r#"{"country":"Spain","days":null,"budget":null}"#)
                .unwrap();
        assert_eq!(args.get("days"), Some(&ArgValue::Null));
        assert_eq!(args.get_i64("days"), None);
        assert_eq!(args.get_str("budget"), None);
        assert_eq!(args.get_str("country"), Some("Spain"));
        assert!(args
            .require_str("budget")
            .unwrap_err()
            .to_string()
            .contains("Missing 'budget'"));
        assert_eq!(args.summary(), "budget=null, country=Spain, days=null");
    }

    #[test]
    fn malformed_arguments_are_invalid_input() {
        let err = ToolArguments::from_json_str("{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(ToolArguments::from_json_str("").unwrap().is_empty());
    }

    #[test]
    fn require_str_reports_missing_and_mistyped() {
        let args = ToolArguments::new().with("id", 5i64);
        assert!(matches!(
            args.require_str("id"),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(args.require_str("name").unwrap_err().to_string().contains("name"));
    }

    #[test]
    fn numeric_strings_read_as_integers() {
        let args = ToolArguments::new().with("budget", "1500");
        assert_eq!(args.get_i64("budget"), Some(1500));
    }

    #[test]
    fn failure_response_carries_kind_and_text() {
        let call = ToolCall::new("call_1", "missing", ToolArguments::new());
        let resp = ToolResponse::failure(&call, ErrorKind::ToolNotFound, "Tool missing not found");
        assert!(!resp.success);
        assert_eq!(resp.tool_call_id, "call_1");
        assert_eq!(resp.error_kind, Some(ErrorKind::ToolNotFound));
        assert!(resp.content.starts_with("Error:"));
    }

    #[test]
    fn registry_register_and_resolve() {
        let mut registry = ToolSetRegistry::new();
        registry.register(echo("echo-set", vec!["echo", "shout"])).unwrap();

        assert!(registry.resolve("echo").is_some());
        assert!(registry.resolve("nonexistent").is_none());
        assert_eq!(registry.tool_set_ids(), vec!["echo-set"]);
        assert_eq!(registry.definitions().len(), 2);
    }

    #[test]
    fn registry_rejects_second_claim_on_a_tool() {
        let mut registry = ToolSetRegistry::new();
        registry.register(echo("first", vec!["echo"])).unwrap();

        let err = registry
            .register(echo("second", vec!["other", "echo"]))
            .unwrap_err();
        assert!(matches!(err, ToolError::AlreadyClaimed { ref tool_set_id, .. } if tool_set_id == "first"));
        // Nothing from the rejected set leaked in.
        assert!(registry.resolve("other").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_releases_names() {
        let mut registry = ToolSetRegistry::new();
        registry.register(echo("first", vec!["echo"])).unwrap();
        assert!(registry.unregister("first"));
        assert!(registry.resolve("echo").is_none());
        registry.register(echo("second", vec!["echo"])).unwrap();
        assert!(registry.resolve("echo").is_some());
    }

    #[test]
    fn catalogue_mixes_sets_and_single_tools() {
        let mut registry = ToolSetRegistry::new();
        registry.register(echo("a-set", vec!["a1", "a2"])).unwrap();
        registry.register(echo("b-set", vec!["b1", "b2"])).unwrap();

        let ids = vec![
            "b1".to_string(),
            "a-set".to_string(),
            "unknown".to_string(),
            "a1".to_string(),
        ];
        let names: Vec<String> = registry
            .catalogue_for(&ids)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["b1", "a1", "a2"]);
    }

    #[tokio::test]
    async fn execute_through_resolved_set() {
        let mut registry = ToolSetRegistry::new();
        registry.register(echo("echo-set", vec!["echo"])).unwrap();

        let call = ToolCall::new(
            "call_1",
            "echo",
            ToolArguments::new().with("text", "hello world"),
        );
        let set = registry.resolve(&call.name).unwrap();
        set.validate(&call).await.unwrap();
        let result = set.execute(&call, None).await;
        assert!(result.success);
        assert_eq!(result.content, "hello world");
    }

    #[test]
    fn definition_wire_shape() {
        let def = ToolDefinition {
            name: "search_by_country".into(),
            description: "Search".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}, "required": []}),
            annotations: ToolAnnotations {
                read_only_hint: true,
                ..Default::default()
            },
        };
        let wire = def.to_wire();
        assert_eq!(wire["name"], "search_by_country");
        assert_eq!(wire["parameters"]["type"], "object");
        assert!(wire.get("annotations").is_none());
    }
}
