//! Travel search tool set: stub that returns mock travel packages.
//!
//! In production this would query a booking backend. The stub returns
//! plausible, deterministic packages so full turns (tool call, tool result,
//! follow-up answer) can be exercised without network access.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{
    ToolAnnotations, ToolCall, ToolDebugSink, ToolDefinition, ToolResponse, ToolSet,
};
use serde::Serialize;
use std::time::Duration;

use crate::{finish, require_args};

pub const TOOL_SET_ID: &str = "travel-search-toolset";

const SEARCH_BY_COUNTRY: &str = "search_by_country";
const SEARCH_ADVANCED: &str = "search_travels_advanced";
const GET_DETAILS: &str = "get_travel_details";

pub struct TravelToolSet {
    latency: Duration,
}

impl TravelToolSet {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
        }
    }

    /// Simulated backend latency applied to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn run(&self, call: &ToolCall) -> Result<String, ToolError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match call.name.as_str() {
            SEARCH_BY_COUNTRY => {
                let country = call.arguments.require_str("country")?;
                to_json(&call.name, &search_by_country(country))
            }
            SEARCH_ADVANCED => {
                let days = call.arguments.get_i64("days").unwrap_or(7);
                let budget = call.arguments.get_i64("budget").unwrap_or(1000);
                let interests = call.arguments.get_str("interests").unwrap_or("general");
                to_json(&call.name, &search_advanced(days, budget, interests))
            }
            GET_DETAILS => {
                let travel_id = call.arguments.require_str("travelId")?;
                to_json(&call.name, &travel_details(travel_id))
            }
            other => Err(ToolError::NotFound(other.to_string())),
        }
    }
}

impl Default for TravelToolSet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolSet for TravelToolSet {
    fn tool_set_id(&self) -> &str {
        TOOL_SET_ID
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: SEARCH_BY_COUNTRY.into(),
                description: "Search travel packages available in a destination country.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "country": { "type": "string", "description": "Destination country" }
                    },
                    "required": ["country"]
                }),
                annotations: read_only("Search Travels by Country", false),
            },
            ToolDefinition {
                name: SEARCH_ADVANCED.into(),
                description: "Search travel packages by duration, budget and interests.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "days": { "type": "integer", "description": "Number of days (optional)" },
                        "budget": { "type": "integer", "description": "Budget in USD (optional)" },
                        "interests": { "type": "string", "description": "Travel interests (optional)" }
                    },
                    "required": []
                }),
                annotations: read_only("Advanced Travel Search", true),
            },
            ToolDefinition {
                name: GET_DETAILS.into(),
                description: "Get the full itinerary and inclusions of a travel package.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "travelId": { "type": "string", "description": "Travel identifier" }
                    },
                    "required": ["travelId"]
                }),
                annotations: read_only("Get Travel Details", false),
            },
        ]
    }

    fn supports(&self, tool_name: &str) -> bool {
        matches!(tool_name, SEARCH_BY_COUNTRY | SEARCH_ADVANCED | GET_DETAILS)
    }

    async fn validate(&self, call: &ToolCall) -> Result<(), ToolError> {
        match call.name.as_str() {
            SEARCH_BY_COUNTRY => require_args(call, &["country"]),
            GET_DETAILS => require_args(call, &["travelId"]),
            SEARCH_ADVANCED => Ok(()),
            other => Err(ToolError::NotFound(other.to_string())),
        }
    }

    async fn execute(&self, call: &ToolCall, sink: Option<&dyn ToolDebugSink>) -> ToolResponse {
        let result = self.run(call).await;
        finish(TOOL_SET_ID, call, result, sink)
    }
}

fn read_only(title: &str, open_world: bool) -> ToolAnnotations {
    ToolAnnotations {
        title: Some(title.into()),
        read_only_hint: true,
        destructive_hint: false,
        idempotent_hint: true,
        open_world_hint: open_world,
    }
}

fn to_json<T: Serialize>(tool_name: &str, value: &T) -> Result<String, ToolError> {
    serde_json::to_string(value).map_err(|e| ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Serialize)]
struct TravelPackage {
    id: String,
    name: String,
    duration: String,
    price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    interests: Option<String>,
}

#[derive(Debug, Serialize)]
struct TravelDetails {
    id: String,
    name: String,
    description: String,
    duration: String,
    price: String,
    destinations: Vec<&'static str>,
    activities: Vec<&'static str>,
    includes: Vec<&'static str>,
    difficulty: String,
    group_size: String,
}

fn package(id: &str, name: String, days: i64, price: i64, interests: Option<String>) -> TravelPackage {
    TravelPackage {
        id: id.into(),
        name,
        duration: format!("{days} days"),
        price: format!("${price}"),
        interests,
    }
}

fn search_by_country(country: &str) -> Vec<TravelPackage> {
    vec![
        package("travel_001", format!("Adventure in {country}"), 7, 1200, None),
        package("travel_002", format!("Cultural Tour {country}"), 5, 800, None),
        package("travel_003", format!("Luxury Experience {country}"), 10, 2500, None),
    ]
}

fn search_advanced(days: i64, budget: i64, interests: &str) -> Vec<TravelPackage> {
    let alternative = if interests == "general" {
        "adventure"
    } else {
        interests
    };
    vec![
        package(
            "travel_004",
            "Custom Adventure".into(),
            days,
            budget,
            Some(interests.into()),
        ),
        package(
            "travel_005",
            "Tailored Experience".into(),
            days + 2,
            budget + 300,
            Some(alternative.into()),
        ),
    ]
}

fn travel_details(travel_id: &str) -> TravelDetails {
    TravelDetails {
        id: travel_id.into(),
        name: "Amazing Travel Experience".into(),
        description: "A comprehensive travel package with amazing destinations".into(),
        duration: "7 days".into(),
        price: "$1500".into(),
        destinations: vec!["City A", "City B", "City C"],
        activities: vec!["Sightseeing", "Adventure sports", "Cultural visits"],
        includes: vec!["Accommodation", "Meals", "Transportation", "Guide"],
        difficulty: "Moderate".into(),
        group_size: "8-12 people".into(),
    }
}
