//! Anthropic-backed intent resolver
//!
//! Uses a single forced tool call so the model's answer is always a
//! structured classification rather than prose.

use super::{IntentOutcome, IntentResolver, ResolverError};
use crate::orders::OrderSnapshot;
use crate::session::ConvState;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
const CLASSIFY_TOOL: &str = "classify_intent";

const SYSTEM_PROMPT: &str = "You are the intent classifier for a courier \
order-tracking assistant. Classify the user's message into exactly one \
action via the classify_intent tool. Use order-status for questions about \
where a shipment is, order-details for requests for full order information, \
order-reschedule when the user wants to change the delivery date, greeting \
and farewell for salutations, and none for anything else. If the message \
contains a tracking id (AWB followed by six digits), echo it in tracking_id.";

/// Resolver calling the Anthropic Messages API
pub struct AnthropicResolver {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicResolver {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL.to_string())
    }

    pub fn with_model(api_key: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            model,
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
        }
    }

    fn build_request(
        &self,
        text: &str,
        state: ConvState,
        order: Option<&OrderSnapshot>,
    ) -> ApiRequest {
        let context = match order {
            Some(o) => format!(
                "Conversation state: {}. Current order: {} ({}).",
                state.as_str(),
                o.tracking_id,
                o.status
            ),
            None => format!("Conversation state: {}. No order in context.", state.as_str()),
        };

        ApiRequest {
            model: self.model.clone(),
            max_tokens: 256,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: format!("{context}\n\nUser message: {text}"),
            }],
            tools: vec![ApiTool {
                name: CLASSIFY_TOOL.to_string(),
                description: "Report the classified intent of the user's message".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "action": {
                            "type": "string",
                            "enum": [
                                "order-status",
                                "order-details",
                                "order-reschedule",
                                "greeting",
                                "farewell",
                                "none"
                            ]
                        },
                        "tracking_id": { "type": "string" }
                    },
                    "required": ["action"]
                }),
            }],
            tool_choice: json!({ "type": "tool", "name": CLASSIFY_TOOL }),
        }
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> ResolverError {
        match status.as_u16() {
            401 | 403 => ResolverError::auth(format!("Authentication failed: {body}")),
            429 => ResolverError::rate_limit(format!("Rate limited: {body}")),
            400 => ResolverError::invalid_request(format!("Invalid request: {body}")),
            500..=599 => ResolverError::server_error(format!("Server error: {body}")),
            _ => ResolverError::unknown(format!("HTTP {status}: {body}")),
        }
    }

    fn extract_outcome(response: &ApiResponse) -> Result<IntentOutcome, ResolverError> {
        let input = response
            .content
            .iter()
            .find_map(|block| match block {
                ApiContentBlock::ToolUse { name, input, .. } if name == CLASSIFY_TOOL => {
                    Some(input.clone())
                }
                _ => None,
            })
            .ok_or_else(|| ResolverError::parse("Response contained no classification"))?;

        serde_json::from_value(input)
            .map_err(|e| ResolverError::parse(format!("Bad classification payload: {e}")))
    }
}

#[async_trait]
impl IntentResolver for AnthropicResolver {
    async fn resolve(
        &self,
        text: &str,
        state: ConvState,
        order: Option<&OrderSnapshot>,
    ) -> Result<IntentOutcome, ResolverError> {
        let request = self.build_request(text, state, order);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResolverError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    ResolverError::network(format!("Connection failed: {e}"))
                } else {
                    ResolverError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ResolverError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let api_response: ApiResponse = serde_json::from_str(&body)
            .map_err(|e| ResolverError::parse(format!("Failed to parse response: {e}")))?;

        Self::extract_outcome(&api_response)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ApiMessage>,
    tools: Vec<ApiTool>,
    tool_choice: Value,
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        #[allow(dead_code)]
        text: String,
    },
    ToolUse {
        #[allow(dead_code)]
        id: String,
        name: String,
        input: Value,
    },
}
