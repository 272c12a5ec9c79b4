//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, Venice, and any endpoint exposing
//! `/chat/completions`.
//!
//! The chat-completion schema has no place for images or tool structure in
//! history, so outbound translation is lossy: each message is flattened to
//! the concatenation of its text blocks and everything else is dropped and
//! counted. Inbound, structured function calls become `ToolUse` blocks with
//! ids minted here.

use async_trait::async_trait;
use autoloop_core::error::ProviderError;
use autoloop_core::message::{ContentBlock, Message};
use autoloop_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::http::{build_client, network_error, read_json};

/// Blocks dropped while flattening a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationLoss {
    pub images: usize,
    pub tool_uses: usize,
    pub tool_results: usize,
}

impl TranslationLoss {
    pub fn total(&self) -> usize {
        self.images + self.tool_uses + self.tool_results
    }

    fn record(&mut self, block: &ContentBlock) {
        match block {
            ContentBlock::Text { .. } => {}
            ContentBlock::Image(_) => self.images += 1,
            ContentBlock::ToolUse { .. } => self.tool_uses += 1,
            ContentBlock::ToolResult(_) => self.tool_results += 1,
        }
    }
}

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    function_calling: bool,
    /// Merged into the top level of every request body.
    extra_body: serde_json::Map<String, serde_json::Value>,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider with function calling enabled.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: build_client(Duration::from_secs(120)),
            function_calling: true,
            extra_body: serde_json::Map::new(),
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create a Venice provider.
    ///
    /// Venice does not accept function definitions, and its own system
    /// prompt is suppressed so ours is the only one in effect.
    pub fn venice(api_key: impl Into<String>) -> Self {
        Self::new("venice", "https://api.venice.ai/api/v1", api_key)
            .with_function_calling(false)
            .with_extra_body(serde_json::json!({
                "venice_parameters": { "include_venice_system_prompt": false }
            }))
    }

    pub fn with_function_calling(mut self, enabled: bool) -> Self {
        self.function_calling = enabled;
        self
    }

    /// Merge provider-specific parameters into the request body.
    ///
    /// Non-object values are ignored. Later keys win.
    pub fn with_extra_body(mut self, extra: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = extra {
            self.extra_body.extend(map);
        }
        self
    }

    pub fn supports_function_calling(&self) -> bool {
        self.function_calling
    }

    /// Convert our messages to chat-completion messages, flattening each
    /// to the concatenation of its text blocks.
    fn to_api_messages(system_prompt: &str, messages: &[Message]) -> (Vec<ApiMessage>, TranslationLoss) {
        let mut loss = TranslationLoss::default();
        let mut api = Vec::with_capacity(messages.len() + 1);

        if !system_prompt.is_empty() {
            api.push(ApiMessage {
                role: "system".into(),
                content: Some(system_prompt.into()),
                tool_calls: None,
            });
        }

        for message in messages {
            let mut content = String::new();
            for block in &message.content {
                match block {
                    ContentBlock::Text { text } => content.push_str(text),
                    other => loss.record(other),
                }
            }
            api.push(ApiMessage {
                role: message.role.as_str().into(),
                content: Some(content),
                tool_calls: None,
            });
        }

        (api, loss)
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn build_body(&self, request: &ProviderRequest) -> (serde_json::Value, TranslationLoss) {
        let (messages, loss) = Self::to_api_messages(&request.system_prompt, &request.messages);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
        });

        if self.function_calling && !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        if let serde_json::Value::Object(map) = &mut body {
            for (key, value) in &self.extra_body {
                map.insert(key.clone(), value.clone());
            }
        }

        (body, loss)
    }

    /// Convert the first choice into a reply.
    fn response_to_reply(&self, resp: ApiResponse) -> Result<ProviderReply, ProviderError> {
        let choice = resp.choices.into_iter().next().ok_or_else(|| {
            ProviderError::MalformedResponse(format!("{} returned no choices", self.name))
        })?;

        let mut content = vec![ContentBlock::text(choice.message.content.unwrap_or_default())];

        for call in choice.message.tool_calls.unwrap_or_default() {
            let input = serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                warn!(
                    provider = %self.name,
                    tool = %call.function.name,
                    error = %e,
                    "Unparseable function arguments, substituting empty object"
                );
                serde_json::json!({})
            });
            content.push(ContentBlock::ToolUse {
                id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
                name: call.function.name,
                input,
            });
        }

        let mut metadata = serde_json::Map::new();
        if let Some(id) = resp.id {
            metadata.insert("id".into(), serde_json::json!(id));
        }
        if let Some(reason) = choice.finish_reason {
            metadata.insert("finish_reason".into(), serde_json::json!(reason));
        }

        Ok(ProviderReply {
            content,
            model: resp.model,
            usage: resp.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            metadata,
        })
    }
}

#[async_trait]
impl autoloop_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderReply, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let (body, loss) = self.build_body(&request);

        if loss.total() > 0 {
            warn!(
                provider = %self.name,
                images = loss.images,
                tool_uses = loss.tool_uses,
                tool_results = loss.tool_results,
                "Dropped blocks with no chat-completion representation"
            );
        }

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let api_response: ApiResponse = read_json(&self.name, response).await?;
        self.response_to_reply(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: Option<String>,
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
