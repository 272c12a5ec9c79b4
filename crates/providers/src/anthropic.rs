//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly. The internal content model already
//! matches this schema block for block, so translation is a reshaping only:
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header, plus the computer-use beta flag
//! - System prompt as top-level field
//! - Images as base64 `source` objects
//! - Native `tool_use` / `tool_result` content blocks

use async_trait::async_trait;
use autoloop_core::error::ProviderError;
use autoloop_core::message::{ContentBlock, ImageSource, Message, ToolResultBlock};
use autoloop_core::provider::*;
use autoloop_core::text::truncate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::http::{build_client, network_error, read_json};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Capability flag that unlocks the computer-use tool types.
pub const COMPUTER_USE_BETA: &str = "computer-use-2024-10-22";

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    /// Sent as `anthropic-beta` when set.
    beta_flag: Option<String>,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client(Duration::from_secs(300)),
            beta_flag: Some(COMPUTER_USE_BETA.into()),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the beta capability flag.
    pub fn with_beta_flag(mut self, flag: impl Into<String>) -> Self {
        self.beta_flag = Some(flag.into());
        self
    }

    /// Send no beta flag at all.
    pub fn without_beta_flag(mut self) -> Self {
        self.beta_flag = None;
        self
    }

    /// Convert messages to Anthropic API format with content blocks.
    fn to_api_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
        messages
            .iter()
            .map(|msg| AnthropicMessage {
                role: msg.role.as_str().into(),
                content: msg.content.iter().map(Self::to_api_block).collect(),
            })
            .collect()
    }

    fn to_api_block(block: &ContentBlock) -> ContentBlockParam {
        match block {
            ContentBlock::Text { text } => ContentBlockParam::Text { text: text.clone() },
            ContentBlock::Image(image) => ContentBlockParam::Image {
                source: ImageSourceParam::from(image),
            },
            ContentBlock::ToolUse { id, name, input } => ContentBlockParam::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentBlock::ToolResult(result) => Self::to_api_tool_result(result),
        }
    }

    fn to_api_tool_result(result: &ToolResultBlock) -> ContentBlockParam {
        let mut content = Vec::new();
        // The API rejects empty text blocks.
        if let Some(text) = result.text.as_deref().filter(|t| !t.is_empty()) {
            content.push(ToolResultContent::Text { text: text.to_string() });
        }
        if let Some(image) = &result.image {
            content.push(ToolResultContent::Image {
                source: ImageSourceParam::from(image),
            });
        }
        ContentBlockParam::ToolResult {
            tool_use_id: result.tool_use_id.clone(),
            content,
            is_error: result.is_error,
        }
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": Self::to_api_messages(&request.messages),
        });

        if !request.system_prompt.is_empty() {
            body["system"] = serde_json::json!(request.system_prompt);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// Convert Anthropic API response to our ProviderReply.
    fn response_to_reply(resp: AnthropicResponse) -> ProviderReply {
        let mut content = Vec::with_capacity(resp.content.len());
        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text } => content.push(ContentBlock::Text { text }),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    content.push(ContentBlock::ToolUse { id, name, input })
                }
                ResponseContentBlock::Other => {
                    trace!("Skipping unsupported Anthropic content block");
                }
            }
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("id".into(), serde_json::json!(resp.id));
        if let Some(reason) = resp.stop_reason {
            metadata.insert("stop_reason".into(), serde_json::json!(reason));
        }

        ProviderReply {
            content,
            model: resp.model,
            usage: Some(Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
            }),
            metadata,
        }
    }
}

#[async_trait]
impl autoloop_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderReply, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = "anthropic",
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending messages request"
        );
        trace!(body = %truncate(&body.to_string()), "Anthropic request body");

        let mut builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if let Some(flag) = &self.beta_flag {
            builder = builder.header("anthropic-beta", flag);
        }

        let response = builder.json(&body).send().await.map_err(network_error)?;
        let api_resp: AnthropicResponse = read_json(&self.name, response).await?;

        Ok(Self::response_to_reply(api_resp))
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlockParam>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlockParam {
    Text { text: String },
    Image { source: ImageSourceParam },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Vec<ToolResultContent>,
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolResultContent {
    Text { text: String },
    Image { source: ImageSourceParam },
}

#[derive(Debug, Serialize)]
struct ImageSourceParam {
    r#type: &'static str,
    media_type: String,
    data: String,
}

impl From<&ImageSource> for ImageSourceParam {
    fn from(image: &ImageSource) -> Self {
        Self {
            r#type: "base64",
            media_type: image.media_type.clone(),
            data: image.to_base64(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseContentBlock {
    Text { text: String },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
