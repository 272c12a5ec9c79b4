//! Message and Conversation domain types.
//!
//! These are the core value objects that flow through the entire system:
//! the loop appends them, the pruner trims images out of them, and every
//! provider adapter translates them to and from its wire schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::text;
use crate::tool::ToolOutput;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
///
/// The system prompt is not a message; it travels beside the history in
/// every [`ProviderRequest`](crate::provider::ProviderRequest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side, and the carrier of tool results
    User,
    /// The model
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Raw image payload plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    pub media_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ImageSource {
    pub fn png(data: impl Into<Vec<u8>>) -> Self {
        Self {
            media_type: "image/png".into(),
            data: data.into(),
        }
    }

    /// The payload as standard base64, the form every backend expects.
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// The answer to one [`ContentBlock::ToolUse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    /// Matches the `id` of the request this answers
    pub tool_use_id: String,

    /// Rendered text: annotation prefix applied, size policy applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Optional screenshot or other image output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSource>,

    #[serde(default)]
    pub is_error: bool,

    /// Host-origin note the tool attached, kept raw for inspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl ToolResultBlock {
    /// Normalize a tool's output into a result block.
    ///
    /// An error wins over any output and drops the image. Whichever text is
    /// shown gets the annotation prefix and the size policy. Empty output
    /// yields no text at all.
    pub fn from_output(tool_use_id: impl Into<String>, output: &ToolOutput) -> Self {
        let annotation = output.system.as_deref();
        let (text, image, is_error) = match &output.error {
            Some(error) => (Some(text::annotate(annotation, error)), None, true),
            None => (
                output
                    .output
                    .as_deref()
                    .filter(|o| !o.is_empty())
                    .map(|o| text::annotate(annotation, o)),
                output.image.clone(),
                false,
            ),
        };

        Self {
            tool_use_id: tool_use_id.into(),
            text,
            image,
            is_error,
            annotation: output.system.clone(),
        }
    }
}

/// One typed unit of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image(ImageSource),
    /// A tool invocation the model asked for. Assistant messages only.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The host's answer to a tool invocation. User messages only.
    ToolResult(ToolResultBlock),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultBlock> {
        match self {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    /// `(id, name, input)` if this is a tool request.
    pub fn as_tool_use(&self) -> Option<(&str, &str, &serde_json::Value)> {
        match self {
            ContentBlock::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// Ordered fragments; order is rendering and execution order
    pub content: Vec<ContentBlock>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Create a user message holding a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    /// Create an assistant message from reply blocks.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create the user message that answers a round of tool requests.
    pub fn tool_results(results: Vec<ToolResultBlock>) -> Self {
        Self::new(
            Role::User,
            results.into_iter().map(ContentBlock::ToolResult).collect(),
        )
    }

    /// Concatenation of every text block, in order.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(ContentBlock::as_text).collect()
    }

    /// Iterate the tool requests in this message, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.content.iter().filter_map(ContentBlock::as_tool_use)
    }

    /// Iterate the tool results in this message, in order.
    pub fn tool_results_iter(&self) -> impl Iterator<Item = &ToolResultBlock> {
        self.content.iter().filter_map(ContentBlock::as_tool_result)
    }
}

/// A broken request/result pairing found by [`Conversation::check_tool_pairing`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairingError {
    #[error("tool request {id} in message {message} has no result in the next message")]
    Unanswered { message: usize, id: String },

    #[error("tool result {id} in message {message} answers no request in the previous message")]
    Orphaned { message: usize, id: String },

    #[error("tool request {id} is answered more than once in message {message}")]
    Duplicated { message: usize, id: String },
}

/// A conversation is an ordered sequence of messages with shared context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Start a conversation from existing history.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut conversation = Self::new();
        conversation.messages = messages;
        conversation
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Verify that every tool request is answered exactly once by the next
    /// message and that no result appears without its request.
    pub fn check_tool_pairing(&self) -> std::result::Result<(), PairingError> {
        for (idx, message) in self.messages.iter().enumerate() {
            let requested: HashSet<&str> = match idx.checked_sub(1) {
                Some(prev) if self.messages[prev].role == Role::Assistant => {
                    self.messages[prev].tool_uses().map(|(id, _, _)| id).collect()
                }
                _ => HashSet::new(),
            };

            let mut answered = HashSet::new();
            for result in message.tool_results_iter() {
                let id = result.tool_use_id.as_str();
                if message.role != Role::User || !requested.contains(id) {
                    return Err(PairingError::Orphaned { message: idx, id: id.into() });
                }
                if !answered.insert(id) {
                    return Err(PairingError::Duplicated { message: idx, id: id.into() });
                }
            }

            if let Some(missing) = requested.iter().find(|id| !answered.contains(*id)) {
                return Err(PairingError::Unanswered {
                    message: idx - 1,
                    id: (*missing).to_string(),
                });
            }
        }

        if let Some(last) = self.messages.last() {
            if last.role == Role::Assistant {
                if let Some((id, _, _)) = last.tool_uses().next() {
                    return Err(PairingError::Unanswered {
                        message: self.messages.len() - 1,
                        id: id.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
