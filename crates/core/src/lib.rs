//! # autoloop core
//!
//! Domain types, traits, and error definitions for the autoloop agent loop.
//! This crate has **no HTTP or runtime dependencies**: it defines the content
//! model, the provider and tool contracts, and the pure history transforms
//! that every other crate builds on.
//!
//! ## Layout
//!
//! - `message`: content blocks, messages, conversations
//! - `provider`: the backend contract (`Provider`, request, reply)
//! - `tool`: the tool contract and the registry that invokes it
//! - `history`: image pruning over a conversation
//! - `text`: the shared text size policy

pub mod error;
pub mod history;
pub mod message;
pub mod provider;
pub mod text;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{
    ContentBlock, Conversation, ConversationId, ImageSource, Message, PairingError, Role,
    ToolResultBlock,
};
pub use provider::{Provider, ProviderReply, ProviderRequest, ToolDefinition, Usage};
pub use tool::{Tool, ToolOutput, ToolRegistry};
