//! LLM provider implementations for autoloop.
//!
//! All providers implement the `autoloop_core::Provider` trait.
//! The router selects the correct provider based on configuration.

mod http;

pub mod anthropic;
pub mod openai_compat;
pub mod retry;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openai_compat::{OpenAiCompatProvider, TranslationLoss};
pub use retry::RetryProvider;
pub use router::build_from_config;
