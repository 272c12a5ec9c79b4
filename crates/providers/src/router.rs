//! Provider router: selects the LLM backend for a run from config.
//!
//! Selection happens once, before the first round. The loop only ever sees
//! the resulting `dyn Provider`.

use std::sync::Arc;
use std::time::Duration;

use autoloop_config::{AppConfig, ProviderKind};
use autoloop_core::error::ProviderError;
use autoloop_core::provider::Provider;
use tracing::info;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryProvider;

/// Build the configured provider, wrapped for retries when enabled.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!("no API key configured for {}", config.provider))
        })?;

    let provider: Arc<dyn Provider> = match config.provider {
        ProviderKind::Anthropic => {
            let mut p = AnthropicProvider::new(api_key);
            if let Some(url) = &config.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderKind::OpenAi | ProviderKind::Venice | ProviderKind::Custom => {
            Arc::new(build_chat_completion(config, api_key)?)
        }
    };

    info!(
        provider = %provider.name(),
        model = %config.model(),
        retry_attempts = config.retry.max_attempts,
        "Selected provider"
    );

    if config.retry.max_attempts > 1 {
        Ok(Arc::new(RetryProvider::new(
            provider,
            config.retry.max_attempts,
            Duration::from_millis(config.retry.initial_backoff_ms),
        )))
    } else {
        Ok(provider)
    }
}

fn build_chat_completion(config: &AppConfig, api_key: String) -> Result<OpenAiCompatProvider, ProviderError> {
    let mut provider = match (&config.provider, &config.api_url) {
        (ProviderKind::Venice, None) => OpenAiCompatProvider::venice(api_key),
        (ProviderKind::Venice, Some(url)) => OpenAiCompatProvider::new("venice", url, api_key)
            .with_function_calling(false)
            .with_extra_body(serde_json::json!({
                "venice_parameters": { "include_venice_system_prompt": false }
            })),
        (ProviderKind::OpenAi, None) => OpenAiCompatProvider::openai(api_key),
        (ProviderKind::OpenAi, Some(url)) => OpenAiCompatProvider::new("openai", url, api_key),
        (_, Some(url)) => OpenAiCompatProvider::new("custom", url, api_key),
        (_, None) => {
            return Err(ProviderError::NotConfigured(
                "custom provider requires api_url".into(),
            ));
        }
    };

    if let Some(enabled) = config.function_calling {
        provider = provider.with_function_calling(enabled);
    }
    Ok(provider)
}
