//! HTTP plumbing shared by the adapters: client construction and the
//! status-code to [`ProviderError`] mapping.

use autoloop_core::error::ProviderError;
use autoloop_core::text::truncate;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

/// Fallback wait when a 429 carries no usable `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Build a pooled client with the given request timeout.
///
/// Falls back to a default client if the builder fails, so construction
/// of an adapter never panics.
pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Map a transport failure.
pub(crate) fn network_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Turn a non-2xx response into the matching error and decode a 2xx body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::AuthenticationFailed(format!(
            "{provider} rejected the credentials: {}",
            truncate(&body)
        )));
    }

    if !(200..300).contains(&status) {
        let body = response.text().await.unwrap_or_default();
        warn!(provider, status, body = %truncate(&body), "Provider returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: body,
        });
    }

    let body = response.text().await.map_err(network_error)?;
    serde_json::from_str(&body).map_err(|e| {
        ProviderError::MalformedResponse(format!(
            "{provider} response did not match the expected schema: {e}"
        ))
    })
}
