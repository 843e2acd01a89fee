pub mod gemini;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::{LlmConfig, LlmProvider};

/// Why a provider call produced no reply text.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP request error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No text in response: {0}")]
    NoContent(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Transport(err)
        }
    }
}

/// Something that turns a user's text into a generated reply.
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    async fn generate(&self, text: &str) -> Result<String, CompletionError>;
}

/// Send a request and decode a JSON body, mapping non-2xx statuses to `Api`.
pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, CompletionError> {
    let response = request.send().await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(CompletionError::Api { status, body });
    }

    Ok(serde_json::from_str(&body)?)
}

pub(crate) fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Build the provider selected by `config.provider`.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn ReplyProvider>> {
    let client = http_client(config)?;
    info!(
        "LLM provider: {} (model {}, {})",
        config.provider,
        config.effective_model(),
        config.effective_base_url()
    );

    let provider: Arc<dyn ReplyProvider> = match config.provider {
        LlmProvider::Gemini => Arc::new(gemini::GeminiClient::new(client, config)),
        LlmProvider::Openai => Arc::new(openai::LlmClient::new(client, config)),
    };
    Ok(provider)
}
