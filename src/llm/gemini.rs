use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::{send_json, CompletionError, ReplyProvider};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [Content],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Content of the first candidate, or why there is none.
    fn into_reply(self) -> Result<Content, CompletionError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(CompletionError::NoContent(format!("prompt blocked: {}", reason)));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::NoContent("no candidates returned".to_string()))?;

        let finish_reason = candidate.finish_reason.unwrap_or_default();
        match candidate.content {
            Some(content) if content.parts.iter().any(|p| p.text.is_some()) => Ok(content),
            _ => Err(CompletionError::NoContent(format!(
                "candidate without text (finish reason: {})",
                finish_reason
            ))),
        }
    }
}

/// Client for the Gemini `generateContent` API.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, config: &LlmConfig) -> Self {
        Self {
            client,
            base_url: config.effective_base_url().to_string(),
            api_key: config.api_key.clone(),
            model: config.effective_model().to_string(),
        }
    }

    /// Open a chat seeded with `history`.
    pub fn start_chat(&self, history: Vec<Content>) -> ChatSession<'_> {
        ChatSession {
            client: self,
            history,
        }
    }

    async fn generate_content(&self, contents: &[Content]) -> Result<Content, CompletionError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        debug!("Sending request to Gemini: {}", url);

        let response: GenerateResponse = send_json(
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&GenerateRequest { contents }),
        )
        .await?;

        response.into_reply()
    }
}

/// A multi-turn conversation. History only grows on successful turns.
pub struct ChatSession<'a> {
    client: &'a GeminiClient,
    history: Vec<Content>,
}

impl ChatSession<'_> {
    #[cfg(test)]
    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub async fn send_message(&mut self, text: &str) -> Result<String, CompletionError> {
        let mut contents = self.history.clone();
        contents.push(Content::text("user", text));

        let mut reply = self.client.generate_content(&contents).await?;
        if reply.role.is_empty() {
            reply.role = "model".to_string();
        }

        let reply_text: String = reply
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();

        contents.push(reply);
        self.history = contents;

        Ok(reply_text)
    }
}

#[async_trait]
impl ReplyProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, text: &str) -> Result<String, CompletionError> {
        // No memory across messages: every message gets an empty chat.
        let mut chat = self.start_chat(Vec::new());
        chat.send_message(text).await
    }
}
