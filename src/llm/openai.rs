use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::{send_json, CompletionError, ReplyProvider};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Stateless client for an OpenAI-compatible `/chat/completions` endpoint.
/// Every call carries the configured system instruction plus the user's text.
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmClient {
    pub fn new(client: reqwest::Client, config: &LlmConfig) -> Self {
        Self {
            client,
            base_url: config.effective_base_url().to_string(),
            api_key: config.api_key.clone(),
            model: config.effective_model().to_string(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub async fn complete(&self, text: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::new("system", &self.system_prompt),
                ChatMessage::new("user", text),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);

        debug!("Sending request to OpenAI: {}", url);

        let chat_response: ChatResponse = send_json(
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request),
        )
        .await?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::NoContent("no choices returned".to_string()))?;

        choice
            .message
            .content
            .ok_or_else(|| CompletionError::NoContent("choice without content".to_string()))
    }
}

#[async_trait]
impl ReplyProvider for LlmClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, text: &str) -> Result<String, CompletionError> {
        self.complete(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> LlmClient {
        let config = LlmConfig {
            provider: LlmProvider::Openai,
            base_url: server.url(),
            api_key: "sk-test".to_string(),
            system_prompt: "Be brief.".to_string(),
            ..LlmConfig::default()
        };
        LlmClient::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn test_request_carries_system_prompt_and_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "hello"}
                ],
                "max_tokens": 150,
                "temperature": 0.7
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":" Hi there! "}}]}"#)
            .create_async()
            .await;

        let reply = client_for(&server).generate("hello").await.unwrap();

        assert_eq!(reply, " Hi there! ");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"bad key"}}"#)
            .create_async()
            .await;

        let err = client_for(&server).generate("hello").await.unwrap_err();

        match err {
            CompletionError::Api { status, body } => {
                assert_eq!(status.as_u16(), 401);
                assert!(body.contains("bad key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reply_text_is_returned_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "\n1. one\n2. two\n"}}]
        });
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let reply = client_for(&server).generate("list two things").await.unwrap();

        assert_eq!(reply, "\n1. one\n2. two\n");
    }

    #[tokio::test]
    async fn test_empty_choices_is_no_content() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = client_for(&server).generate("hello").await.unwrap_err();
        match err {
            CompletionError::NoContent(reason) => assert_eq!(reason, "no choices returned"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_choice_without_content_is_no_content() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
            .create_async()
            .await;

        let err = client_for(&server).generate("hello").await.unwrap_err();
        match err {
            CompletionError::NoContent(reason) => assert_eq!(reason, "choice without content"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let err = client_for(&server).generate("hello").await.unwrap_err();
        assert!(matches!(err, CompletionError::Decode(_)));
    }
}
