use std::sync::Arc;

use tracing::{error, info};

use crate::config::MessagesConfig;
use crate::llm::ReplyProvider;
use crate::platform::IncomingMessage;

/// The core agent that turns incoming messages into replies.
/// Platform-agnostic — receives IncomingMessage, returns response text.
pub struct Agent {
    provider: Arc<dyn ReplyProvider>,
    messages: MessagesConfig,
}

impl Agent {
    pub fn new(provider: Arc<dyn ReplyProvider>, messages: MessagesConfig) -> Self {
        Self { provider, messages }
    }

    /// Greeting for the start command. `mention` is inserted as-is.
    pub fn greeting(&self, mention: &str) -> String {
        self.messages.greeting.replace("{mention}", mention)
    }

    /// Produce the reply for a message, or `None` when it carries no text.
    ///
    /// Provider failures never escape: they are logged and answered with the
    /// configured apology.
    pub async fn process_message(&self, incoming: &IncomingMessage) -> Option<String> {
        let text = incoming.content()?;

        info!(
            chat_id = %incoming.chat_id,
            sent_at = %incoming.received_at.to_rfc3339(),
            "{} message from {} ({}): {}",
            incoming.platform, incoming.user_name, incoming.user_id, text
        );

        match self.provider.generate(text).await {
            Ok(reply) => Some(format!("{}{}", self.messages.disclaimer, reply)),
            Err(e) => {
                error!(
                    provider = self.provider.name(),
                    user_id = %incoming.user_id,
                    "Failed to generate AI reply: {}",
                    e
                );
                Some(self.messages.apology.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Outcome {
        Reply(&'static str),
        Timeout,
        Status(u16),
    }

    struct FakeProvider {
        outcome: Outcome,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReplyProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn generate(&self, _text: &str) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Outcome::Reply(text) => Ok(text.to_string()),
                Outcome::Timeout => Err(CompletionError::Timeout),
                Outcome::Status(code) => Err(CompletionError::Api {
                    status: reqwest::StatusCode::from_u16(code).unwrap(),
                    body: "boom".to_string(),
                }),
            }
        }
    }

    fn message(text: Option<&str>) -> IncomingMessage {
        IncomingMessage {
            platform: "telegram".to_string(),
            user_id: "42".to_string(),
            chat_id: "42".to_string(),
            user_name: "Sara".to_string(),
            text: text.map(str::to_string),
            received_at: Utc::now(),
        }
    }

    fn agent(provider: Arc<FakeProvider>) -> Agent {
        Agent::new(provider, MessagesConfig::default())
    }

    #[tokio::test]
    async fn test_successful_reply_gets_disclaimer_prefix() {
        let provider = FakeProvider::new(Outcome::Reply("سلام! چطور می‌توانم کمک کنم؟"));
        let agent = agent(provider.clone());

        let reply = agent.process_message(&message(Some("سلام"))).await;

        let expected = format!(
            "{}{}",
            MessagesConfig::default().disclaimer,
            "سلام! چطور می‌توانم کمک کنم؟"
        );
        assert_eq!(reply, Some(expected));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_becomes_apology() {
        let provider = FakeProvider::new(Outcome::Timeout);
        let agent = agent(provider.clone());

        let reply = agent.process_message(&message(Some("hello"))).await;

        assert_eq!(reply, Some(MessagesConfig::default().apology));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_api_error_becomes_apology() {
        let provider = FakeProvider::new(Outcome::Status(503));
        let agent = agent(provider);

        let reply = agent.process_message(&message(Some("hello"))).await;

        assert_eq!(reply, Some(MessagesConfig::default().apology));
    }

    #[tokio::test]
    async fn test_missing_or_blank_text_is_ignored() {
        let provider = FakeProvider::new(Outcome::Reply("unused"));
        let agent = agent(provider.clone());

        assert_eq!(agent.process_message(&message(None)).await, None);
        assert_eq!(agent.process_message(&message(Some(""))).await, None);
        assert_eq!(agent.process_message(&message(Some("  \n"))).await, None);
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_greeting_includes_mention() {
        let agent = agent(FakeProvider::new(Outcome::Reply("unused")));
        let mention = r#"<a href="tg://user?id=42">Sara</a>"#;

        let greeting = agent.greeting(mention);

        assert!(greeting.contains(mention));
        assert!(!greeting.contains("{mention}"));
    }

    #[test]
    fn test_custom_messages_are_used() {
        let messages = MessagesConfig {
            greeting: "Hi {mention}".to_string(),
            disclaimer: "[away] ".to_string(),
            apology: "sorry".to_string(),
        };
        let agent = Agent::new(FakeProvider::new(Outcome::Reply("x")), messages);
        assert_eq!(agent.greeting("@sara"), "Hi @sara");
    }
}
