use std::sync::Arc;

use anyhow::Result;
use teloxide::dispatching::HandlerExt;
use teloxide::prelude::*;
use teloxide::types::{Chat, ChatAction, MessageId, ParseMode, ReplyParameters};
use teloxide::utils::command::BotCommands;
use teloxide::utils::html;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::platform::IncomingMessage;

/// Telegram caps messages at 4096 characters; stay under it.
const MAX_MESSAGE_LENGTH: usize = 4000;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "start talking to the bot")]
    Start,
}

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Commands other than the ones we handle never reach the text handler.
fn is_command(msg: &Message) -> bool {
    msg.text().is_some_and(|t| t.starts_with('/'))
}

/// In groups, quote the message being answered so the reply has context.
fn reply_parameters_for(chat: &Chat, message_id: MessageId) -> Option<ReplyParameters> {
    if chat.is_private() {
        None
    } else {
        Some(ReplyParameters::new(message_id))
    }
}

fn incoming_message(msg: &Message) -> IncomingMessage {
    let (user_id, user_name) = match msg.from.as_ref() {
        Some(user) => (user.id.0.to_string(), user.full_name()),
        None => (String::new(), String::new()),
    };

    IncomingMessage {
        platform: "telegram".to_string(),
        user_id,
        chat_id: msg.chat.id.0.to_string(),
        user_name,
        text: msg.text().map(str::to_string),
        received_at: msg.date,
    }
}

/// Run the Telegram bot platform until Ctrl-C
pub async fn run(agent: Arc<Agent>, bot_token: &str) -> Result<()> {
    let bot = Bot::new(bot_token);

    info!("Starting Telegram platform...");

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter(|msg: Message| !is_command(&msg)).endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![agent])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram platform stopped");
    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    agent: Arc<Agent>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            let mention = match msg.from.as_ref() {
                Some(user) => html::link(user.url().as_str(), &user.full_name()),
                None => String::new(),
            };
            let mut request = bot
                .send_message(msg.chat.id, agent.greeting(&mention))
                .parse_mode(ParseMode::Html);
            if let Some(params) = reply_parameters_for(&msg.chat, msg.id) {
                request = request.reply_parameters(params);
            }
            request.await?;
        }
    }
    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, agent: Arc<Agent>) -> ResponseResult<()> {
    let incoming = incoming_message(&msg);
    if incoming.content().is_none() {
        return Ok(());
    }

    // Send "typing" indicator
    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await
        .ok();

    if let Some(reply) = agent.process_message(&incoming).await {
        let mut quote = reply_parameters_for(&msg.chat, msg.id);
        for chunk in split_message(&reply, MAX_MESSAGE_LENGTH) {
            let mut request = bot.send_message(msg.chat.id, chunk);
            // Only the first chunk quotes the user's message.
            if let Some(params) = quote.take() {
                request = request.reply_parameters(params);
            }
            request.await?;
        }
    }

    Ok(())
}
