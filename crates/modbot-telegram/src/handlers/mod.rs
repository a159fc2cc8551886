//! Telegram update handlers.
//!
//! Group text messages become `CommandEvent`s; everything else is dropped
//! before it reaches the core dispatcher.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use modbot_core::domain::{ChatId, CommandEvent, MessageId, UserId};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(event) = command_event(&msg) else {
        return Ok(());
    };
    // The dispatcher logs its own failures and never returns an error.
    state.dispatcher.dispatch(event).await;
    Ok(())
}

fn command_event(msg: &Message) -> Option<CommandEvent> {
    if !(msg.chat.is_group() || msg.chat.is_supergroup()) {
        return None;
    }
    let text = msg.text()?;
    let issuer = issuer_for(
        msg.chat.id.0,
        msg.from().map(|u| u.id.0),
        msg.sender_chat().map(|c| c.id.0),
    )?;

    Some(CommandEvent {
        group: ChatId(msg.chat.id.0),
        message: MessageId(msg.id.0),
        issuer,
        text: text.to_string(),
        reply_to: msg.reply_to_message().map(|r| MessageId(r.id.0)),
    })
}

/// Who issued a message.
///
/// An anonymous admin posts as the group itself; such messages are attributed
/// to the group id. Other sender chats (linked channels) are not issuers.
pub fn issuer_for(chat_id: i64, from_user: Option<u64>, sender_chat: Option<i64>) -> Option<UserId> {
    match sender_chat {
        Some(sender) if sender == chat_id => Some(UserId(chat_id)),
        Some(_) => None,
        None => from_user
            .and_then(|id| i64::try_from(id).ok())
            .map(UserId),
    }
}
