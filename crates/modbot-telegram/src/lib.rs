//! Telegram adapter (teloxide).
//!
//! This crate implements the `modbot-core` `Transport` and `Privilege` ports
//! over the Telegram Bot API and feeds group commands into the dispatcher.

use std::ops::Range;

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode};

use tokio::time::sleep;
use tracing::{debug, warn};

pub mod handlers;
pub mod router;

use modbot_core::{
    domain::{ChatId, CommandEvent, GroupInfo, MessageId, MessageRef},
    errors::Error,
    ports::{Privilege, Transport},
    Result,
};

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        html: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true);
                if let Some(id) = reply_to {
                    req = req
                        .reply_to_message_id(Self::tg_msg_id(id))
                        .allow_sending_without_reply(true);
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await?;
        Ok(())
    }

    async fn delete_messages(&self, chat_id: ChatId, ids: Range<i32>) -> Result<()> {
        // Gaps in the range (already deleted, service messages) fail individually.
        let total = ids.len();
        let mut failed = 0usize;
        for id in ids {
            let msg = MessageRef {
                chat_id,
                message_id: MessageId(id),
            };
            if self.delete_message(msg).await.is_err() {
                failed += 1;
            }
        }
        debug!(chat = chat_id.0, total, failed, "bulk delete finished");
        Ok(())
    }

    async fn forward_message(&self, msg: MessageRef, to: ChatId) -> Result<MessageRef> {
        let fwd = self
            .with_retry(|| {
                self.bot.forward_message(
                    Self::tg_chat(to),
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                )
            })
            .await?;
        Ok(MessageRef {
            chat_id: to,
            message_id: MessageId(fwd.id.0),
        })
    }

    async fn get_group_info(&self, chat_id: ChatId) -> Result<GroupInfo> {
        let chat = self
            .with_retry(|| self.bot.get_chat(Self::tg_chat(chat_id)))
            .await?;
        Ok(GroupInfo {
            name: chat.title().unwrap_or_default().to_string(),
            link: group_link(chat.username(), chat.invite_link()),
        })
    }
}

/// Public link for a group: `t.me/<username>` first, invite link otherwise.
pub fn group_link(username: Option<&str>, invite_link: Option<&str>) -> String {
    match (username, invite_link) {
        (Some(u), _) if !u.is_empty() => format!("https://t.me/{u}"),
        (_, Some(link)) => link.to_string(),
        _ => String::new(),
    }
}

/// Group owners and administrators are elevated, as is an anonymous admin
/// posting as the group itself (see `handlers::issuer_for`).
#[derive(Clone)]
pub struct TelegramPrivilege {
    bot: Bot,
}

impl TelegramPrivilege {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Privilege for TelegramPrivilege {
    async fn is_elevated(&self, event: &CommandEvent) -> bool {
        if event.issuer.0 == event.group.0 {
            return true;
        }
        let Ok(user) = u64::try_from(event.issuer.0) else {
            return false;
        };

        match self
            .bot
            .get_chat_member(
                teloxide::types::ChatId(event.group.0),
                teloxide::types::UserId(user),
            )
            .await
        {
            Ok(member) => member.is_privileged(),
            Err(e) => {
                warn!(group = event.group.0, user, error = %e, "privilege lookup failed");
                false
            }
        }
    }
}
