use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric). Groups and channels are negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl ChatId {
    pub fn is_group(self) -> bool {
        self.0 < 0
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// One inbound command message. Lives only for the duration of dispatch.
#[derive(Clone, Debug)]
pub struct CommandEvent {
    pub group: ChatId,
    pub message: MessageId,
    pub issuer: UserId,
    pub text: String,
    pub reply_to: Option<MessageId>,
}

impl CommandEvent {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.group,
            message_id: self.message,
        }
    }
}

/// Display name and public link of a group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    pub link: String,
}

/// Half-open range of message ids scheduled for bulk deletion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSpan {
    pub chat_id: ChatId,
    pub ids: Range<i32>,
}

impl MessageSpan {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
