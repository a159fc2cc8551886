//! Hexagonal ports for everything the dispatcher does not own.
//!
//! Telegram implements `Transport` and `Privilege` in the adapter crate. The
//! other collaborators are implemented in this crate on top of a `Transport`
//! (see `report`, `evidence`, `exchange`, `registry`, `persistence`).

use std::{ops::Range, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    domain::{ChatId, CommandEvent, GroupInfo, MessageId, MessageRef, UserId},
    options::GroupConfig,
    Result,
};

/// Message transport (Telegram today).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        html: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    /// Best-effort bulk delete of the half-open id range.
    async fn delete_messages(&self, chat_id: ChatId, ids: Range<i32>) -> Result<()>;

    async fn forward_message(&self, msg: MessageRef, to: ChatId) -> Result<MessageRef>;

    async fn get_group_info(&self, chat_id: ChatId) -> Result<GroupInfo>;
}

/// Trust check for the issuer of a command.
#[async_trait]
pub trait Privilege: Send + Sync {
    async fn is_elevated(&self, event: &CommandEvent) -> bool;
}

#[async_trait]
pub trait GroupRegistry: Send + Sync {
    /// Make sure the group is known. `false` means the group must be ignored.
    async fn ensure_registered(&self, group: ChatId) -> Result<bool>;
}

/// Durable storage of named in-memory stores.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn save(&self, store: &str, data: serde_json::Value) -> Result<()>;
    async fn load(&self, store: &str) -> Result<Option<serde_json::Value>>;
}

/// Where a forwarded piece of evidence ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvidenceHandle {
    pub message: MessageRef,
}

#[async_trait]
pub trait EvidenceService: Send + Sync {
    /// Forward the triggering message as evidence. `None` when nothing was forwarded.
    async fn forward(
        &self,
        event: &CommandEvent,
        reason: &str,
        category: &str,
        flag: &str,
    ) -> Result<Option<EvidenceHandle>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpAction {
    Delete,
}

#[async_trait]
pub trait EscalationService: Send + Sync {
    async fn request_help(&self, action: HelpAction, group: ChatId, user: UserId) -> Result<()>;
}

/// Payload of a config session "ask" request.
#[derive(Clone, Debug, Serialize)]
pub struct ConfigSessionRequest {
    pub group_id: ChatId,
    pub group_name: String,
    pub group_link: String,
    pub user_id: UserId,
    pub config: GroupConfig,
    pub default: GroupConfig,
}

#[async_trait]
pub trait ConfigSessionService: Send + Sync {
    async fn ask(&self, request: ConfigSessionRequest) -> Result<()>;
}

/// One line in the debug channel.
#[derive(Clone, Debug)]
pub struct DebugRecord {
    pub group: ChatId,
    pub action: String,
    pub user: UserId,
    pub message: MessageId,
    pub evidence: Option<EvidenceHandle>,
}

#[async_trait]
pub trait Reporting: Send + Sync {
    /// Post `html` to the group; it is removed again after `delete_after_secs`.
    async fn report(&self, delete_after_secs: u64, chat_id: ChatId, html: &str) -> Result<()>;

    async fn debug_report(&self, record: DebugRecord) -> Result<()>;
}

/// Every collaborator the dispatcher needs, bundled for constructor injection.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub privilege: Arc<dyn Privilege>,
    pub registry: Arc<dyn GroupRegistry>,
    pub persistence: Arc<dyn Persistence>,
    pub evidence: Arc<dyn EvidenceService>,
    pub escalation: Arc<dyn EscalationService>,
    pub sessions: Arc<dyn ConfigSessionService>,
    pub reporter: Arc<dyn Reporting>,
}
