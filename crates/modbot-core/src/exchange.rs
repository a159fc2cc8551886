//! Requests to the sibling bot services, posted as JSON to the exchange channel.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::{
    domain::{ChatId, UserId},
    formatting::escape_html,
    ports::{ConfigSessionRequest, ConfigSessionService, EscalationService, HelpAction, Transport},
    Result,
};

#[derive(Clone, Debug, Serialize)]
pub struct ExchangePayload {
    pub from: String,
    pub to: Vec<String>,
    pub action: String,
    pub action_type: String,
    pub data: serde_json::Value,
}

pub struct ExchangeClient {
    transport: Arc<dyn Transport>,
    channel: ChatId,
    sender: String,
    project_name: String,
    project_link: String,
}

impl ExchangeClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        channel: ChatId,
        sender: impl Into<String>,
        project_name: impl Into<String>,
        project_link: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            channel,
            sender: sender.into(),
            project_name: project_name.into(),
            project_link: project_link.into(),
        }
    }

    pub async fn share(
        &self,
        receivers: &[&str],
        action: &str,
        action_type: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let payload = ExchangePayload {
            from: self.sender.clone(),
            to: receivers.iter().map(|r| r.to_string()).collect(),
            action: action.to_string(),
            action_type: action_type.to_string(),
            data,
        };
        let body = serde_json::to_string(&payload)?;
        debug!(action, action_type, "sharing exchange payload");
        self.transport
            .send_message(self.channel, &format!("<pre>{}</pre>", escape_html(&body)), None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EscalationService for ExchangeClient {
    async fn request_help(&self, action: HelpAction, group: ChatId, user: UserId) -> Result<()> {
        let action_type = serde_json::to_value(action)?;
        let action_type = action_type.as_str().unwrap_or("delete");
        self.share(
            &["USER"],
            "help",
            action_type,
            json!({ "group_id": group, "user_id": user }),
        )
        .await
    }
}

#[async_trait]
impl ConfigSessionService for ExchangeClient {
    async fn ask(&self, request: ConfigSessionRequest) -> Result<()> {
        let mut data = serde_json::to_value(&request)?;
        if let Some(obj) = data.as_object_mut() {
            obj.insert("project_name".to_string(), json!(self.project_name));
            obj.insert("project_link".to_string(), json!(self.project_link));
        }
        self.share(&["CONFIG"], "config", "ask", data).await
    }
}
