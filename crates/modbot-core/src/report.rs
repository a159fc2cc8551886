//! `Reporting` over a `Transport`: group notices that clean themselves up,
//! plus one-line records in the debug channel.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;

use crate::{
    background::Background,
    domain::ChatId,
    formatting::{code, field},
    ports::{DebugRecord, Reporting, Transport},
    Result,
};

pub struct ChannelReporter {
    transport: Arc<dyn Transport>,
    background: Background,
    debug_channel: ChatId,
    project_name: String,
}

impl ChannelReporter {
    pub fn new(
        transport: Arc<dyn Transport>,
        background: Background,
        debug_channel: ChatId,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            background,
            debug_channel,
            project_name: project_name.into(),
        }
    }
}

#[async_trait]
impl Reporting for ChannelReporter {
    async fn report(&self, delete_after_secs: u64, chat_id: ChatId, html: &str) -> Result<()> {
        let sent = self.transport.send_message(chat_id, html, None).await?;

        let transport = self.transport.clone();
        self.background.spawn("report-cleanup", async move {
            sleep(Duration::from_secs(delete_after_secs)).await;
            transport.delete_message(sent).await
        });
        Ok(())
    }

    async fn debug_report(&self, record: DebugRecord) -> Result<()> {
        let info = self.transport.get_group_info(record.group).await?;

        let mut text = format!("Project: {}\n", code(&self.project_name));
        text += &field("Group name", &info.name);
        text += &field("Group ID", record.group.0.to_string());
        text += &field("User ID", record.user.0.to_string());
        text += &field("Action", &record.action);
        text += &field("Message ID", record.message.0.to_string());

        let reply_to = match record.evidence {
            Some(handle) if handle.message.chat_id == self.debug_channel => {
                Some(handle.message.message_id)
            }
            Some(handle) => {
                text += &field("Evidence", handle.message.message_id.0.to_string());
                None
            }
            None => None,
        };

        self.transport
            .send_message(self.debug_channel, &text, reply_to)
            .await?;
        Ok(())
    }
}
