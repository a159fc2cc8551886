//! Evidence forwarding into the logging channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    domain::{ChatId, CommandEvent},
    formatting::field,
    ports::{EvidenceHandle, EvidenceService, Transport},
    utils::{iso_timestamp_utc, sha256_hex},
    Result,
};

pub struct ChannelEvidence {
    transport: Arc<dyn Transport>,
    logging_channel: ChatId,
    project_name: String,
}

impl ChannelEvidence {
    pub fn new(
        transport: Arc<dyn Transport>,
        logging_channel: ChatId,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            logging_channel,
            project_name: project_name.into(),
        }
    }
}

#[async_trait]
impl EvidenceService for ChannelEvidence {
    async fn forward(
        &self,
        event: &CommandEvent,
        reason: &str,
        category: &str,
        flag: &str,
    ) -> Result<Option<EvidenceHandle>> {
        let forwarded = match self
            .transport
            .forward_message(event.message_ref(), self.logging_channel)
            .await
        {
            Ok(m) => m,
            Err(e) => {
                warn!(group = event.group.0, error = %e, "evidence forward failed");
                return Ok(None);
            }
        };

        let mut text = field("Project", &self.project_name);
        text += &field("Group ID", event.group.0.to_string());
        text += &field("User ID", event.issuer.0.to_string());
        text += &field("Action", reason);
        text += &field("Category", category);
        text += &field("Rule", flag);
        text += &field("Digest", sha256_hex(&event.text));
        text += &field("Time", iso_timestamp_utc());

        // The forward is the evidence; a missing record is only cosmetic.
        if let Err(e) = self
            .transport
            .send_message(self.logging_channel, &text, Some(forwarded.message_id))
            .await
        {
            warn!(group = event.group.0, error = %e, "evidence record failed");
        }

        Ok(Some(EvidenceHandle { message: forwarded }))
    }
}
