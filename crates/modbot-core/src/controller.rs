//! Per-group configuration state machine: session requests, direct toggles,
//! default reset and the read-only `show` report.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    background::Background,
    config::Config,
    domain::{ChatId, CommandEvent, GroupInfo},
    formatting::field,
    options::{GroupConfig, OptionKind, OptionName},
    parser::ParsedCommand,
    ports::{Collaborators, ConfigSessionRequest, DebugRecord},
    store::{ConfigStore, CONFIGS_STORE},
    utils::now_unix,
    Result,
};

const SHOW_REPORT_SECS: u64 = 30;
const SUCCESS_REPORT_SECS: u64 = 10;
const FAILURE_REPORT_SECS: u64 = 5;

/// Why a direct config change was refused. `Display` is the reported reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigFailure {
    #[error("malformed command")]
    Malformed,
    #[error("settings are currently locked")]
    Locked,
    #[error("invalid category")]
    InvalidCategory,
    #[error("missing argument")]
    MissingArgument,
    #[error("invalid argument")]
    InvalidArgument,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    NotPermitted,
    Locked,
    Requested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    NotPermitted,
    Shown,
    Applied { changed: bool },
    Rejected(ConfigFailure),
}

pub struct ConfigController {
    cfg: Arc<Config>,
    store: Arc<ConfigStore>,
    collab: Collaborators,
    background: Background,
}

impl ConfigController {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<ConfigStore>,
        collab: Collaborators,
        background: Background,
    ) -> Self {
        Self {
            cfg,
            store,
            collab,
            background,
        }
    }

    pub async fn request_session(
        &self,
        event: &CommandEvent,
        elevated: bool,
    ) -> Result<SessionOutcome> {
        self.request_session_at(event, elevated, now_unix()).await
    }

    /// Ask the config service to open an interactive session for the group.
    ///
    /// Silent when the issuer is not elevated or the group is still locked.
    pub async fn request_session_at(
        &self,
        event: &CommandEvent,
        elevated: bool,
        now: i64,
    ) -> Result<SessionOutcome> {
        if !elevated {
            return Ok(SessionOutcome::NotPermitted);
        }

        let group = event.group;
        // A direct edit commits a whole record; it must not race the new lock.
        let taken = {
            let _writer = self.store.writer(group).await;
            self.store
                .try_lock(group, now, self.cfg.config_lock_secs)
                .await
        };
        let Some(current) = taken else {
            debug!(group = group.0, "config session refused: locked");
            return Ok(SessionOutcome::Locked);
        };

        let info = match self.collab.transport.get_group_info(group).await {
            Ok(info) => info,
            Err(e) => {
                warn!(group = group.0, error = %e, "group info unavailable");
                GroupInfo::default()
            }
        };

        let request = ConfigSessionRequest {
            group_id: group,
            group_name: info.name,
            group_link: info.link,
            user_id: event.issuer,
            config: current,
            default: GroupConfig::factory(),
        };
        let sessions = self.collab.sessions.clone();
        self.background
            .spawn("config-ask", async move { sessions.ask(request).await });

        let reporter = self.collab.reporter.clone();
        let record = DebugRecord {
            group,
            action: "create config session".to_string(),
            user: event.issuer,
            message: event.message,
            evidence: None,
        };
        self.background
            .spawn("config-debug", async move { reporter.debug_report(record).await });

        info!(group = group.0, user = event.issuer.0, "config session requested");
        Ok(SessionOutcome::Requested)
    }

    pub async fn apply_direct(
        &self,
        event: &CommandEvent,
        elevated: bool,
        parsed: &ParsedCommand,
    ) -> Result<ApplyOutcome> {
        self.apply_direct_at(event, elevated, parsed, now_unix())
            .await
    }

    /// Apply `show`, `default` or `<option> on|off` straight from the command.
    pub async fn apply_direct_at(
        &self,
        event: &CommandEvent,
        elevated: bool,
        parsed: &ParsedCommand,
        now: i64,
    ) -> Result<ApplyOutcome> {
        if !elevated {
            return Ok(ApplyOutcome::NotPermitted);
        }

        let group = event.group;
        let command_type = parsed.command_type();
        let mut text = field("Admin", event.issuer.0.to_string());

        // Reads are never blocked by the lock.
        if command_type.as_deref() == Some("show") {
            let current = self.store.get(group).await;
            text += &field("Action", "show settings");
            text += &show_text(&current);
            self.report(SHOW_REPORT_SECS, group, text);
            return Ok(ApplyOutcome::Shown);
        }

        let outcome = {
            let _writer = self.store.writer(group).await;
            let current = self.store.get(group).await;
            match plan_change(
                &current,
                command_type.as_deref(),
                parsed.argument(),
                now,
                self.cfg.config_lock_secs,
            ) {
                Ok(next) if next == current => ApplyOutcome::Applied { changed: false },
                Ok(next) => {
                    // Save first; memory is untouched when the save fails.
                    if let Err(e) = self.persist_with(group, &next).await {
                        warn!(group = group.0, error = %e, "config change not saved");
                        text += &field("Action", "change settings");
                        text += &field("Status", "not saved");
                        self.report(FAILURE_REPORT_SECS, group, text);
                        return Err(e);
                    }
                    self.store.commit(group, next).await;
                    ApplyOutcome::Applied { changed: true }
                }
                Err(failure) => ApplyOutcome::Rejected(failure),
            }
        };

        text += &field("Action", "change settings");
        let delay = match outcome {
            ApplyOutcome::Rejected(failure) => {
                info!(group = group.0, reason = %failure, "config change refused");
                text += &field("Status", failure.to_string());
                FAILURE_REPORT_SECS
            }
            _ => {
                info!(group = group.0, command = ?command_type, "config updated");
                text += &field("Status", "updated");
                SUCCESS_REPORT_SECS
            }
        };
        self.report(delay, group, text);

        Ok(outcome)
    }

    /// Save the store as it will be once `next` is committed for `group`.
    async fn persist_with(&self, group: ChatId, next: &GroupConfig) -> Result<()> {
        let mut snapshot = self.store.snapshot().await;
        snapshot.insert(group.0, next.clone());
        let snapshot = serde_json::to_value(snapshot)?;
        self.collab.persistence.save(CONFIGS_STORE, snapshot).await
    }

    fn report(&self, delay: u64, group: ChatId, text: String) {
        let reporter = self.collab.reporter.clone();
        self.background.spawn("config-report", async move {
            reporter.report(delay, group, &text).await
        });
    }
}

/// Compute the config that a direct command would produce.
fn plan_change(
    current: &GroupConfig,
    command_type: Option<&str>,
    argument: Option<&str>,
    now: i64,
    lock_secs: i64,
) -> std::result::Result<GroupConfig, ConfigFailure> {
    let command_type = command_type.ok_or(ConfigFailure::Malformed)?;
    if current.lock_age(now) <= lock_secs {
        return Err(ConfigFailure::Locked);
    }

    if command_type == "default" {
        if current.default {
            return Ok(current.clone());
        }
        let mut next = GroupConfig::factory();
        next.lock = current.lock;
        return Ok(next);
    }

    let option: OptionName = command_type
        .parse()
        .map_err(|_| ConfigFailure::InvalidCategory)?;
    let value = match argument {
        None => return Err(ConfigFailure::MissingArgument),
        Some("on") => true,
        Some("off") => false,
        Some(_) => return Err(ConfigFailure::InvalidArgument),
    };

    let mut next = current.clone();
    next.set_flag(option, value);
    Ok(next)
}

fn show_text(cfg: &GroupConfig) -> String {
    let mut text = field("Settings", if cfg.default { "default" } else { "custom" });
    for (name, on) in cfg.flags() {
        let state = match (name.kind(), on) {
            (OptionKind::Filter, true) => "filter",
            (OptionKind::Filter, false) => "ignore",
            (OptionKind::Function, true) => "enabled",
            (OptionKind::Function, false) => "disabled",
        };
        text += &field(&format!("{} ({})", name.label(), name.as_str()), state);
    }
    text
}
