//! Routes an inbound command to the controller or the coordinator and always
//! cleans up the triggering message afterwards.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::{
    background::Background,
    config::Config,
    controller::ConfigController,
    coordinator::DestructiveCoordinator,
    domain::{CommandEvent, MessageRef},
    formatting::{bold, user_mention},
    parser::{parse_command, ParsedCommand},
    ports::{Collaborators, Privilege, Transport},
    store::{ConfigStore, DedupGuards},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    RequestSession,
    ApplyDirect,
    DeleteAllFromMe,
    Purge,
    Version,
}

pub struct Dispatcher {
    cfg: Arc<Config>,
    controller: ConfigController,
    coordinator: DestructiveCoordinator,
    privilege: Arc<dyn Privilege>,
    transport: Arc<dyn Transport>,
    background: Background,
}

impl Dispatcher {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<ConfigStore>,
        guards: Arc<DedupGuards>,
        collab: Collaborators,
        background: Background,
    ) -> Self {
        Self {
            controller: ConfigController::new(
                cfg.clone(),
                store.clone(),
                collab.clone(),
                background.clone(),
            ),
            coordinator: DestructiveCoordinator::new(
                cfg.clone(),
                store,
                guards,
                collab.clone(),
                background.clone(),
            ),
            privilege: collab.privilege,
            transport: collab.transport,
            cfg,
            background,
        }
    }

    /// Handle one command event. Returns `false` when the event was not ours
    /// or its handler failed; failures never escape.
    pub async fn dispatch(&self, event: CommandEvent) -> bool {
        if !event.group.is_group() {
            return false;
        }
        let Some(parsed) = parse_command(&event.text, &self.cfg.prefixes) else {
            return false;
        };
        let Some(route) = self.route(&event, &parsed) else {
            return false;
        };

        // Deletes the command message on every exit path.
        let _cleanup = CleanupOnDrop {
            background: &self.background,
            transport: &self.transport,
            msg: (route != Route::Version).then(|| event.message_ref()),
        };

        let handled = AssertUnwindSafe(self.run(route, &event, &parsed))
            .catch_unwind()
            .await;
        match handled {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(
                    verb = %parsed.verb,
                    group = event.group.0,
                    error = %e,
                    "command handler failed"
                );
                false
            }
            Err(_) => {
                error!(verb = %parsed.verb, group = event.group.0, "command handler panicked");
                false
            }
        }
    }

    fn route(&self, event: &CommandEvent, parsed: &ParsedCommand) -> Option<Route> {
        let verb = parsed.verb.as_str();
        if self.cfg.is_test_group(event.group) {
            return (verb == "version").then_some(Route::Version);
        }
        match verb {
            "config" => Some(Route::RequestSession),
            "dafm" => Some(Route::DeleteAllFromMe),
            "purge" => Some(Route::Purge),
            v if v == self.cfg.direct_config_verb() => Some(Route::ApplyDirect),
            _ => None,
        }
    }

    async fn run(&self, route: Route, event: &CommandEvent, parsed: &ParsedCommand) -> Result<()> {
        match route {
            Route::RequestSession => {
                // The verb is shared by every bot in the group; only answer our own name.
                let ours = self.cfg.sender.to_lowercase();
                if parsed.command_type().as_deref() != Some(ours.as_str()) {
                    return Ok(());
                }
                let elevated = self.privilege.is_elevated(event).await;
                let out = self.controller.request_session(event, elevated).await?;
                debug!(group = event.group.0, outcome = ?out, "config");
            }
            Route::ApplyDirect => {
                let elevated = self.privilege.is_elevated(event).await;
                let out = self.controller.apply_direct(event, elevated, parsed).await?;
                debug!(group = event.group.0, outcome = ?out, "config direct");
            }
            Route::DeleteAllFromMe => {
                let elevated = self.privilege.is_elevated(event).await;
                let out = self
                    .coordinator
                    .delete_all_from_me(event, elevated, parsed)
                    .await?;
                debug!(group = event.group.0, outcome = ?out, "dafm");
            }
            Route::Purge => {
                let elevated = self.privilege.is_elevated(event).await;
                let out = self.coordinator.purge(event, elevated, parsed).await?;
                debug!(group = event.group.0, outcome = ?out, "purge");
            }
            Route::Version => {
                let text = format!(
                    "Admin: {}\n\nVersion: {}\n",
                    user_mention(event.issuer.0),
                    bold(&self.cfg.version)
                );
                let transport = self.transport.clone();
                let (chat, reply_to) = (event.group, event.message);
                self.background.spawn("version", async move {
                    transport.send_message(chat, &text, Some(reply_to)).await?;
                    Ok(())
                });
            }
        }
        Ok(())
    }
}

struct CleanupOnDrop<'a> {
    background: &'a Background,
    transport: &'a Arc<dyn Transport>,
    msg: Option<MessageRef>,
}

impl Drop for CleanupOnDrop<'_> {
    fn drop(&mut self) {
        let Some(msg) = self.msg.take() else {
            return;
        };
        let transport = self.transport.clone();
        self.background
            .spawn("command-cleanup", async move { transport.delete_message(msg).await });
    }
}
