//! Destructive actions: bulk purge and delete-all-from-me.
//!
//! Both are guarded by `DedupGuards` so each fires at most once per key, even
//! when duplicate commands are delivered concurrently.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    background::Background,
    config::{Config, PurgeGuardPolicy},
    domain::{ChatId, CommandEvent, MessageId, MessageSpan},
    formatting::field,
    options::OptionName,
    parser::ParsedCommand,
    ports::{Collaborators, DebugRecord, EvidenceHandle, HelpAction},
    store::{ConfigStore, DedupGuards},
    Result,
};

const DAFM_ACTION: &str = "auto delete";
const DAFM_CATEGORY: &str = "group custom";
const PURGE_REPORT_SECS: u64 = 10;
const PURGE_FAILURE_REPORT_SECS: u64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteAllOutcome {
    Unregistered,
    NotPermitted,
    Unconfirmed,
    AlreadyActioned,
    NoEvidence,
    Escalated(EvidenceHandle),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PurgeOutcome {
    NotPermitted,
    NoReplyTarget,
    InFlight,
    TooMany { span: i64 },
    Scheduled(MessageSpan),
}

pub struct DestructiveCoordinator {
    cfg: Arc<Config>,
    store: Arc<ConfigStore>,
    guards: Arc<DedupGuards>,
    collab: Collaborators,
    background: Background,
}

impl DestructiveCoordinator {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<ConfigStore>,
        guards: Arc<DedupGuards>,
        collab: Collaborators,
        background: Background,
    ) -> Self {
        Self {
            cfg,
            store,
            guards,
            collab,
            background,
        }
    }

    /// Delete every message of the issuer in this group, once.
    ///
    /// Members may use it when the group enabled `sde`; elevated users always
    /// may. The triggering message is forwarded as evidence first and nothing
    /// else happens unless that forward succeeds.
    pub async fn delete_all_from_me(
        &self,
        event: &CommandEvent,
        elevated: bool,
        parsed: &ParsedCommand,
    ) -> Result<DeleteAllOutcome> {
        let group = event.group;
        let user = event.issuer;

        if !self.collab.registry.ensure_registered(group).await? {
            return Ok(DeleteAllOutcome::Unregistered);
        }
        if !(elevated || self.store.get(group).await.flag(OptionName::Sde)) {
            return Ok(DeleteAllOutcome::NotPermitted);
        }
        if !parsed.is_confirmation() {
            return Ok(DeleteAllOutcome::Unconfirmed);
        }

        // Claim before forwarding so a duplicate arriving mid-forward is dropped.
        if !self.guards.claim_delete_all(group, user).await {
            debug!(group = group.0, user = user.0, "delete-all already actioned");
            return Ok(DeleteAllOutcome::AlreadyActioned);
        }

        let forwarded = self
            .collab
            .evidence
            .forward(event, DAFM_ACTION, DAFM_CATEGORY, OptionName::Sde.as_str())
            .await;
        let handle = match forwarded {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                self.guards.release_delete_all(group, user).await;
                return Ok(DeleteAllOutcome::NoEvidence);
            }
            Err(e) => {
                self.guards.release_delete_all(group, user).await;
                return Err(e);
            }
        };

        let escalation = self.collab.escalation.clone();
        self.background.spawn("dafm-help", async move {
            escalation.request_help(HelpAction::Delete, group, user).await
        });

        let reporter = self.collab.reporter.clone();
        let record = DebugRecord {
            group,
            action: DAFM_ACTION.to_string(),
            user,
            message: event.message,
            evidence: Some(handle),
        };
        self.background
            .spawn("dafm-debug", async move { reporter.debug_report(record).await });

        info!(group = group.0, user = user.0, "delete-all-from-me escalated");
        Ok(DeleteAllOutcome::Escalated(handle))
    }

    /// Delete everything between the command and the message it replies to.
    pub async fn purge(
        &self,
        event: &CommandEvent,
        elevated: bool,
        parsed: &ParsedCommand,
    ) -> Result<PurgeOutcome> {
        if !elevated {
            return Ok(PurgeOutcome::NotPermitted);
        }
        let Some(target) = event.reply_to else {
            return Ok(PurgeOutcome::NoReplyTarget);
        };

        let group = event.group;
        if !self.guards.claim_purge(group).await {
            debug!(group = group.0, "purge ignored: guard held");
            return Ok(PurgeOutcome::InFlight);
        }

        let release = self.cfg.purge_guard == PurgeGuardPolicy::ReleaseOnCompletion;
        let mut text = field("Admin", event.issuer.0.to_string());
        text += &field("Action", "purge messages");

        let outcome = match purge_span(group, event.message, target, self.cfg.purge_limit) {
            Ok(span) => {
                let transport = self.collab.transport.clone();
                let guards = self.guards.clone();
                let ids = span.ids.clone();
                self.background.spawn("purge", async move {
                    let res = transport.delete_messages(group, ids).await;
                    if release {
                        guards.release_purge(group).await;
                    }
                    res
                });

                text += &field("Status", "executed");
                if let Some(reason) = parsed.rest.as_deref() {
                    text += &field("Reason", reason);
                }
                info!(group = group.0, count = span.len(), "purge scheduled");
                self.report(PURGE_REPORT_SECS, group, text);
                PurgeOutcome::Scheduled(span)
            }
            Err(span) => {
                if release {
                    self.guards.release_purge(group).await;
                }
                text += &field("Status", "not executed");
                text += &field("Reason", "too many messages");
                info!(group = group.0, distance = span, "purge refused: too many messages");
                self.report(PURGE_FAILURE_REPORT_SECS, group, text);
                PurgeOutcome::TooMany { span }
            }
        };

        Ok(outcome)
    }

    fn report(&self, delay: u64, group: ChatId, text: String) {
        let reporter = self.collab.reporter.clone();
        self.background.spawn("purge-report", async move {
            reporter.report(delay, group, &text).await
        });
    }
}

/// Ids between `command` and `target`, or the distance if it exceeds `limit`.
fn purge_span(
    chat_id: ChatId,
    command: MessageId,
    target: MessageId,
    limit: i32,
) -> std::result::Result<MessageSpan, i64> {
    let (a, b) = (i64::from(command.0), i64::from(target.0));
    let distance = (b - a).abs();
    if distance > i64::from(limit) {
        return Err(distance);
    }
    Ok(MessageSpan {
        chat_id,
        ids: command.0.min(target.0)..command.0.max(target.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::parser::parse_command;
    use crate::testing::{event, test_config, EvidenceMode, Harness, ADMIN, GROUP, MEMBER};

    fn coordinator(h: &Harness) -> DestructiveCoordinator {
        DestructiveCoordinator::new(
            h.cfg.clone(),
            h.store.clone(),
            h.guards.clone(),
            h.collaborators(),
            h.background.clone(),
        )
    }

    fn parsed(text: &str) -> ParsedCommand {
        parse_command(text, &["/".to_string()]).unwrap()
    }

    fn purge_event(message: i32, reply_to: i32) -> CommandEvent {
        let mut ev = event(ADMIN, message, "/purge spam wave");
        ev.reply_to = Some(MessageId(reply_to));
        ev
    }

    async fn enable_sde(h: &Harness, on: bool) {
        h.store.register(GROUP).await;
        let mut cfg = h.store.get(GROUP).await;
        cfg.set_flag(OptionName::Sde, on);
        h.store.commit(GROUP, cfg).await;
    }

    #[test]
    fn span_limit_is_inclusive() {
        let ok = purge_span(GROUP, MessageId(100), MessageId(1100), 1000).unwrap();
        assert_eq!(ok.ids, 100..1100);
        assert_eq!(ok.len(), 1000);

        assert_eq!(
            purge_span(GROUP, MessageId(100), MessageId(1101), 1000),
            Err(1001)
        );

        let back = purge_span(GROUP, MessageId(500), MessageId(450), 1000).unwrap();
        assert_eq!(back.ids, 450..500);
    }

    #[tokio::test]
    async fn purge_within_bound_deletes_range() {
        let h = Harness::new();
        let c = coordinator(&h);
        let ev = purge_event(100, 1100);

        let out = c.purge(&ev, true, &parsed(&ev.text)).await.unwrap();
        assert!(matches!(out, PurgeOutcome::Scheduled(ref s) if s.ids == (100..1100)));

        h.background.idle().await;
        assert_eq!(h.transport.bulk_deleted(), vec![(GROUP, 100..1100)]);
        let reports = h.reporter.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].html.contains("spam wave"));
    }

    #[tokio::test]
    async fn purge_over_bound_deletes_nothing() {
        let h = Harness::new();
        let c = coordinator(&h);
        let ev = purge_event(100, 1101);

        let out = c.purge(&ev, true, &parsed(&ev.text)).await.unwrap();
        assert_eq!(out, PurgeOutcome::TooMany { span: 1001 });

        h.background.idle().await;
        assert!(h.transport.bulk_deleted().is_empty());
        assert!(h.reporter.reports()[0].html.contains("too many messages"));
    }

    #[tokio::test]
    async fn purge_requires_privilege_and_reply() {
        let h = Harness::new();
        let c = coordinator(&h);

        let ev = purge_event(100, 50);
        assert_eq!(
            c.purge(&ev, false, &parsed(&ev.text)).await.unwrap(),
            PurgeOutcome::NotPermitted
        );

        let ev = event(ADMIN, 100, "/purge");
        assert_eq!(
            c.purge(&ev, true, &parsed(&ev.text)).await.unwrap(),
            PurgeOutcome::NoReplyTarget
        );
        assert!(!h.guards.purge_in_flight(GROUP).await);
    }

    #[tokio::test]
    async fn concurrent_purges_run_once() {
        let h = Harness::new();
        let c = Arc::new(coordinator(&h));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let c = c.clone();
            handles.push(tokio::spawn(async move {
                let ev = purge_event(200, 150);
                c.purge(&ev, true, &parsed(&ev.text)).await.unwrap()
            }));
        }
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, PurgeOutcome::Scheduled(_)))
                .count(),
            1
        );
        assert!(outcomes.contains(&PurgeOutcome::InFlight));

        h.background.idle().await;
        assert_eq!(h.transport.bulk_deleted().len(), 1);
        // Guard outlives the purge by default.
        assert!(h.guards.purge_in_flight(GROUP).await);
    }

    #[tokio::test]
    async fn release_policy_allows_next_purge() {
        let mut cfg = test_config();
        cfg.purge_guard = PurgeGuardPolicy::ReleaseOnCompletion;
        let h = Harness::with_config(cfg);
        let c = coordinator(&h);

        let ev = purge_event(200, 150);
        c.purge(&ev, true, &parsed(&ev.text)).await.unwrap();
        h.background.idle().await;
        assert!(!h.guards.purge_in_flight(GROUP).await);

        let ev = purge_event(300, 5000);
        c.purge(&ev, true, &parsed(&ev.text)).await.unwrap();
        assert!(!h.guards.purge_in_flight(GROUP).await);

        let ev = purge_event(400, 390);
        let out = c.purge(&ev, true, &parsed(&ev.text)).await.unwrap();
        assert!(matches!(out, PurgeOutcome::Scheduled(_)));
        h.background.idle().await;
        assert_eq!(h.transport.bulk_deleted().len(), 2);
    }

    #[tokio::test]
    async fn dafm_escalates_once_per_user() {
        let h = Harness::new();
        enable_sde(&h, true).await;
        let c = coordinator(&h);
        let ev = event(MEMBER, 10, "/dafm yes");

        let first = c.delete_all_from_me(&ev, false, &parsed(&ev.text)).await.unwrap();
        assert!(matches!(first, DeleteAllOutcome::Escalated(_)));
        let second = c.delete_all_from_me(&ev, false, &parsed(&ev.text)).await.unwrap();
        assert_eq!(second, DeleteAllOutcome::AlreadyActioned);

        h.background.idle().await;
        assert_eq!(h.evidence.forwards(), 1);
        assert_eq!(
            h.escalation.requests(),
            vec![(HelpAction::Delete, GROUP, MEMBER)]
        );
        let debug = h.reporter.debug_records();
        assert_eq!(debug.len(), 1);
        assert!(debug[0].evidence.is_some());

        // Another user in the same group is independent.
        let other = event(UserId(201), 11, "/dafm Y");
        let out = c.delete_all_from_me(&other, false, &parsed(&other.text)).await.unwrap();
        assert!(matches!(out, DeleteAllOutcome::Escalated(_)));
    }

    #[tokio::test]
    async fn concurrent_dafm_duplicates_forward_once() {
        let h = Harness::new();
        enable_sde(&h, true).await;
        let c = Arc::new(coordinator(&h));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let c = c.clone();
            handles.push(tokio::spawn(async move {
                let ev = event(MEMBER, 10, "/dafm yes");
                c.delete_all_from_me(&ev, false, &parsed(&ev.text)).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        h.background.idle().await;
        assert_eq!(h.evidence.forwards(), 1);
        assert_eq!(h.escalation.requests().len(), 1);
    }

    #[tokio::test]
    async fn dafm_respects_sde_and_privilege() {
        let h = Harness::new();
        enable_sde(&h, false).await;
        let c = coordinator(&h);

        let ev = event(MEMBER, 10, "/dafm yes");
        assert_eq!(
            c.delete_all_from_me(&ev, false, &parsed(&ev.text)).await.unwrap(),
            DeleteAllOutcome::NotPermitted
        );

        let ev = event(ADMIN, 11, "/dafm yes");
        let out = c.delete_all_from_me(&ev, true, &parsed(&ev.text)).await.unwrap();
        assert!(matches!(out, DeleteAllOutcome::Escalated(_)));

        h.background.idle().await;
        assert_eq!(h.evidence.forwards(), 1);
        assert_eq!(h.escalation.requests(), vec![(HelpAction::Delete, GROUP, ADMIN)]);
    }

    #[tokio::test]
    async fn dafm_needs_confirmation() {
        let h = Harness::new();
        enable_sde(&h, true).await;
        let c = coordinator(&h);

        for text in ["/dafm", "/dafm no", "/dafm yes please"] {
            let ev = event(MEMBER, 10, text);
            assert_eq!(
                c.delete_all_from_me(&ev, false, &parsed(text)).await.unwrap(),
                DeleteAllOutcome::Unconfirmed
            );
        }
        assert_eq!(h.evidence.forwards(), 0);
    }

    #[tokio::test]
    async fn dafm_retry_allowed_after_forward_failure() {
        let h = Harness::new();
        enable_sde(&h, true).await;
        let c = coordinator(&h);
        let ev = event(MEMBER, 10, "/dafm yes");

        h.evidence.set_mode(EvidenceMode::Absent);
        assert_eq!(
            c.delete_all_from_me(&ev, false, &parsed(&ev.text)).await.unwrap(),
            DeleteAllOutcome::NoEvidence
        );

        h.evidence.set_mode(EvidenceMode::Fail);
        assert!(c.delete_all_from_me(&ev, false, &parsed(&ev.text)).await.is_err());
        assert!(!h.guards.delete_all_actioned(GROUP, MEMBER).await);

        h.background.idle().await;
        assert!(h.escalation.requests().is_empty());

        h.evidence.set_mode(EvidenceMode::Forward);
        let out = c.delete_all_from_me(&ev, false, &parsed(&ev.text)).await.unwrap();
        assert!(matches!(out, DeleteAllOutcome::Escalated(_)));
        assert!(h.guards.delete_all_actioned(GROUP, MEMBER).await);
    }

    #[tokio::test]
    async fn dafm_registers_unknown_group() {
        let h = Harness::new();
        let c = coordinator(&h);
        let ev = event(ADMIN, 10, "/dafm yes");

        c.delete_all_from_me(&ev, true, &parsed(&ev.text)).await.unwrap();
        assert!(h.store.contains(GROUP).await);
        assert_eq!(h.persistence.saves(), 1);
    }
}
