//! In-memory fakes of every port, shared by the unit tests.

use std::{
    collections::HashSet,
    ops::Range,
    sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    background::Background,
    config::{Config, PurgeGuardPolicy},
    domain::{ChatId, CommandEvent, GroupInfo, MessageId, MessageRef, UserId},
    errors::Error,
    ports::{
        Collaborators, ConfigSessionRequest, ConfigSessionService, DebugRecord, EscalationService,
        EvidenceHandle, EvidenceService, GroupRegistry, HelpAction, Persistence, Privilege,
        Reporting, Transport,
    },
    registry::StoreRegistry,
    store::{ConfigStore, DedupGuards},
    Result,
};

pub const GROUP: ChatId = ChatId(-1001);
pub const ADMIN: UserId = UserId(100);
pub const MEMBER: UserId = UserId(200);
pub const EVIDENCE_CHANNEL: ChatId = ChatId(-500);

pub fn test_config() -> Config {
    Config {
        bot_token: "x".to_string(),
        prefixes: vec!["/".to_string(), "!".to_string()],
        sender: "CLEAN".to_string(),
        project_name: "CLEAN".to_string(),
        project_link: String::new(),
        version: "0.1.0".to_string(),
        debug_channel_id: ChatId(-900),
        logging_channel_id: EVIDENCE_CHANNEL,
        exchange_channel_id: ChatId(-700),
        test_group_id: Some(ChatId(-42)),
        data_dir: "/tmp".into(),
        config_lock_secs: 310,
        purge_limit: 1000,
        purge_guard: PurgeGuardPolicy::ProcessLifetime,
    }
}

pub fn event(issuer: UserId, message: i32, text: &str) -> CommandEvent {
    CommandEvent {
        group: GROUP,
        message: MessageId(message),
        issuer,
        text: text.to_string(),
        reply_to: None,
    }
}

#[derive(Clone, Debug)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub html: String,
    pub reply_to: Option<MessageId>,
}

#[derive(Default)]
pub struct FakeTransport {
    next_id: AtomicI32,
    fail_forwards: AtomicBool,
    sends: Mutex<Vec<SentMessage>>,
    deletes: Mutex<Vec<MessageRef>>,
    bulk_deletes: Mutex<Vec<(ChatId, Range<i32>)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1),
            ..Default::default()
        }
    }

    pub fn fail_forwards(&self) {
        self.fail_forwards.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sends.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn bulk_deleted(&self) -> Vec<(ChatId, Range<i32>)> {
        self.bulk_deletes.lock().unwrap().clone()
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        html: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.sends.lock().unwrap().push(SentMessage {
            chat_id,
            html: html.to_string(),
            reply_to,
        });
        Ok(self.alloc(chat_id))
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.deletes.lock().unwrap().push(msg);
        Ok(())
    }

    async fn delete_messages(&self, chat_id: ChatId, ids: Range<i32>) -> Result<()> {
        // Let a concurrent purge observe the in-flight guard.
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.bulk_deletes.lock().unwrap().push((chat_id, ids));
        Ok(())
    }

    async fn forward_message(&self, _msg: MessageRef, to: ChatId) -> Result<MessageRef> {
        if self.fail_forwards.load(Ordering::SeqCst) {
            return Err(Error::External("forward refused".to_string()));
        }
        Ok(self.alloc(to))
    }

    async fn get_group_info(&self, chat_id: ChatId) -> Result<GroupInfo> {
        Ok(GroupInfo {
            name: format!("Group {}", chat_id.0),
            link: format!("https://t.me/c/{}", chat_id.0),
        })
    }
}

#[derive(Default)]
pub struct FakePrivilege {
    elevated: Mutex<HashSet<UserId>>,
    checks: Mutex<usize>,
    panics: AtomicBool,
}

impl FakePrivilege {
    pub fn with_admin(user: UserId) -> Self {
        let p = Self::default();
        p.elevated.lock().unwrap().insert(user);
        p
    }

    /// Make every lookup panic, as a buggy adapter would.
    pub fn panic_on_check(&self) {
        self.panics.store(true, Ordering::SeqCst);
    }

    pub fn checks(&self) -> usize {
        *self.checks.lock().unwrap()
    }
}

#[async_trait]
impl Privilege for FakePrivilege {
    async fn is_elevated(&self, event: &CommandEvent) -> bool {
        if self.panics.load(Ordering::SeqCst) {
            panic!("privilege lookup exploded");
        }
        *self.checks.lock().unwrap() += 1;
        self.elevated.lock().unwrap().contains(&event.issuer)
    }
}

#[derive(Default)]
pub struct FakePersistence {
    saved: Mutex<Vec<(String, serde_json::Value)>>,
    failing: AtomicBool,
}

impl FakePersistence {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<(String, serde_json::Value)> {
        self.saved.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Persistence for FakePersistence {
    async fn save(&self, store: &str, data: serde_json::Value) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::External("disk full".to_string()));
        }
        self.saved.lock().unwrap().push((store.to_string(), data));
        Ok(())
    }

    async fn load(&self, _store: &str) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvidenceMode {
    Forward,
    Absent,
    Fail,
}

pub struct FakeEvidence {
    mode: Mutex<EvidenceMode>,
    forwards: Mutex<Vec<(ChatId, UserId)>>,
    next_id: AtomicI32,
}

impl Default for FakeEvidence {
    fn default() -> Self {
        Self {
            mode: Mutex::new(EvidenceMode::Forward),
            forwards: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1),
        }
    }
}

impl FakeEvidence {
    pub fn set_mode(&self, mode: EvidenceMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn forwards(&self) -> usize {
        self.forwards.lock().unwrap().len()
    }
}

#[async_trait]
impl EvidenceService for FakeEvidence {
    async fn forward(
        &self,
        event: &CommandEvent,
        _reason: &str,
        _category: &str,
        _flag: &str,
    ) -> Result<Option<EvidenceHandle>> {
        // Give duplicates a chance to interleave with the forward.
        tokio::task::yield_now().await;
        let mode = *self.mode.lock().unwrap();
        match mode {
            EvidenceMode::Fail => Err(Error::External("evidence channel gone".to_string())),
            EvidenceMode::Absent => Ok(None),
            EvidenceMode::Forward => {
                self.forwards
                    .lock()
                    .unwrap()
                    .push((event.group, event.issuer));
                Ok(Some(EvidenceHandle {
                    message: MessageRef {
                        chat_id: EVIDENCE_CHANNEL,
                        message_id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
                    },
                }))
            }
        }
    }
}

#[derive(Default)]
pub struct FakeEscalation {
    requests: Mutex<Vec<(HelpAction, ChatId, UserId)>>,
}

impl FakeEscalation {
    pub fn requests(&self) -> Vec<(HelpAction, ChatId, UserId)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl EscalationService for FakeEscalation {
    async fn request_help(&self, action: HelpAction, group: ChatId, user: UserId) -> Result<()> {
        self.requests.lock().unwrap().push((action, group, user));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSessions {
    asks: Mutex<Vec<ConfigSessionRequest>>,
}

impl FakeSessions {
    pub fn asks(&self) -> Vec<ConfigSessionRequest> {
        self.asks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigSessionService for FakeSessions {
    async fn ask(&self, request: ConfigSessionRequest) -> Result<()> {
        self.asks.lock().unwrap().push(request);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Report {
    pub delete_after_secs: u64,
    pub chat_id: ChatId,
    pub html: String,
}

#[derive(Default)]
pub struct FakeReporter {
    reports: Mutex<Vec<Report>>,
    debug: Mutex<Vec<DebugRecord>>,
}

impl FakeReporter {
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn debug_records(&self) -> Vec<DebugRecord> {
        self.debug.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reporting for FakeReporter {
    async fn report(&self, delete_after_secs: u64, chat_id: ChatId, html: &str) -> Result<()> {
        self.reports.lock().unwrap().push(Report {
            delete_after_secs,
            chat_id,
            html: html.to_string(),
        });
        Ok(())
    }

    async fn debug_report(&self, record: DebugRecord) -> Result<()> {
        self.debug.lock().unwrap().push(record);
        Ok(())
    }
}

/// A fully wired set of fakes around a fresh store.
pub struct Harness {
    pub cfg: Arc<Config>,
    pub store: Arc<ConfigStore>,
    pub guards: Arc<DedupGuards>,
    pub background: Background,
    pub transport: Arc<FakeTransport>,
    pub privilege: Arc<FakePrivilege>,
    pub persistence: Arc<FakePersistence>,
    pub evidence: Arc<FakeEvidence>,
    pub escalation: Arc<FakeEscalation>,
    pub sessions: Arc<FakeSessions>,
    pub reporter: Arc<FakeReporter>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(cfg: Config) -> Self {
        Self {
            cfg: Arc::new(cfg),
            store: Arc::new(ConfigStore::new()),
            guards: Arc::new(DedupGuards::new()),
            background: Background::new(),
            transport: Arc::new(FakeTransport::new()),
            privilege: Arc::new(FakePrivilege::with_admin(ADMIN)),
            persistence: Arc::new(FakePersistence::default()),
            evidence: Arc::new(FakeEvidence::default()),
            escalation: Arc::new(FakeEscalation::default()),
            sessions: Arc::new(FakeSessions::default()),
            reporter: Arc::new(FakeReporter::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        let registry: Arc<dyn GroupRegistry> = Arc::new(StoreRegistry::new(
            self.store.clone(),
            self.persistence.clone(),
        ));
        Collaborators {
            transport: self.transport.clone(),
            privilege: self.privilege.clone(),
            registry,
            persistence: self.persistence.clone(),
            evidence: self.evidence.clone(),
            escalation: self.escalation.clone(),
            sessions: self.sessions.clone(),
            reporter: self.reporter.clone(),
        }
    }
}
