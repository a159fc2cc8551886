//! Process-wide per-group state: configs, lock timestamps and dedup guards.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    domain::{ChatId, UserId},
    options::GroupConfig,
};

/// Name under which the config map is persisted.
pub const CONFIGS_STORE: &str = "configs";

#[derive(Default)]
pub struct ConfigStore {
    configs: RwLock<HashMap<ChatId, GroupConfig>>,
    writers: GroupLocks,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from a persisted snapshot.
    pub fn with_snapshot(snapshot: BTreeMap<i64, GroupConfig>) -> Self {
        let configs = snapshot
            .into_iter()
            .map(|(gid, cfg)| (ChatId(gid), cfg))
            .collect();
        Self {
            configs: RwLock::new(configs),
            writers: GroupLocks::default(),
        }
    }

    pub async fn contains(&self, group: ChatId) -> bool {
        self.configs.read().await.contains_key(&group)
    }

    /// Insert factory defaults for an unknown group. Returns `true` if inserted.
    pub async fn register(&self, group: ChatId) -> bool {
        let mut map = self.configs.write().await;
        if map.contains_key(&group) {
            return false;
        }
        map.insert(group, GroupConfig::factory());
        true
    }

    /// Copy of the group's config; unknown groups read as factory defaults.
    pub async fn get(&self, group: ChatId) -> GroupConfig {
        self.configs
            .read()
            .await
            .get(&group)
            .cloned()
            .unwrap_or_default()
    }

    /// Take the config lock if it is older than `window_secs`.
    ///
    /// The check and the write happen under one write lock, so two concurrent
    /// session requests cannot both succeed. Returns the config as it was
    /// when the lock was taken.
    pub async fn try_lock(&self, group: ChatId, now: i64, window_secs: i64) -> Option<GroupConfig> {
        let mut map = self.configs.write().await;
        let cfg = map.entry(group).or_default();
        if cfg.lock_age(now) <= window_secs {
            return None;
        }
        cfg.lock = now;
        Some(cfg.clone())
    }

    /// Replace the stored config if it differs. Returns `true` if it changed.
    ///
    /// An unknown group already reads as factory defaults, so committing the
    /// factory config for it is not a change.
    pub async fn commit(&self, group: ChatId, cfg: GroupConfig) -> bool {
        let mut map = self.configs.write().await;
        let unchanged = match map.get(&group) {
            Some(existing) => existing == &cfg,
            None => cfg == GroupConfig::factory(),
        };
        if unchanged {
            return false;
        }
        map.insert(group, cfg);
        true
    }

    /// Serialize access for one group's read-modify-write cycle.
    pub async fn writer(&self, group: ChatId) -> OwnedMutexGuard<()> {
        self.writers.lock_group(group).await
    }

    pub async fn snapshot(&self) -> BTreeMap<i64, GroupConfig> {
        self.configs
            .read()
            .await
            .iter()
            .map(|(gid, cfg)| (gid.0, cfg.clone()))
            .collect()
    }
}

#[derive(Default)]
pub struct GroupLocks {
    inner: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl GroupLocks {
    pub async fn lock_group(&self, group: ChatId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(group)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Dedup sets for destructive actions.
///
/// Every check-and-insert is a single `HashSet::insert` under the mutex, so
/// at most one caller claims a given key.
#[derive(Default)]
pub struct DedupGuards {
    purge: Mutex<HashSet<ChatId>>,
    delete_all: Mutex<HashSet<(ChatId, UserId)>>,
}

impl DedupGuards {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn claim_purge(&self, group: ChatId) -> bool {
        self.purge.lock().await.insert(group)
    }

    pub async fn release_purge(&self, group: ChatId) {
        self.purge.lock().await.remove(&group);
    }

    #[cfg(test)]
    pub(crate) async fn purge_in_flight(&self, group: ChatId) -> bool {
        self.purge.lock().await.contains(&group)
    }

    pub async fn claim_delete_all(&self, group: ChatId, user: UserId) -> bool {
        self.delete_all.lock().await.insert((group, user))
    }

    pub async fn release_delete_all(&self, group: ChatId, user: UserId) {
        self.delete_all.lock().await.remove(&(group, user));
    }

    #[cfg(test)]
    pub(crate) async fn delete_all_actioned(&self, group: ChatId, user: UserId) -> bool {
        self.delete_all.lock().await.contains(&(group, user))
    }
}
