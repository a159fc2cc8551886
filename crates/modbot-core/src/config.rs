use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{domain::ChatId, errors::Error, Result};

/// What happens to a group's purge guard once its purge has been handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PurgeGuardPolicy {
    /// The guard is never cleared: one purge per group for the process lifetime.
    ProcessLifetime,
    /// The guard is cleared when the deletion finishes or the request is refused.
    ReleaseOnCompletion,
}

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub prefixes: Vec<String>,

    // Identity on the exchange channel
    pub sender: String,
    pub project_name: String,
    pub project_link: String,
    pub version: String,

    // Channels
    pub debug_channel_id: ChatId,
    pub logging_channel_id: ChatId,
    pub exchange_channel_id: ChatId,
    pub test_group_id: Option<ChatId>,

    // Storage
    pub data_dir: PathBuf,

    // Behavior
    pub config_lock_secs: i64,
    pub purge_limit: i32,
    pub purge_guard: PurgeGuardPolicy,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let exchange_channel_id = required_chat("EXCHANGE_CHANNEL_ID")?;
        let debug_channel_id = env_i64("DEBUG_CHANNEL_ID")
            .map(ChatId)
            .unwrap_or(exchange_channel_id);
        let logging_channel_id = env_i64("LOGGING_CHANNEL_ID")
            .map(ChatId)
            .unwrap_or(debug_channel_id);
        let test_group_id = env_i64("TEST_GROUP_ID").map(ChatId);

        let prefixes = parse_csv(env_str("BOT_PREFIXES").or_else(|| Some("/,!".to_string())));
        if prefixes.is_empty() {
            return Err(Error::Config("BOT_PREFIXES must not be empty".to_string()));
        }

        let sender = env_str("BOT_SENDER")
            .and_then(non_empty)
            .unwrap_or_else(|| "CLEAN".to_string())
            .to_uppercase();
        let project_name = env_str("PROJECT_NAME").unwrap_or_else(|| sender.clone());
        let project_link = env_str("PROJECT_LINK").unwrap_or_default();

        let data_dir = PathBuf::from(env_str("DATA_DIR").unwrap_or("data".to_string()));
        fs::create_dir_all(&data_dir)?;

        let config_lock_secs = env_i64("CONFIG_LOCK_SECS").unwrap_or(310).max(0);
        let purge_limit = env_i64("PURGE_LIMIT")
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(1000)
            .max(1);
        let purge_guard = parse_purge_guard(env_str("PURGE_GUARD").as_deref())?;

        Ok(Self {
            bot_token,
            prefixes,
            sender,
            project_name,
            project_link,
            version: env!("CARGO_PKG_VERSION").to_string(),
            debug_channel_id,
            logging_channel_id,
            exchange_channel_id,
            test_group_id,
            data_dir,
            config_lock_secs,
            purge_limit,
            purge_guard,
        })
    }

    /// Verb of the direct config command, e.g. `config_clean`.
    pub fn direct_config_verb(&self) -> String {
        format!("config_{}", self.sender.to_lowercase())
    }

    pub fn is_test_group(&self, chat_id: ChatId) -> bool {
        self.test_group_id == Some(chat_id)
    }
}

fn parse_purge_guard(v: Option<&str>) -> Result<PurgeGuardPolicy> {
    match v.map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("process") => Ok(PurgeGuardPolicy::ProcessLifetime),
        Some("release") => Ok(PurgeGuardPolicy::ReleaseOnCompletion),
        Some(other) => Err(Error::Config(format!(
            "PURGE_GUARD must be `process` or `release`, got `{other}`"
        ))),
    }
}

fn required_chat(key: &str) -> Result<ChatId> {
    env_i64(key)
        .map(ChatId)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
