use std::{collections::BTreeMap, sync::Arc};

use tracing::info;

use modbot_core::{
    config::Config,
    options::GroupConfig,
    persistence::JsonFilePersistence,
    ports::Persistence,
    store::{ConfigStore, CONFIGS_STORE},
};

#[tokio::main]
async fn main() -> Result<(), modbot_core::Error> {
    modbot_core::logging::init("modbot")?;

    let cfg = Arc::new(Config::load()?);
    let persistence = Arc::new(JsonFilePersistence::new(cfg.data_dir.clone())?);

    let snapshot: BTreeMap<i64, GroupConfig> = match persistence.load(CONFIGS_STORE).await? {
        Some(v) => serde_json::from_value(v)?,
        None => BTreeMap::new(),
    };
    info!(groups = snapshot.len(), dir = %persistence.dir().display(), "configs loaded");
    let store = Arc::new(ConfigStore::with_snapshot(snapshot));

    modbot_telegram::router::run_polling(cfg, store, persistence)
        .await
        .map_err(|e| modbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
