//! JSON file persistence: one `<name>.json` per store under the data dir.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::{errors::Error, ports::Persistence, Result};

pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if dir.exists() && !dir.is_dir() {
            return Err(Error::InvalidPath {
                path: dir,
                reason: "data dir is not a directory".to_string(),
            });
        }
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, store: &str) -> Result<PathBuf> {
        if store.is_empty()
            || !store
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidPath {
                path: self.dir.join(store),
                reason: "store names are limited to [A-Za-z0-9_-]".to_string(),
            });
        }
        Ok(self.dir.join(format!("{store}.json")))
    }
}

#[async_trait]
impl Persistence for JsonFilePersistence {
    async fn save(&self, store: &str, data: serde_json::Value) -> Result<()> {
        let path = self.path_for(store)?;
        let tmp = path.with_extension("json.tmp");
        let txt = serde_json::to_string(&data)?;

        // Write-then-rename so a crash never leaves a truncated store behind.
        tokio::fs::write(&tmp, txt).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(store, path = %path.display(), "store saved");
        Ok(())
    }

    async fn load(&self, store: &str) -> Result<Option<serde_json::Value>> {
        let path = self.path_for(store)?;
        if !path.exists() {
            return Ok(None);
        }
        let txt = tokio::fs::read_to_string(&path).await?;
        if txt.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&txt)?))
    }
}
