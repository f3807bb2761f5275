use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SessionStore, StoreError};

/// A stored value together with the time it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: String,
    pub stored_at: DateTime<Utc>,
}

impl StoredValue {
    pub fn new(value: String) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.stored_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Stores each key as `<cache_dir>/<key>.json`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Keys like `@auth` become `auth.json`; anything outside
    /// `[A-Za-z0-9_-]` is dropped so a key can never escape the directory.
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        let name = if name.is_empty() { "_" } else { name.as_str() };
        self.dir.join(format!("{}.json", name))
    }

    async fn load(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let path = self.path_for(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(key, e)),
        };
        let stored: StoredValue = serde_json::from_str(&contents)?;
        Ok(Some(stored))
    }

    /// Human-readable age of the value under `key`, or "never"
    pub async fn age_display(&self, key: &str) -> String {
        match self.load(key).await {
            Ok(Some(stored)) => stored.age_display(),
            Ok(None) => "never".to_string(),
            Err(e) => {
                debug!(key, error = %e, "Failed to load stored value for age display");
                "never".to_string()
            }
        }
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load(key).await?.map(|s| s.value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(key, e))?;
        let contents = serde_json::to_string_pretty(&StoredValue::new(value.to_string()))?;

        // Write beside the target and rename over it so readers never see a
        // partially written file
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| StoreError::io(key, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(key, e));
        }
        debug!(key, "Stored value written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }
}
