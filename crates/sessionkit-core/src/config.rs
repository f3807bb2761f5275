//! Application configuration management.
//!
//! Selects the gateway and session store backends and the soft-failure
//! policy. Configuration is stored at `~/.config/sessionkit/config.json`;
//! a missing file means defaults (mock gateway, file store).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{client::DEFAULT_REQUEST_TIMEOUT_SECS, AuthGateway, HttpGateway, MockGateway};
use crate::auth::{AuthContainer, SESSION_KEY};
use crate::notify::Notifier;
use crate::store::{FileStore, KeyringStore, MemoryStore, SealedStore, SessionStore};

/// Application name used for config/cache directory paths and the keychain service
pub const APP_NAME: &str = "sessionkit";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Salt for deriving the session sealing key from a passphrase
const SEAL_SALT: &[u8] = b"sessionkit/session-store/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    #[default]
    Mock,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    File,
    Keyring,
    Memory,
}

/// What to do with storage failures that do not change the login outcome
/// (persisting after login, removing on logout, writing a new photo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftFailurePolicy {
    /// Log only. The user never sees storage errors.
    #[default]
    Swallow,
    /// Log and also publish to the notification channel.
    Notify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayKind,
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub store: StoreKind,
    pub soft_failure_policy: SoftFailurePolicy,
    /// Name of the environment variable holding the store passphrase.
    /// When set and present, the session is encrypted at rest.
    pub passphrase_env: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayKind::default(),
            base_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            store: StoreKind::default(),
            soft_failure_policy: SoftFailurePolicy::default(),
            passphrase_env: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn build_gateway(&self) -> Result<Arc<dyn AuthGateway>> {
        match self.gateway {
            GatewayKind::Mock => Ok(Arc::new(MockGateway::with_demo_users())),
            GatewayKind::Http => {
                let base_url = self
                    .base_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("base_url is required for the http gateway"))?;
                let gateway =
                    HttpGateway::new(base_url, Duration::from_secs(self.request_timeout_secs))
                        .context("Failed to build HTTP client")?;
                Ok(Arc::new(gateway))
            }
        }
    }

    /// Build the configured store, sealed when a passphrase is available.
    pub fn build_store(&self, cache_dir: PathBuf) -> Result<Arc<dyn SessionStore>> {
        let store: Arc<dyn SessionStore> = match self.store {
            StoreKind::File => Arc::new(FileStore::new(cache_dir)),
            StoreKind::Keyring => Arc::new(KeyringStore::new(APP_NAME)),
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };

        match self.passphrase() {
            Some(passphrase) => {
                let sealed = SealedStore::with_passphrase(store, &passphrase, SEAL_SALT)
                    .context("Failed to derive session store key")?;
                Ok(Arc::new(sealed))
            }
            None => Ok(store),
        }
    }

    fn passphrase(&self) -> Option<String> {
        let var = self.passphrase_env.as_deref()?;
        std::env::var(var).ok().filter(|p| !p.is_empty())
    }

    /// How long ago the session was saved, for file-backed stores only
    pub async fn session_age(&self) -> Result<Option<String>> {
        if self.store != StoreKind::File {
            return Ok(None);
        }
        let store = FileStore::new(Self::cache_dir()?);
        Ok(Some(store.age_display(SESSION_KEY).await))
    }

    /// Wire up an auth container from this configuration
    pub fn open(&self, notifier: impl Notifier + 'static) -> Result<AuthContainer> {
        let store = self.build_store(Self::cache_dir()?)?;
        let gateway = self.build_gateway()?;
        Ok(AuthContainer::new(store, gateway, notifier).with_policy(self.soft_failure_policy))
    }
}
