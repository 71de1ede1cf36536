/*
[INPUT]:  Wallet addresses, issued tokens, store file path
[OUTPUT]: Durable address -> token cache and last-used connector
[POS]:    Auth layer - persistent credential storage
[UPDATE]: When token storage format or file layout changes
*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::http::Result;
use crate::types::ConnectorKind;

use super::wallet::normalize_address;

/// Token cached for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedSession {
    #[serde(default)]
    connector: Option<ConnectorKind>,
    #[serde(default)]
    tokens: BTreeMap<String, StoredToken>,
}

/// Address -> token cache, read once at startup and written on every change
#[derive(Debug)]
pub struct CredentialStore {
    path: Option<PathBuf>,
    data: PersistedSession,
}

impl CredentialStore {
    /// Load the store at `path`; a missing or unreadable file starts empty
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<PersistedSession>(&content) {
                Ok(data) => data,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "credential store is corrupt; starting empty");
                    PersistedSession::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => PersistedSession::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), tokens = data.tokens.len(), "credential store loaded");
        Ok(Self {
            path: Some(path),
            data,
        })
    }

    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: PersistedSession::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn token(&self, address: &str) -> Option<&str> {
        self.entry(address).map(|entry| entry.token.as_str())
    }

    pub fn entry(&self, address: &str) -> Option<&StoredToken> {
        self.data.tokens.get(&normalize_address(address))
    }

    /// Addresses with a cached token, sorted
    pub fn addresses(&self) -> Vec<String> {
        self.data.tokens.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.data.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.tokens.is_empty()
    }

    /// Connector kind of the last successful activation
    pub fn connector(&self) -> Option<ConnectorKind> {
        self.data.connector
    }

    pub async fn save(&mut self, address: &str, token: &str) -> Result<()> {
        let entry = StoredToken {
            token: token.to_string(),
            issued_at: Utc::now(),
        };
        self.commit(|data| {
            data.tokens.insert(normalize_address(address), entry);
        })
        .await
    }

    /// Remove the entry for `address`; returns whether one existed
    pub async fn remove(&mut self, address: &str) -> Result<bool> {
        let address = normalize_address(address);
        if !self.data.tokens.contains_key(&address) {
            return Ok(false);
        }
        self.commit(|data| {
            data.tokens.remove(&address);
        })
        .await?;
        Ok(true)
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.commit(|data| data.tokens.clear()).await
    }

    pub async fn set_connector(&mut self, connector: Option<ConnectorKind>) -> Result<()> {
        if self.data.connector == connector {
            return Ok(());
        }
        self.commit(|data| data.connector = connector).await
    }

    /// Apply `change` to a copy, write it, and keep it only if the write succeeded
    async fn commit(&mut self, change: impl FnOnce(&mut PersistedSession)) -> Result<()> {
        let mut next = self.data.clone();
        change(&mut next);
        if let Some(path) = &self.path
            && let Err(err) = persist(path, &next).await
        {
            warn!(path = %path.display(), error = %err, "credential store write failed; keeping previous contents");
            return Err(err);
        }
        self.data = next;
        Ok(())
    }
}

async fn persist(path: &Path, data: &PersistedSession) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }

    let content = serde_json::to_string_pretty(data)?;

    // Atomic write: write to temp file then rename
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).await?;
    restrict_permissions(&temp_path).await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
