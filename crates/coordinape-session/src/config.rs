/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed session settings and derived adapter configs
[POS]:    Configuration layer - composition root inputs
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use coordinape_adapter::{ClientConfig, ConnectorKind, ErrorPurge, SessionConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the session runner
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    /// Backend base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Credential store file; defaults to the platform data dir
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    #[serde(default = "default_activation_timeout_secs")]
    pub activation_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Which cached tokens a provider error wipes
    #[serde(default)]
    pub error_purge: ErrorPurge,
    #[serde(default)]
    pub wallet: WalletSettings,
}

/// Local wallet configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletSettings {
    /// Environment variable holding the hex private key
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
    /// Connector kind the local key is registered under
    #[serde(default = "default_connector")]
    pub connector: ConnectorKind,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
            connector: default_connector(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            credentials_path: None,
            activation_timeout_secs: default_activation_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            error_purge: ErrorPurge::default(),
            wallet: WalletSettings::default(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.coordinape.com/api".to_string()
}

fn default_activation_timeout_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_private_key_env() -> String {
    "COORDINAPE_PRIVATE_KEY".to_string()
}

fn default_connector() -> ConnectorKind {
    ConnectorKind::Injected
}

impl SessionSettings {
    /// Load configuration from YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(content).context("parse config yaml")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_url).with_context(|| format!("invalid api_url {}", self.api_url))?;
        if self.activation_timeout_secs == 0 {
            return Err(anyhow!("activation_timeout_secs must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be positive"));
        }
        if self.wallet.private_key_env.is_empty() {
            return Err(anyhow!("wallet.private_key_env cannot be empty"));
        }
        Ok(())
    }

    /// Configured store path, or `<data dir>/coordinape/credentials.json`
    pub fn credentials_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.credentials_path {
            return Ok(path.clone());
        }
        let mut path = dirs::data_dir().context("no platform data directory; set credentials_path")?;
        path.push("coordinape");
        path.push("credentials.json");
        Ok(path)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.request_timeout_secs),
            ..ClientConfig::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            activation_timeout: Duration::from_secs(self.activation_timeout_secs),
            error_purge: self.error_purge,
        }
    }

    /// Read the wallet key from the configured environment variable
    pub fn private_key(&self) -> Result<String> {
        std::env::var(&self.wallet.private_key_env)
            .with_context(|| format!("environment variable {} is not set", self.wallet.private_key_env))
    }
}
