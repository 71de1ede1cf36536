/*
[INPUT]:  EVM private key (hex string)
[OUTPUT]: Signed personal messages and a connector that serves them
[POS]:    Auth layer - local-key wallet provider implementation
[UPDATE]: When signing logic or EVM address formatting changes
*/

use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::http::{CoordinapeError, Result};
use crate::types::ConnectorKind;

use super::connector::{Activation, Connector, ProviderEvent};
use super::wallet::{WalletProvider, normalize_address};

/// Wallet provider backed by a private key held in process
pub struct LocalKeyProvider {
    signer: PrivateKeySigner,
    address: String,
}

impl LocalKeyProvider {
    /// Create a provider from a hex-encoded private key
    ///
    /// Supports both "0x"-prefixed and non-prefixed hex strings.
    pub fn new(private_key_hex: &str) -> Result<Self> {
        let private_key_hex = private_key_hex.trim();
        let private_key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
        let signer = PrivateKeySigner::from_str(private_key_hex)
            .map_err(|e| CoordinapeError::Config(format!("Invalid EVM private key: {e}")))?;

        let address = signer.address().to_checksum(None);

        Ok(Self { signer, address })
    }

    /// EIP-55 checksummed address
    pub fn checksum_address(&self) -> &str {
        &self.address
    }

    pub fn address_lowercase(&self) -> String {
        normalize_address(&self.address)
    }
}

#[async_trait]
impl WalletProvider for LocalKeyProvider {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| CoordinapeError::Connection(format!("Failed to sign message: {e}")))?;

        // r || s || v
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}

/// Connector that "connects" instantly to a [`LocalKeyProvider`]
pub struct LocalKeyConnector {
    kind: ConnectorKind,
    provider: Arc<LocalKeyProvider>,
    events: Mutex<Option<mpsc::UnboundedSender<ProviderEvent>>>,
}

impl LocalKeyConnector {
    pub fn new(kind: ConnectorKind, provider: LocalKeyProvider) -> Self {
        Self {
            kind,
            provider: Arc::new(provider),
            events: Mutex::new(None),
        }
    }

    pub fn from_private_key(kind: ConnectorKind, private_key_hex: &str) -> Result<Self> {
        Ok(Self::new(kind, LocalKeyProvider::new(private_key_hex)?))
    }
}

#[async_trait]
impl Connector for LocalKeyConnector {
    fn kind(&self) -> ConnectorKind {
        self.kind
    }

    async fn activate(&self) -> Result<Activation> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        debug!(kind = %self.kind, address = %self.provider.address_lowercase(), "local key activated");
        Ok(Activation {
            provider: self.provider.clone(),
            events: rx,
        })
    }

    async fn deactivate(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
