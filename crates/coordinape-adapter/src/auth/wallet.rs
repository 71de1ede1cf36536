/*
[INPUT]:  Message to sign and the connected wallet account
[OUTPUT]: Signature strings and tagged provider handles
[POS]:    Auth layer - wallet provider abstraction
[UPDATE]: When adding new provider types or changing signature format
*/

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::http::{CoordinapeError, Result};
use crate::types::ConnectorKind;

/// Trait for wallet signing operations
///
/// The trait is async because signing usually waits on a human approving a
/// prompt in the wallet UI.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Account currently selected in the wallet
    fn address(&self) -> String;

    /// Sign a personal message (EIP-191) and return the `0x`-prefixed signature
    ///
    /// Must return [`CoordinapeError::UserRejected`] when the prompt is dismissed.
    async fn sign_message(&self, message: &str) -> Result<String>;
}

/// A live provider tagged with the connector kind that created it
#[derive(Clone)]
pub struct ProviderHandle {
    kind: ConnectorKind,
    provider: Arc<dyn WalletProvider>,
}

impl ProviderHandle {
    pub fn new(kind: ConnectorKind, provider: Arc<dyn WalletProvider>) -> Self {
        Self { kind, provider }
    }

    pub fn kind(&self) -> ConnectorKind {
        self.kind
    }

    /// Lowercased address reported by the provider
    pub fn address(&self) -> String {
        normalize_address(&self.provider.address())
    }

    pub async fn sign_message(&self, message: &str) -> Result<String> {
        self.provider.sign_message(message).await
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("kind", &self.kind)
            .field("address", &self.address())
            .finish()
    }
}

/// Lowercase hex form with a `0x` prefix
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    let hex = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    format!("0x{}", hex.to_ascii_lowercase())
}

#[derive(Debug, Clone)]
enum MockSignBehavior {
    Sign(String),
    Reject,
}

/// Mock wallet provider for testing
#[derive(Debug)]
pub struct MockWalletProvider {
    address: RwLock<String>,
    behavior: RwLock<MockSignBehavior>,
    sign_delay: Option<Duration>,
}

impl MockWalletProvider {
    /// Create a new mock provider with a predetermined signature
    pub fn new(address: &str, signature: &str) -> Self {
        Self {
            address: RwLock::new(address.to_string()),
            behavior: RwLock::new(MockSignBehavior::Sign(signature.to_string())),
            sign_delay: None,
        }
    }

    /// Provider whose signing prompt is always dismissed
    pub fn rejecting(address: &str) -> Self {
        let provider = Self::new(address, "");
        *provider
            .behavior
            .write()
            .unwrap_or_else(PoisonError::into_inner) = MockSignBehavior::Reject;
        provider
    }

    /// Delay every signature by `delay` to simulate a pending approval
    pub fn with_sign_delay(mut self, delay: Duration) -> Self {
        self.sign_delay = Some(delay);
        self
    }

    pub fn set_address(&self, address: &str) {
        *self.address.write().unwrap_or_else(PoisonError::into_inner) = address.to_string();
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        let mut guard = self.behavior.write().unwrap_or_else(PoisonError::into_inner);
        *guard = if rejecting {
            MockSignBehavior::Reject
        } else {
            MockSignBehavior::Sign("0xmock_signature".to_string())
        };
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    fn address(&self) -> String {
        self.address
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn sign_message(&self, _message: &str) -> Result<String> {
        if let Some(delay) = self.sign_delay {
            tokio::time::sleep(delay).await;
        }
        let behavior = self
            .behavior
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match behavior {
            MockSignBehavior::Sign(signature) => Ok(signature),
            MockSignBehavior::Reject => Err(CoordinapeError::UserRejected),
        }
    }
}
