/*
[INPUT]:  Wallet provider SDK handshakes and provider-side notifications
[OUTPUT]: Activated providers plus their event streams
[POS]:    Auth layer - connector abstraction and explicit kind registry
[UPDATE]: When adding connector kinds or provider event types
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::http::{CoordinapeError, Result};
use crate::types::ConnectorKind;

use super::wallet::{MockWalletProvider, WalletProvider};

/// Notification pushed by a provider after activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountChanged(String),
    Disconnected,
    Error(String),
}

/// Result of a successful provider handshake
pub struct Activation {
    pub provider: Arc<dyn WalletProvider>,
    pub events: mpsc::UnboundedReceiver<ProviderEvent>,
}

/// One wallet provider implementation
#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> ConnectorKind;

    /// Run the provider handshake; may wait on a human indefinitely
    async fn activate(&self) -> Result<Activation>;

    /// Tear down whatever the last handshake set up
    async fn deactivate(&self);

    /// Drop stale pairing state before a fresh activation
    async fn reset(&self) {}
}

/// Explicit `ConnectorKind -> Connector` table
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<ConnectorKind, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connector` under its own kind, replacing any previous entry
    pub fn with(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(connector.kind(), connector);
        self
    }

    pub fn get(&self, kind: ConnectorKind) -> Option<Arc<dyn Connector>> {
        self.connectors.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ConnectorKind> {
        let mut kinds: Vec<_> = self.connectors.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }
}

#[derive(Debug, Clone)]
enum MockActivation {
    Respond(String),
    Hang,
    Fail(String),
}

/// Scriptable connector for testing
pub struct MockConnector {
    kind: ConnectorKind,
    behavior: Mutex<MockActivation>,
    delay: Mutex<Option<Duration>>,
    provider: Mutex<Option<Arc<MockWalletProvider>>>,
    events: Mutex<Option<mpsc::UnboundedSender<ProviderEvent>>>,
    activations: AtomicUsize,
    deactivations: AtomicUsize,
    resets: AtomicUsize,
}

impl MockConnector {
    /// Connector that answers immediately with `address`
    pub fn responding(kind: ConnectorKind, address: &str) -> Self {
        Self::with_behavior(kind, MockActivation::Respond(address.to_string()))
    }

    /// Connector whose handshake never completes
    pub fn hanging(kind: ConnectorKind) -> Self {
        Self::with_behavior(kind, MockActivation::Hang)
    }

    /// Connector whose handshake fails with `cause`
    pub fn failing(kind: ConnectorKind, cause: &str) -> Self {
        Self::with_behavior(kind, MockActivation::Fail(cause.to_string()))
    }

    fn with_behavior(kind: ConnectorKind, behavior: MockActivation) -> Self {
        Self {
            kind,
            behavior: Mutex::new(behavior),
            delay: Mutex::new(None),
            provider: Mutex::new(None),
            events: Mutex::new(None),
            activations: AtomicUsize::new(0),
            deactivations: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
        }
    }

    /// Answer only after `delay`
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Next activation answers with `address`
    pub fn respond_with(&self, address: &str) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) =
            MockActivation::Respond(address.to_string());
    }

    /// Provider handed out by the last successful activation
    pub fn provider(&self) -> Option<Arc<MockWalletProvider>> {
        self.provider
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Push a provider-side event into the live activation; false if none
    pub fn emit(&self, event: ProviderEvent) -> bool {
        if let ProviderEvent::AccountChanged(address) = &event
            && let Some(provider) = self.provider()
        {
            provider.set_address(address);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn kind(&self) -> ConnectorKind {
        self.kind
    }

    async fn activate(&self) -> Result<Activation> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self
            .behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match behavior {
            MockActivation::Hang => std::future::pending().await,
            MockActivation::Fail(cause) => Err(CoordinapeError::Connection(cause)),
            MockActivation::Respond(address) => {
                let provider = Arc::new(MockWalletProvider::new(&address, "0xmock_signature"));
                let (tx, rx) = mpsc::unbounded_channel();
                *self.provider.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(provider.clone());
                *self.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
                Ok(Activation {
                    provider,
                    events: rx,
                })
            }
        }
    }

    async fn deactivate(&self) {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    async fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}
