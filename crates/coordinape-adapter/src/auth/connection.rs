/*
[INPUT]:  Connector registry, activation requests, provider-side events
[OUTPUT]: One live provider connection and an ordered event broadcast
[POS]:    Auth layer - wallet connection lifecycle
[UPDATE]: When activation timing, teardown or event semantics change
*/

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::{CoordinapeError, Result};
use crate::types::ConnectorKind;

use super::connector::{Connector, ConnectorRegistry, ProviderEvent};
use super::wallet::{ProviderHandle, normalize_address};

pub const DEFAULT_ACTIVATION_TIMEOUT: Duration = Duration::from_secs(60);
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Connection lifecycle notifications, delivered in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    AccountChanged(String),
    Deactivated,
    ConnectionError(String),
}

/// Owns the single active wallet connection
#[derive(Clone)]
pub struct WalletConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    registry: ConnectorRegistry,
    activation_timeout: Duration,
    events: broadcast::Sender<ConnectionEvent>,
    state: Mutex<ConnectionState>,
}

#[derive(Default)]
struct ConnectionState {
    /// Bumped by every activate/deactivate; results tagged with an older value are stale
    generation: u64,
    pending: Option<PendingActivation>,
    active: Option<ActiveConnection>,
}

impl ConnectionState {
    /// Whether the current pending or live connection runs on `kind`
    fn uses(&self, kind: ConnectorKind) -> bool {
        self.pending.as_ref().is_some_and(|pending| pending.kind == kind)
            || self.active.as_ref().is_some_and(|active| active.handle.kind() == kind)
    }
}

struct PendingActivation {
    kind: ConnectorKind,
    cancel: CancellationToken,
}

struct ActiveConnection {
    generation: u64,
    connector: Arc<dyn Connector>,
    handle: ProviderHandle,
    address: String,
    forwarder: JoinHandle<()>,
}

impl ActiveConnection {
    async fn shutdown(self) {
        self.forwarder.abort();
        self.connector.deactivate().await;
    }
}

impl WalletConnectionManager {
    pub fn new(registry: ConnectorRegistry, activation_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ManagerInner {
                registry,
                activation_timeout,
                events,
                state: Mutex::new(ConnectionState::default()),
            }),
        }
    }

    pub fn with_default_timeout(registry: ConnectorRegistry) -> Self {
        Self::new(registry, DEFAULT_ACTIVATION_TIMEOUT)
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.inner.registry
    }

    pub fn activation_timeout(&self) -> Duration {
        self.inner.activation_timeout
    }

    /// Subscribe to connection events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    pub async fn active_address(&self) -> Option<String> {
        let state = self.inner.state.lock().await;
        state.active.as_ref().map(|active| active.address.clone())
    }

    pub async fn active_kind(&self) -> Option<ConnectorKind> {
        let state = self.inner.state.lock().await;
        state.active.as_ref().map(|active| active.handle.kind())
    }

    pub async fn provider(&self) -> Option<ProviderHandle> {
        let state = self.inner.state.lock().await;
        state.active.as_ref().map(|active| active.handle.clone())
    }

    pub async fn is_activating(&self) -> bool {
        self.inner.state.lock().await.pending.is_some()
    }

    /// Tear down a connector whose activation lost to a newer request.
    ///
    /// Skipped when the newer request reuses the same connector. The lock is
    /// held so a same-kind activation cannot start in between.
    async fn release_abandoned(&self, connector: &Arc<dyn Connector>, kind: ConnectorKind) {
        let state = self.inner.state.lock().await;
        if state.uses(kind) {
            return;
        }
        debug!(kind = %kind, "releasing abandoned wallet connector");
        connector.deactivate().await;
    }

    /// Connect the provider registered for `kind` and return its address.
    ///
    /// Tears down any live connection first. A competing call cancels this
    /// one, which then returns [`CoordinapeError::ActivationSuperseded`].
    pub async fn activate(&self, kind: ConnectorKind) -> Result<String> {
        let connector = self
            .inner
            .registry
            .get(kind)
            .ok_or(CoordinapeError::UnknownConnector(kind))?;

        let (generation, cancel, prior) = {
            let mut state = self.inner.state.lock().await;
            if let Some(pending) = state.pending.take() {
                debug!(kind = %pending.kind, "cancelling pending wallet activation");
                pending.cancel.cancel();
            }
            state.generation += 1;
            let cancel = CancellationToken::new();
            state.pending = Some(PendingActivation {
                kind,
                cancel: cancel.clone(),
            });
            (state.generation, cancel, state.active.take())
        };

        if let Some(prior) = prior {
            info!(kind = %prior.handle.kind(), address = %prior.address, "replacing active wallet connection");
            prior.shutdown().await;
        }

        connector.reset().await;
        info!(kind = %kind, "{}", kind.connecting_message());

        let timeout = self.inner.activation_timeout;
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(kind = %kind, "wallet activation superseded");
                self.release_abandoned(&connector, kind).await;
                return Err(CoordinapeError::ActivationSuperseded);
            }
            outcome = tokio::time::timeout(timeout, connector.activate()) => outcome,
        };

        let mut state = self.inner.state.lock().await;
        if state.generation != generation {
            debug!(kind = %kind, "discarding late wallet activation result");
            drop(state);
            self.release_abandoned(&connector, kind).await;
            return Err(CoordinapeError::ActivationSuperseded);
        }
        state.pending = None;

        match outcome {
            Err(_elapsed) => {
                self.inner.emit(ConnectionEvent::Deactivated);
                drop(state);
                warn!(kind = %kind, seconds = timeout.as_secs(), "wallet activation timed out");
                connector.deactivate().await;
                Err(CoordinapeError::ConnectionTimeout {
                    seconds: timeout.as_secs(),
                })
            }
            Ok(Err(err)) => {
                self.inner
                    .emit(ConnectionEvent::ConnectionError(err.to_string()));
                drop(state);
                warn!(kind = %kind, error = %err, "wallet activation failed");
                connector.deactivate().await;
                Err(err)
            }
            Ok(Ok(activation)) => {
                let handle = ProviderHandle::new(kind, activation.provider);
                let address = handle.address();
                let forwarder = tokio::spawn(forward_provider_events(
                    Arc::downgrade(&self.inner),
                    generation,
                    activation.events,
                ));
                state.active = Some(ActiveConnection {
                    generation,
                    connector,
                    handle,
                    address: address.clone(),
                    forwarder,
                });
                self.inner
                    .emit(ConnectionEvent::AccountChanged(address.clone()));
                drop(state);
                info!(kind = %kind, address = %address, "wallet connected");
                Ok(address)
            }
        }
    }

    /// Tear down the active connection; a no-op when nothing is connected
    pub async fn deactivate(&self) {
        let active = {
            let mut state = self.inner.state.lock().await;
            if let Some(pending) = state.pending.take() {
                pending.cancel.cancel();
            }
            state.generation += 1;
            let active = state.active.take();
            if active.is_some() {
                self.inner.emit(ConnectionEvent::Deactivated);
            }
            active
        };

        if let Some(active) = active {
            info!(kind = %active.handle.kind(), address = %active.address, "wallet disconnected");
            active.shutdown().await;
        }
    }
}

impl ManagerInner {
    fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Apply one provider event; returns false once the connection is gone
    async fn on_provider_event(&self, generation: u64, event: ProviderEvent) -> bool {
        let mut state = self.state.lock().await;
        let Some(active) = state
            .active
            .as_mut()
            .filter(|active| active.generation == generation)
        else {
            debug!(?event, "ignoring event from stale wallet connection");
            return false;
        };

        match event {
            ProviderEvent::AccountChanged(address) => {
                let address = normalize_address(&address);
                if active.address != address {
                    info!(from = %active.address, to = %address, "wallet account changed");
                    active.address = address.clone();
                    self.emit(ConnectionEvent::AccountChanged(address));
                }
                true
            }
            ProviderEvent::Disconnected => {
                let connector = active.connector.clone();
                state.active = None;
                state.generation += 1;
                self.emit(ConnectionEvent::Deactivated);
                drop(state);
                info!("wallet provider disconnected");
                connector.deactivate().await;
                false
            }
            ProviderEvent::Error(cause) => {
                let connector = active.connector.clone();
                state.active = None;
                state.generation += 1;
                self.emit(ConnectionEvent::ConnectionError(cause.clone()));
                drop(state);
                warn!(error = %cause, "wallet provider error");
                connector.deactivate().await;
                false
            }
        }
    }
}

async fn forward_provider_events(
    inner: Weak<ManagerInner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<ProviderEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.on_provider_event(generation, event).await {
            break;
        }
    }
}
