/*
[INPUT]:  Connection events, the credential store, login requests
[OUTPUT]: Observable session state and the API client's credential triple
[POS]:    Auth layer - reconciles wallet connection with cached credentials
[UPDATE]: When session transitions, purge rules or resume behavior change
*/

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::{CoordinapeClient, CoordinapeError, Result};
use crate::types::{ConnectorKind, ErrorPurge, Manifest, SessionState};

use super::connection::{ConnectionEvent, DEFAULT_ACTIVATION_TIMEOUT, WalletConnectionManager};
use super::connector::ConnectorRegistry;
use super::store::CredentialStore;
use super::wallet::normalize_address;

/// Session tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub activation_timeout: Duration,
    /// Cached tokens a provider error wipes
    pub error_purge: ErrorPurge,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            activation_timeout: DEFAULT_ACTIVATION_TIMEOUT,
            error_purge: ErrorPurge::default(),
        }
    }
}

/// Drives [`SessionState`] from wallet events and owns the credential store
#[derive(Clone)]
pub struct AuthSessionController {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    manager: WalletConnectionManager,
    client: CoordinapeClient,
    config: SessionConfig,
    core: Mutex<SessionCore>,
    state: watch::Sender<SessionState>,
}

struct SessionCore {
    store: CredentialStore,
    /// Bumped whenever the active address changes or the session is torn down
    epoch: u64,
    /// Bumped by activate, logout and teardown; guards the remembered connector
    connection: u64,
    address: Option<String>,
    validation: Option<JoinHandle<()>>,
}

impl SessionCore {
    /// Start a new epoch; in-flight work for the previous one is dropped
    fn advance(&mut self) -> u64 {
        self.epoch += 1;
        if let Some(validation) = self.validation.take() {
            validation.abort();
        }
        self.epoch
    }
}

impl AuthSessionController {
    pub fn new(
        registry: ConnectorRegistry,
        client: CoordinapeClient,
        store: CredentialStore,
        config: SessionConfig,
    ) -> Self {
        let manager = WalletConnectionManager::new(registry, config.activation_timeout);
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            inner: Arc::new(SessionInner {
                manager,
                client,
                config,
                core: Mutex::new(SessionCore {
                    store,
                    epoch: 0,
                    connection: 0,
                    address: None,
                    validation: None,
                }),
                state,
            }),
        }
    }

    pub fn manager(&self) -> &WalletConnectionManager {
        &self.inner.manager
    }

    pub fn client(&self) -> &CoordinapeClient {
        &self.inner.client
    }

    pub fn config(&self) -> SessionConfig {
        self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub async fn active_address(&self) -> Option<String> {
        self.inner.core.lock().await.address.clone()
    }

    pub async fn cached_addresses(&self) -> Vec<String> {
        self.inner.core.lock().await.store.addresses()
    }

    pub async fn cached_token(&self, address: &str) -> Option<String> {
        let core = self.inner.core.lock().await;
        core.store.token(address).map(str::to_string)
    }

    /// Connector remembered from the last successful activation
    pub async fn remembered_connector(&self) -> Option<ConnectorKind> {
        self.inner.core.lock().await.store.connector()
    }

    /// Subscribe to connection events and process them on a background task
    pub fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let events = self.inner.manager.subscribe();
        let controller = self.clone();
        tokio::spawn(async move { controller.run(events, shutdown).await })
    }

    /// Process connection events in arrival order until `shutdown` fires
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<ConnectionEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("session event loop stopped");
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session fell behind connection events; resyncing");
                        let resync = match self.inner.manager.active_address().await {
                            Some(address) => ConnectionEvent::AccountChanged(address),
                            None => ConnectionEvent::Deactivated,
                        };
                        self.handle_event(resync).await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    /// Apply one connection event
    pub async fn handle_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::AccountChanged(address) => self.on_account_changed(&address).await,
            ConnectionEvent::Deactivated => {
                self.on_connection_lost(ErrorPurge::None, "wallet deactivated")
                    .await
            }
            ConnectionEvent::ConnectionError(cause) => {
                warn!(error = %cause, "wallet connection error");
                self.on_connection_lost(self.inner.config.error_purge, "wallet connection error")
                    .await
            }
        }
    }

    /// Connect `kind`; authentication continues from the resulting account event
    pub async fn activate(&self, kind: ConnectorKind) -> Result<String> {
        let (epoch, connection) = {
            let mut core = self.inner.core.lock().await;
            let epoch = core.advance();
            core.connection += 1;
            core.address = None;
            self.inner.client.clear_credential();
            self.inner.set_state(SessionState::Connecting);
            (epoch, core.connection)
        };

        match self.inner.manager.activate(kind).await {
            Ok(address) => {
                let mut core = self.inner.core.lock().await;
                if core.connection != connection {
                    debug!(kind = %kind, "session changed during activation; connector not remembered");
                } else if self.inner.manager.active_kind().await == Some(kind)
                    && let Err(err) = core.store.set_connector(Some(kind)).await
                {
                    warn!(error = %err, "failed to remember wallet connector");
                }
                Ok(address)
            }
            Err(CoordinapeError::ActivationSuperseded) => Err(CoordinapeError::ActivationSuperseded),
            Err(err) => {
                let mut core = self.inner.core.lock().await;
                if core.epoch == epoch {
                    let purge = if matches!(err, CoordinapeError::Connection(_)) {
                        self.inner.config.error_purge
                    } else {
                        ErrorPurge::None
                    };
                    self.inner.tear_down(&mut core, purge).await;
                }
                Err(err)
            }
        }
    }

    /// Reopen the connector used by the previous process, if any
    pub async fn resume(&self) -> Result<Option<String>> {
        let Some(kind) = self.remembered_connector().await else {
            debug!("no remembered wallet connector");
            return Ok(None);
        };
        info!(kind = %kind, "resuming previous wallet connection");
        self.activate(kind).await.map(Some)
    }

    /// Sign the login challenge and authenticate the active address
    pub async fn login(&self) -> Result<()> {
        let (epoch, address) = {
            let core = self.inner.core.lock().await;
            let address = core.address.clone().ok_or(CoordinapeError::Unauthenticated)?;
            (core.epoch, address)
        };
        let provider = self
            .inner
            .manager
            .provider()
            .await
            .ok_or(CoordinapeError::NoProvider)?;

        let issued = self.inner.client.login(&address, &provider).await;

        let mut core = self.inner.core.lock().await;
        if core.epoch != epoch {
            debug!(address = %address, "discarding login result for a superseded session");
            return Err(CoordinapeError::SessionChanged);
        }

        let token = match issued {
            Ok(response) => response.token,
            Err(err) => {
                warn!(address = %address, error = %err, "interactive login failed");
                core.advance();
                self.inner.client.clear_credential();
                self.inner.set_state(SessionState::AuthFailed(address));
                return Err(err);
            }
        };

        core.store.save(&address, &token).await?;
        core.advance();
        self.inner
            .client
            .set_credential(&address, &token, Some(provider));
        self.inner
            .set_state(SessionState::Authenticated(address.clone()));
        info!(address = %address, "session authenticated by login");
        Ok(())
    }

    /// Forget the active address's token and disconnect the wallet
    pub async fn logout(&self) -> Result<()> {
        {
            let mut core = self.inner.core.lock().await;
            core.advance();
            core.connection += 1;
            if let Some(address) = core.address.take() {
                core.store.remove(&address).await?;
                info!(address = %address, "logged out");
            }
            core.store.set_connector(None).await?;
            self.inner.client.clear_credential();
            self.inner.set_state(SessionState::Disconnected);
        }
        self.inner.manager.deactivate().await;
        Ok(())
    }

    async fn on_account_changed(&self, address: &str) {
        let address = normalize_address(address);
        let mut core = self.inner.core.lock().await;
        if core.address.as_deref() == Some(address.as_str()) {
            debug!(address = %address, "account already active");
            return;
        }

        let epoch = core.advance();
        core.address = Some(address.clone());
        self.inner.client.clear_credential();
        self.inner
            .set_state(SessionState::Authenticating(address.clone()));

        match core.store.token(&address).map(str::to_string) {
            None => {
                info!(address = %address, "no cached token; login required");
                self.inner.set_state(SessionState::AuthFailed(address));
            }
            Some(token) => {
                debug!(address = %address, "validating cached token");
                core.validation = Some(tokio::spawn(validate_cached_token(
                    Arc::downgrade(&self.inner),
                    epoch,
                    address,
                    token,
                )));
            }
        }
    }

    async fn on_connection_lost(&self, purge: ErrorPurge, reason: &str) {
        let mut core = self.inner.core.lock().await;
        if *self.inner.state.borrow() == SessionState::Connecting {
            debug!(reason, "ignoring connection event while an activation is pending");
            return;
        }
        info!(reason, "session cleared");
        self.inner.tear_down(&mut core, purge).await;
    }
}

impl SessionInner {
    fn set_state(&self, state: SessionState) {
        debug!(?state, "session state");
        self.state.send_replace(state);
    }

    async fn tear_down(&self, core: &mut SessionCore, purge: ErrorPurge) {
        core.advance();
        core.connection += 1;
        let address = core.address.take();
        self.client.clear_credential();

        let purged = match (purge, &address) {
            (ErrorPurge::None, _) | (ErrorPurge::Active, None) => Ok(()),
            (ErrorPurge::Active, Some(address)) => core.store.remove(address).await.map(|_| ()),
            (ErrorPurge::All, _) => core.store.clear().await,
        };
        if let Err(err) = purged {
            warn!(error = %err, "failed to purge cached tokens");
        }
        if let Err(err) = core.store.set_connector(None).await {
            warn!(error = %err, "failed to forget wallet connector");
        }

        self.set_state(SessionState::Disconnected);
    }

    async fn finish_validation(
        &self,
        epoch: u64,
        address: String,
        token: String,
        outcome: Result<Manifest>,
    ) {
        let mut core = self.core.lock().await;
        if core.epoch != epoch {
            debug!(address = %address, "discarding validation for a superseded address");
            return;
        }
        core.validation = None;

        match outcome {
            Ok(_) => {
                let provider = self
                    .manager
                    .provider()
                    .await
                    .filter(|provider| provider.address() == address);
                self.client.set_credential(&address, &token, provider);
                info!(address = %address, "cached token accepted");
                self.set_state(SessionState::Authenticated(address));
            }
            // Only a backend rejection drops the entry; an unreachable or
            // failing backend leaves it for the next connection to retry
            Err(CoordinapeError::StaleToken { .. }) => {
                info!(address = %address, "cached token rejected; login required");
                if let Err(err) = core.store.remove(&address).await {
                    warn!(error = %err, "failed to purge cached token");
                }
                self.set_state(SessionState::AuthFailed(address));
            }
            Err(err) => {
                warn!(address = %address, error = %err, "cached token validation failed; keeping token");
                self.set_state(SessionState::AuthFailed(address));
            }
        }
    }
}

async fn validate_cached_token(inner: Weak<SessionInner>, epoch: u64, address: String, token: String) {
    let Some(client) = inner.upgrade().map(|inner| inner.client.clone()) else {
        return;
    };
    let outcome = client.manifest(&address, &token).await;
    if let Some(inner) = inner.upgrade() {
        inner.finish_validation(epoch, address, token, outcome).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::auth::{MockConnector, ProviderEvent};
    use crate::http::ClientConfig;

    const WAIT: Duration = Duration::from_secs(5);

    fn controller(
        base_url: &str,
        connectors: Vec<Arc<MockConnector>>,
        store: CredentialStore,
        config: SessionConfig,
    ) -> AuthSessionController {
        let registry = connectors
            .into_iter()
            .fold(ConnectorRegistry::new(), |registry, connector| {
                registry.with(connector)
            });
        let client = CoordinapeClient::with_config_and_base_url(ClientConfig::default(), base_url)
            .expect("client init");
        AuthSessionController::new(registry, client, store, config)
    }

    async fn settle(
        rx: &mut watch::Receiver<SessionState>,
        done: impl FnMut(&SessionState) -> bool,
    ) -> SessionState {
        tokio::time::timeout(WAIT, rx.wait_for(done))
            .await
            .expect("state did not settle")
            .expect("controller dropped")
            .clone()
    }

    async fn accept_token(server: &MockServer, address: &str, token: &str) {
        Mock::given(method("GET"))
            .and(path("/v2/manifest"))
            .and(query_param("address", address))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_no_cached_token_then_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "tok123"})))
            .expect(1)
            .mount(&server)
            .await;
        accept_token(&server, "0xabc", "tok123").await;

        let injected = Arc::new(MockConnector::responding(ConnectorKind::Injected, "0xabc"));
        let session = controller(
            &server.uri(),
            vec![injected],
            CredentialStore::in_memory(),
            SessionConfig::default(),
        );
        let shutdown = CancellationToken::new();
        session.spawn(shutdown.clone());
        let mut states = session.subscribe();

        session.activate(ConnectorKind::Injected).await.unwrap();
        let state = settle(&mut states, |s| matches!(s, SessionState::AuthFailed(_))).await;
        assert_eq!(state, SessionState::AuthFailed("0xabc".to_string()));
        assert!(session.client().credential().token.is_none());

        session.login().await.unwrap();
        assert_eq!(session.state(), SessionState::Authenticated("0xabc".to_string()));
        assert_eq!(session.cached_token("0xabc").await.as_deref(), Some("tok123"));
        assert_eq!(session.client().credential().token.as_deref(), Some("tok123"));
        assert_eq!(
            session.remembered_connector().await,
            Some(ConnectorKind::Injected)
        );

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_deactivated_keeps_token() {
        let server = MockServer::start().await;
        accept_token(&server, "0xabc", "tok123").await;

        let mut store = CredentialStore::in_memory();
        store.save("0xabc", "tok123").await.unwrap();
        let injected = Arc::new(MockConnector::responding(ConnectorKind::Injected, "0xabc"));
        let session = controller(&server.uri(), vec![injected.clone()], store, SessionConfig::default());
        let shutdown = CancellationToken::new();
        session.spawn(shutdown.clone());
        let mut states = session.subscribe();

        session.activate(ConnectorKind::Injected).await.unwrap();
        settle(&mut states, SessionState::is_authenticated).await;

        assert!(injected.emit(ProviderEvent::Disconnected));
        settle(&mut states, |s| *s == SessionState::Disconnected).await;

        assert_eq!(session.cached_token("0xabc").await.as_deref(), Some("tok123"));
        assert!(session.active_address().await.is_none());
        assert!(session.client().credential().address.is_none());

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_rejected_cached_token_is_purged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/manifest"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = CredentialStore::in_memory();
        store.save("0xabc", "old").await.unwrap();
        store.save("0xdef", "other").await.unwrap();
        let injected = Arc::new(MockConnector::responding(ConnectorKind::Injected, "0xabc"));
        let session = controller(&server.uri(), vec![injected], store, SessionConfig::default());
        let shutdown = CancellationToken::new();
        session.spawn(shutdown.clone());
        let mut states = session.subscribe();

        session.activate(ConnectorKind::Injected).await.unwrap();
        let state = settle(&mut states, |s| matches!(s, SessionState::AuthFailed(_))).await;

        assert_eq!(state, SessionState::AuthFailed("0xabc".to_string()));
        assert!(session.cached_token("0xabc").await.is_none());
        assert_eq!(session.cached_token("0xdef").await.as_deref(), Some("other"));

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_unreachable_backend_keeps_cached_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/manifest"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = CredentialStore::in_memory();
        store.save("0xabc", "tok123").await.unwrap();
        let injected = Arc::new(MockConnector::responding(ConnectorKind::Injected, "0xabc"));
        let session = controller(&server.uri(), vec![injected], store, SessionConfig::default());
        let shutdown = CancellationToken::new();
        session.spawn(shutdown.clone());
        let mut states = session.subscribe();

        session.activate(ConnectorKind::Injected).await.unwrap();
        let state = settle(&mut states, |s| matches!(s, SessionState::AuthFailed(_))).await;

        assert_eq!(state, SessionState::AuthFailed("0xabc".to_string()));
        assert_eq!(session.cached_token("0xabc").await.as_deref(), Some("tok123"));
        assert!(session.client().credential().token.is_none());

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_stale_validation_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/manifest"))
            .and(query_param("address", "0xaaa"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        accept_token(&server, "0xbbb", "tok-b").await;

        let mut store = CredentialStore::in_memory();
        store.save("0xaaa", "tok-a").await.unwrap();
        store.save("0xbbb", "tok-b").await.unwrap();
        let injected = Arc::new(MockConnector::responding(ConnectorKind::Injected, "0xaaa"));
        let session = controller(&server.uri(), vec![injected.clone()], store, SessionConfig::default());
        let shutdown = CancellationToken::new();
        session.spawn(shutdown.clone());
        let mut states = session.subscribe();

        session.activate(ConnectorKind::Injected).await.unwrap();
        settle(&mut states, |s| *s == SessionState::Authenticating("0xaaa".to_string())).await;
        injected.emit(ProviderEvent::AccountChanged("0xbbb".to_string()));

        settle(&mut states, |s| *s == SessionState::Authenticated("0xbbb".to_string())).await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(session.state(), SessionState::Authenticated("0xbbb".to_string()));
        assert_eq!(session.client().active_address().as_deref(), Some("0xbbb"));
        // Superseded, not rejected
        assert_eq!(session.cached_token("0xaaa").await.as_deref(), Some("tok-a"));

        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_timeout_leaves_session_disconnected() {
        let wc = Arc::new(MockConnector::hanging(ConnectorKind::WalletConnect));
        let session = controller(
            "http://127.0.0.1:9",
            vec![wc],
            CredentialStore::in_memory(),
            SessionConfig::default(),
        );
        let shutdown = CancellationToken::new();
        session.spawn(shutdown.clone());

        let err = session
            .activate(ConnectorKind::WalletConnect)
            .await
            .unwrap_err();

        assert!(matches!(err, CoordinapeError::ConnectionTimeout { seconds: 60 }));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.active_address().await.is_none());

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_provider_error_purges_active_token_only() {
        let server = MockServer::start().await;
        accept_token(&server, "0xabc", "tok123").await;

        let mut store = CredentialStore::in_memory();
        store.save("0xabc", "tok123").await.unwrap();
        store.save("0xdef", "other").await.unwrap();
        let injected = Arc::new(MockConnector::responding(ConnectorKind::Injected, "0xabc"));
        let session = controller(&server.uri(), vec![injected.clone()], store, SessionConfig::default());
        let shutdown = CancellationToken::new();
        session.spawn(shutdown.clone());
        let mut states = session.subscribe();

        session.activate(ConnectorKind::Injected).await.unwrap();
        settle(&mut states, SessionState::is_authenticated).await;

        injected.emit(ProviderEvent::Error("chain changed".to_string()));
        settle(&mut states, |s| *s == SessionState::Disconnected).await;

        assert!(session.cached_token("0xabc").await.is_none());
        assert_eq!(session.cached_token("0xdef").await.as_deref(), Some("other"));
        assert_eq!(session.remembered_connector().await, None);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_logout_removes_token_and_disconnects() {
        let server = MockServer::start().await;
        accept_token(&server, "0xabc", "tok123").await;

        let mut store = CredentialStore::in_memory();
        store.save("0xabc", "tok123").await.unwrap();
        let injected = Arc::new(MockConnector::responding(ConnectorKind::Injected, "0xabc"));
        let session = controller(&server.uri(), vec![injected.clone()], store, SessionConfig::default());
        let shutdown = CancellationToken::new();
        session.spawn(shutdown.clone());
        let mut states = session.subscribe();

        session.activate(ConnectorKind::Injected).await.unwrap();
        settle(&mut states, SessionState::is_authenticated).await;

        session.logout().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.cached_addresses().await.is_empty());
        assert!(session.manager().active_address().await.is_none());
        assert_eq!(injected.deactivations(), 1);

        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_during_activation_forgets_connector() {
        let injected = Arc::new(MockConnector::responding(ConnectorKind::Injected, "0xabc"));
        injected.set_delay(Some(Duration::from_secs(1)));
        let session = controller(
            "http://127.0.0.1:9",
            vec![injected],
            CredentialStore::in_memory(),
            SessionConfig::default(),
        );

        let activation = tokio::spawn({
            let session = session.clone();
            async move { session.activate(ConnectorKind::Injected).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Queue a logout ahead of the activation's bookkeeping
        let guard = session.inner.core.lock().await;
        let logout = tokio::spawn({
            let session = session.clone();
            async move { session.logout().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(guard);

        logout.await.unwrap().unwrap();
        assert!(activation.await.unwrap().is_ok());
        assert_eq!(session.remembered_connector().await, None);
    }

    #[tokio::test]
    async fn test_login_requires_account() {
        let server = MockServer::start().await;
        let session = controller(
            &server.uri(),
            vec![],
            CredentialStore::in_memory(),
            SessionConfig::default(),
        );
        let err = session.login().await.unwrap_err();
        assert!(matches!(err, CoordinapeError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_rejected_login_prompt_stays_auth_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/login"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let injected = Arc::new(MockConnector::responding(ConnectorKind::Injected, "0xabc"));
        let session = controller(
            &server.uri(),
            vec![injected.clone()],
            CredentialStore::in_memory(),
            SessionConfig::default(),
        );
        let shutdown = CancellationToken::new();
        session.spawn(shutdown.clone());
        let mut states = session.subscribe();

        session.activate(ConnectorKind::Injected).await.unwrap();
        settle(&mut states, |s| matches!(s, SessionState::AuthFailed(_))).await;

        injected.provider().unwrap().set_rejecting(true);
        let err = session.login().await.unwrap_err();
        assert!(matches!(err, CoordinapeError::UserRejected));
        assert_eq!(session.state(), SessionState::AuthFailed("0xabc".to_string()));

        shutdown.cancel();
    }
}
