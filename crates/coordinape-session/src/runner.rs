/*
[INPUT]:  Session settings, wallet key, shutdown token
[OUTPUT]: Wired session controller and the CLI command flows
[POS]:    Composition root - builds and drives the authentication core
[UPDATE]: When adding commands or changing session wiring
*/

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use coordinape_adapter::{
    AuthSessionController, ConnectorKind, ConnectorRegistry, CoordinapeClient, CredentialStore,
    LocalKeyConnector, Manifest, SessionState,
};
use reqwest::Method;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SessionSettings;

/// A running session plus its event loop
pub struct SessionRunner {
    session: AuthSessionController,
    connector: ConnectorKind,
    shutdown: CancellationToken,
    loop_token: CancellationToken,
    event_loop: JoinHandle<()>,
}

/// Summary printed by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub cached_addresses: Vec<String>,
    pub remembered_connector: Option<ConnectorKind>,
    pub state: SessionState,
}

impl SessionRunner {
    /// Open the store, register the local key and start processing events
    pub async fn start(
        settings: &SessionSettings,
        private_key: &str,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let store_path = settings.credentials_path()?;
        let store = CredentialStore::open(&store_path)
            .await
            .with_context(|| format!("open credential store {}", store_path.display()))?;

        let connector = settings.wallet.connector;
        let wallet = LocalKeyConnector::from_private_key(connector, private_key)
            .context("load wallet key")?;
        let registry = ConnectorRegistry::new().with(Arc::new(wallet));

        let client = CoordinapeClient::with_config_and_base_url(settings.client_config(), &settings.api_url)
            .context("build api client")?;
        let session = AuthSessionController::new(registry, client, store, settings.session_config());
        let loop_token = shutdown.child_token();
        let event_loop = session.spawn(loop_token.clone());

        info!(
            api_url = %settings.api_url,
            store = %store_path.display(),
            connector = %connector,
            "session started"
        );

        Ok(Self {
            session,
            connector,
            shutdown,
            loop_token,
            event_loop,
        })
    }

    pub fn session(&self) -> &AuthSessionController {
        &self.session
    }

    /// Connect the wallet and wait until the cached token is accepted or refused
    pub async fn connect(&self) -> Result<SessionState> {
        let mut states = self.session.subscribe();
        let activation = async {
            if self.session.remembered_connector().await == Some(self.connector)
                && let Some(address) = self.session.resume().await?
            {
                return Ok(address);
            }
            self.session.activate(self.connector).await
        };

        let address = tokio::select! {
            _ = self.shutdown.cancelled() => bail!("interrupted while connecting wallet"),
            address = activation => address.context("activate wallet")?,
        };
        info!(address = %address, "wallet connected");

        let state = tokio::select! {
            _ = self.shutdown.cancelled() => bail!("interrupted while validating cached token"),
            state = states.wait_for(|s| matches!(s, SessionState::Authenticated(_) | SessionState::AuthFailed(_) | SessionState::Disconnected)) => {
                state.context("session closed")?.clone()
            }
        };
        Ok(state)
    }

    /// Connect, falling back to an interactive login, and return the manifest
    pub async fn login(&self) -> Result<Manifest> {
        let address = self.authenticate().await?;
        let token = self
            .session
            .cached_token(&address)
            .await
            .ok_or_else(|| anyhow!("no token cached for {address}"))?;
        self.session
            .client()
            .manifest(&address, &token)
            .await
            .context("fetch manifest")
    }

    /// Ensure an authenticated session and return its address
    pub async fn authenticate(&self) -> Result<String> {
        match self.connect().await? {
            SessionState::Authenticated(address) => Ok(address),
            SessionState::AuthFailed(address) => {
                info!(address = %address, "signing login challenge");
                self.session.login().await.context("interactive login")?;
                Ok(address)
            }
            state => bail!("wallet disconnected before authentication ({state:?})"),
        }
    }

    pub async fn status(&self) -> StatusReport {
        StatusReport {
            cached_addresses: self.session.cached_addresses().await,
            remembered_connector: self.session.remembered_connector().await,
            state: self.session.state(),
        }
    }

    /// Drop the active address's token and disconnect
    pub async fn logout(&self) -> Result<Option<String>> {
        let address = match self.connect().await? {
            SessionState::Authenticated(address) | SessionState::AuthFailed(address) => Some(address),
            _ => None,
        };
        self.session.logout().await.context("logout")?;
        Ok(address)
    }

    /// Authenticated raw call; a body makes it a signed mutation
    pub async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.authenticate().await?;
        self.session
            .client()
            .call(method, path, body.as_ref())
            .await
            .with_context(|| format!("call {path}"))
    }

    /// Stop the event loop and wait for it
    pub async fn shutdown(self) {
        self.loop_token.cancel();
        if let Err(err) = self.event_loop.await {
            warn!(error = %err, "session event loop ended abnormally");
        }
    }
}
