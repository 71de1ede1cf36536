/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for coordinape-adapter tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use coordinape_adapter::{
    AuthSessionController, ClientConfig, Connector, ConnectorRegistry, CoordinapeClient,
    CredentialStore, SessionConfig, SessionState,
};
use tokio::sync::watch;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Well-known development key (anvil account #0)
pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_KEY_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn client_for(server: &MockServer) -> CoordinapeClient {
    CoordinapeClient::with_config_and_base_url(ClientConfig::default(), &server.uri())
        .expect("client init")
}

/// Fresh directory under the system temp dir
pub fn temp_dir() -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("coordinape-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&path).expect("create temp dir");
    path
}

pub fn session_for(
    server: &MockServer,
    connectors: Vec<Arc<dyn Connector>>,
    store: CredentialStore,
) -> AuthSessionController {
    let registry = connectors
        .into_iter()
        .fold(ConnectorRegistry::new(), |registry, connector| {
            registry.with(connector)
        });
    AuthSessionController::new(registry, client_for(server), store, SessionConfig::default())
}

/// Manifest endpoint that accepts `token` for `address`
pub async fn accept_token(server: &MockServer, address: &str, token: &str) {
    Mock::given(method("GET"))
        .and(path("/v2/manifest"))
        .and(query_param("address", address))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "circles": [],
            "myUsers": [],
        })))
        .mount(server)
        .await;
}

/// Block until the session reaches a state matching `done`
pub async fn wait_for_state(
    states: &mut watch::Receiver<SessionState>,
    done: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    tokio::time::timeout(Duration::from_secs(5), states.wait_for(done))
        .await
        .expect("session state did not settle")
        .expect("session dropped")
        .clone()
}
