/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Coordinape adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{
    AuthSessionController,
    ConnectionEvent,
    Connector,
    ConnectorRegistry,
    CredentialStore,
    LocalKeyConnector,
    LocalKeyProvider,
    MockConnector,
    MockWalletProvider,
    ProviderHandle,
    SessionConfig,
    WalletConnectionManager,
    WalletProvider,
};

// Re-export commonly used types from http
pub use http::{
    ApiCredential,
    ClientConfig,
    CoordinapeClient,
    CoordinapeError,
    Result,
    SignedEnvelope,
};

// Re-export all types
pub use types::*;
