/*
[INPUT]:  Wallet connectors, cached tokens, payloads to sign
[OUTPUT]: Live wallet connection, signatures, authenticated session state
[POS]:    Auth layer - wallet authentication core
[UPDATE]: When auth flow, connector set or signature scheme changes
*/

pub mod connection;
pub mod connector;
pub mod evm_wallet;
pub mod session;
pub mod signer;
pub mod store;
pub mod wallet;

pub use connection::{ConnectionEvent, DEFAULT_ACTIVATION_TIMEOUT, WalletConnectionManager};
pub use connector::{Activation, Connector, ConnectorRegistry, MockConnector, ProviderEvent};
pub use evm_wallet::{LocalKeyConnector, LocalKeyProvider};
pub use session::{AuthSessionController, SessionConfig};
pub use signer::{
    LOGIN_MESSAGE, SignedPayload, SignedRequest, payload_hash, recover_signer, sign, sign_request,
};
pub use store::{CredentialStore, StoredToken};
pub use wallet::{MockWalletProvider, ProviderHandle, WalletProvider, normalize_address};
