/*
[INPUT]:  Wallet provider identities and session lifecycle
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions shared by auth and http layers
[UPDATE]: When adding connector kinds or session states
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which wallet provider implementation backs a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    Injected,
    WalletConnect,
    WalletLink,
    Fortmatic,
    Portis,
}

impl ConnectorKind {
    pub const ALL: [ConnectorKind; 5] = [
        ConnectorKind::Injected,
        ConnectorKind::WalletConnect,
        ConnectorKind::WalletLink,
        ConnectorKind::Fortmatic,
        ConnectorKind::Portis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorKind::Injected => "injected",
            ConnectorKind::WalletConnect => "walletconnect",
            ConnectorKind::WalletLink => "walletlink",
            ConnectorKind::Fortmatic => "fortmatic",
            ConnectorKind::Portis => "portis",
        }
    }

    /// Progress text shown while the provider handshake is pending
    pub fn connecting_message(&self) -> &'static str {
        match self {
            ConnectorKind::Injected => "Waiting for Approval on Metamask",
            ConnectorKind::WalletConnect => "Opening QR for Wallet Connect",
            _ => "Connecting to wallet",
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConnectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConnectorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown connector kind: {s}"))
    }
}

/// Authentication state of the single client session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Authenticating(String),
    Authenticated(String),
    AuthFailed(String),
}

impl SessionState {
    /// Address the session is currently bound to, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            SessionState::Authenticating(address)
            | SessionState::Authenticated(address)
            | SessionState::AuthFailed(address) => Some(address),
            SessionState::Disconnected | SessionState::Connecting => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Which cached tokens a provider error removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPurge {
    /// Keep every cached token
    None,
    /// Drop only the token of the address that was active
    #[default]
    Active,
    /// Drop the whole token map
    All,
}
