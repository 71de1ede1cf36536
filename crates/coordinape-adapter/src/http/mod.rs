/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod login;
pub mod public;
pub mod signature;
pub mod signed;

pub use error::{CoordinapeError, Result};
pub use signature::SignedEnvelope;

pub use client::{ApiCredential, ClientConfig, CoordinapeClient};
