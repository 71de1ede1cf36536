/*
[INPUT]:  Serialized request payload and the active provider handle
[OUTPUT]: Signature plus EIP-191 payload hash
[POS]:    Auth layer - stateless signing for request authentication
[UPDATE]: When changing signing algorithm or hash format
*/

use alloy_primitives::{Signature, eip191_hash_message};
use tracing::debug;

use crate::http::{CoordinapeError, Result};

use super::wallet::{ProviderHandle, normalize_address};

/// Challenge signed during interactive login
pub const LOGIN_MESSAGE: &str = "Login to Coordinape";

/// Output of signing a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub signature: String,
    pub hash: String,
}

/// A payload signed by a specific address; valid for a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub payload: String,
    pub signature: String,
    pub hash: String,
    pub address: String,
}

/// `0x`-prefixed EIP-191 personal-message hash of `payload`
pub fn payload_hash(payload: &str) -> String {
    let hash = eip191_hash_message(payload.as_bytes());
    format!("0x{}", hex::encode(hash.as_slice()))
}

/// Sign `payload` with `provider`.
///
/// Does not touch session state; every call is independent.
pub async fn sign(payload: &str, provider: Option<&ProviderHandle>) -> Result<SignedPayload> {
    let provider = provider.ok_or(CoordinapeError::NoProvider)?;
    let signature = provider.sign_message(payload).await?;
    debug!(kind = %provider.kind(), bytes = payload.len(), "payload signed");
    Ok(SignedPayload {
        signature,
        hash: payload_hash(payload),
    })
}

/// Sign `payload` and bind the result to the provider's current address
pub async fn sign_request(payload: String, provider: Option<&ProviderHandle>) -> Result<SignedRequest> {
    let signed = sign(&payload, provider).await?;
    let address = provider.map(ProviderHandle::address).unwrap_or_default();
    Ok(SignedRequest {
        payload,
        signature: signed.signature,
        hash: signed.hash,
        address,
    })
}

/// Recover the lowercase address that produced `signature` over `payload`
pub fn recover_signer(payload: &str, signature: &str) -> Result<String> {
    let raw = signature.strip_prefix("0x").unwrap_or(signature);
    let bytes = hex::decode(raw).map_err(|_| {
        CoordinapeError::InvalidResponse("signature is not valid hex".to_string())
    })?;
    let signature = Signature::from_raw(&bytes)
        .map_err(|e| CoordinapeError::InvalidResponse(format!("malformed signature: {e}")))?;
    let address = signature
        .recover_address_from_msg(payload.as_bytes())
        .map_err(|e| CoordinapeError::InvalidResponse(format!("signature recovery failed: {e}")))?;
    Ok(normalize_address(&hex::encode(address.as_slice())))
}
