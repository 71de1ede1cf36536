/*
[INPUT]:  Wallet address plus its provider (login) or cached token (manifest)
[OUTPUT]: Freshly issued tokens and the caller's manifest
[POS]:    HTTP layer - token issuance and silent token validation
[UPDATE]: When the login challenge or manifest endpoint changes
*/

use reqwest::Method;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::{LOGIN_MESSAGE, ProviderHandle, normalize_address, sign};
use crate::http::{CoordinapeClient, CoordinapeError, Result};
use crate::types::{LoginResponse, Manifest};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    signature: &'a str,
    hash: &'a str,
    address: &'a str,
}

impl CoordinapeClient {
    /// Sign the login challenge and exchange it for a token
    ///
    /// POST /v2/login
    pub async fn login(&self, address: &str, provider: &ProviderHandle) -> Result<LoginResponse> {
        let address = normalize_address(address);
        if provider.address() != address {
            warn!(address = %address, provider = %provider.address(), "login requested for an address the provider does not control");
            return Err(CoordinapeError::Unauthenticated);
        }

        let signed = sign(LOGIN_MESSAGE, Some(provider)).await?;
        let body = LoginRequest {
            signature: &signed.signature,
            hash: &signed.hash,
            address: &address,
        };
        let builder = self.request(Method::POST, "/v2/login")?.json(&body);
        let response: LoginResponse = self.send_json(builder).await?;
        if response.token.is_empty() {
            return Err(CoordinapeError::InvalidResponse(
                "login returned an empty token".to_string(),
            ));
        }

        info!(address = %address, kind = %provider.kind(), "login token issued");
        Ok(response)
    }

    /// Fetch the manifest for `address` with an explicit token
    ///
    /// GET /v2/manifest?address={address}
    ///
    /// A 401/403 maps to [`CoordinapeError::StaleToken`].
    pub async fn manifest(&self, address: &str, token: &str) -> Result<Manifest> {
        let address = normalize_address(address);
        let builder = self
            .request(Method::GET, "/v2/manifest")?
            .bearer_auth(token)
            .query(&[("address", address.as_str())]);

        match self.send_json(builder).await {
            Ok(manifest) => {
                debug!(address = %address, "manifest fetched");
                Ok(manifest)
            }
            Err(err) if err.is_rejection() => Err(CoordinapeError::StaleToken { address }),
            Err(err) => Err(err),
        }
    }
}
