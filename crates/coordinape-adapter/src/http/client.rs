/*
[INPUT]:  HTTP configuration (base URL, timeouts) and the session credential triple
[OUTPUT]: Configured reqwest client plus generic signed/unsigned dispatch
[POS]:    HTTP layer - API client facade
[UPDATE]: When adding connection options or changing request authentication
*/

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::auth::{ProviderHandle, normalize_address, sign};
use crate::http::{CoordinapeError, Result, SignedEnvelope};

/// Base URL for the Coordinape API
const API_BASE_URL: &str = "https://api.coordinape.com/api";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Runtime credential triple; the token is only valid for `address`
#[derive(Debug, Clone, Default)]
pub struct ApiCredential {
    pub address: Option<String>,
    pub token: Option<String>,
    pub provider: Option<ProviderHandle>,
}

/// Main HTTP client for the Coordinape API
#[derive(Debug, Clone)]
pub struct CoordinapeClient {
    http_client: Client,
    base_url: Url,
    credential: Arc<RwLock<ApiCredential>>,
}

impl CoordinapeClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(config, API_BASE_URL)
    }

    /// Create a client pointed at a custom backend (tests, staging)
    pub fn with_config_and_base_url(config: ClientConfig, base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(base_url)?,
            credential: Arc::new(RwLock::new(ApiCredential::default())),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Replace the whole credential triple
    pub fn set_credential(&self, address: &str, token: &str, provider: Option<ProviderHandle>) {
        let mut guard = self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = ApiCredential {
            address: Some(normalize_address(address)),
            token: Some(token.to_string()),
            provider,
        };
    }

    pub fn clear_credential(&self) {
        let mut guard = self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = ApiCredential::default();
    }

    /// Snapshot of the current credential triple
    pub fn credential(&self) -> ApiCredential {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn active_address(&self) -> Option<String> {
        self.credential().address
    }

    /// Address that mutating calls sign with
    pub(crate) fn require_address(&self) -> Result<String> {
        self.active_address()
            .filter(|address| !address.is_empty())
            .ok_or(CoordinapeError::Unauthenticated)
    }

    /// Build full URL for an API path; paths are relative to the base URL's path
    fn endpoint_url(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Build request builder for an API path
    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.endpoint_url(path)?;
        Ok(self.http_client.request(method, url))
    }

    /// Attach the bearer token only when it belongs to `address`
    fn authorize(
        &self,
        builder: RequestBuilder,
        credential: &ApiCredential,
        address: Option<&str>,
    ) -> RequestBuilder {
        match (&credential.address, &credential.token) {
            (Some(owner), Some(token)) if address.is_none_or(|address| address == owner) => {
                builder.bearer_auth(token)
            }
            _ => builder,
        }
    }

    /// Serialize `body`, sign it with the active provider and wrap it in an envelope
    pub async fn signed_envelope<B: Serialize + ?Sized>(&self, body: &B) -> Result<SignedEnvelope> {
        let data = serde_json::to_string(body)?;
        sign_data(&self.credential(), data).await
    }

    /// Generic call: read-only when `body` is `None`, signed otherwise.
    ///
    /// No retries are performed; backend status and body are passed through
    /// as [`CoordinapeError::Transport`].
    pub async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        match body {
            None => self.send_unsigned(method, path).await,
            Some(body) => self.send_signed(method, path, body).await,
        }
    }

    pub(crate) async fn send_unsigned<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
        let credential = self.credential();
        let builder = self.authorize(self.request(method, path)?, &credential, None);
        self.send_json(builder).await
    }

    /// Unsigned GET with query-string filters
    pub(crate) async fn send_query<Q, T>(&self, path: &str, query: &Q) -> Result<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let credential = self.credential();
        let builder = self.authorize(self.request(Method::GET, path)?, &credential, None);
        self.send_json(builder.query(query)).await
    }

    pub(crate) async fn send_signed<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_signed_with(method, path, body, Map::new()).await
    }

    /// Signed call whose JSON body carries extra top-level fields next to the envelope
    pub(crate) async fn send_signed_with<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        extra: Map<String, Value>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let credential = self.credential();
        let envelope = sign_data(&credential, serde_json::to_string(body)?).await?;
        let builder = self.authorize(
            self.request(method, path)?,
            &credential,
            Some(&envelope.address),
        );
        let mut payload = envelope.into_json();
        payload.extend(extra);
        self.send_json(builder.json(&payload)).await
    }

    /// Signed GET whose envelope travels as query parameters
    pub(crate) async fn send_signed_query<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let credential = self.credential();
        let envelope = sign_data(&credential, serde_json::to_string(body)?).await?;
        let builder = self.authorize(
            self.request(Method::GET, path)?,
            &credential,
            Some(&envelope.address),
        );
        self.send_json(builder.query(&envelope.query_pairs())).await
    }

    /// Multipart upload; the signed payload is the file name
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<T> {
        let credential = self.credential();
        let envelope = sign_data(&credential, file_name.to_string()).await?;
        let builder = self.authorize(
            self.request(Method::POST, path)?,
            &credential,
            Some(&envelope.address),
        );
        let form: Form = envelope.into_form(file_name, bytes)?;
        self.send_json(builder.multipart(form)).await
    }

    /// Send a request and decode the JSON response
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "backend returned error status");
            return Err(CoordinapeError::transport(status, body));
        }

        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        Ok(serde_json::from_str(body)?)
    }
}

/// Sign an already-serialized payload with the provider in `credential`
async fn sign_data(credential: &ApiCredential, data: String) -> Result<SignedEnvelope> {
    let address = credential
        .address
        .clone()
        .filter(|address| !address.is_empty())
        .ok_or(CoordinapeError::Unauthenticated)?;
    let provider = credential
        .provider
        .as_ref()
        .ok_or(CoordinapeError::NoProvider)?;
    if provider.address() != address {
        warn!(active = %address, provider = %provider.address(), "provider account differs from session address");
        return Err(CoordinapeError::Unauthenticated);
    }

    let signed = sign(&data, Some(provider)).await?;
    Ok(SignedEnvelope {
        signature: signed.signature,
        data,
        address,
        hash: signed.hash,
    })
}
