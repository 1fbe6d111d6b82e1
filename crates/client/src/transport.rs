//! Authenticated HTTP transport.
//!
//! Every request reads the access token from the durable slot right before
//! dispatch. A first `401` on a bearer request triggers exactly one refresh and
//! one re-dispatch; the outcome of that re-dispatch is final. When the refresh
//! cannot happen, both tokens are cleared and `TransportEvent::LoginRequired`
//! is broadcast.
//!
//! Sign-in and sign-out bump a session epoch. A refresh that started under an
//! older epoch never writes its token back.

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use stockdesk_auth::RefreshedToken;
use stockdesk_auth::tokens::RefreshRequest;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::token_store::TokenStore;

pub const REFRESH_PATH: &str = "/token/refresh/";

/// Whether a request carries the bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// Attach the stored access token (if any) and recover from a first 401.
    Bearer,
    /// Never attach a token; a 401 is returned as is.
    Public,
}

/// A logical request, replayable for the single retry.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    auth: Auth,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            auth: Auth::Bearer,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> ClientResult<Self> {
        let value = serde_json::to_value(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn public(mut self) -> Self {
        self.auth = Auth::Public;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn auth(&self) -> Auth {
        self.auth
    }
}

/// Signals the transport raises for the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session could not be recovered; send the user to the login screen.
    LoginRequired,
}

/// Outcome of a refresh attempt that reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refresh {
    Renewed,
    /// The session changed while the refresh was in flight; nothing was stored.
    Superseded,
}

#[derive(Debug)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    events: broadcast::Sender<TransportEvent>,
    epoch: Mutex<u64>,
}

impl Transport {
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenStore>) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        let (events, _) = broadcast::channel(16);

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            tokens,
            events,
            epoch: Mutex::new(0),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    /// Start a new session epoch. Refreshes already in flight will discard
    /// their result instead of writing it to the slot.
    pub fn supersede_pending_refreshes(&self) {
        *self.epoch.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn current_epoch(&self) -> u64 {
        *self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send `request`, returning only a successful response.
    pub async fn send(&self, request: &ApiRequest) -> ClientResult<reqwest::Response> {
        let response = self.dispatch(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED || request.auth == Auth::Public {
            return ensure_success(response).await;
        }

        // First 401 for this logical request. Whatever the retry returns is final.
        let rejection = rejection(response).await;
        match self.refresh_access().await {
            Ok(Refresh::Superseded) => {
                debug!(path = %request.path, "session changed during refresh; not retrying");
                Err(rejection)
            }
            Ok(Refresh::Renewed) => {
                debug!(method = %request.method, path = %request.path, "retrying after token refresh");
                let retried = self.dispatch(request).await?;
                ensure_success(retried).await
            }
            Err(err) => {
                warn!(error = %err, path = %request.path, "token refresh failed; clearing session");
                self.expire_session();
                Err(rejection)
            }
        }
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> ClientResult<T> {
        let response = self.send(request).await?;
        decode(response).await
    }

    /// Send and discard the response body.
    pub async fn send_empty(&self, request: &ApiRequest) -> ClientResult<()> {
        self.send(request).await.map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn dispatch(&self, request: &ApiRequest) -> ClientResult<reqwest::Response> {
        let mut builder = self.http.request(request.method.clone(), self.url(&request.path));

        if request.auth == Auth::Bearer {
            match self.tokens.access() {
                Ok(Some(token)) => builder = builder.bearer_auth(token),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "could not read access token; sending unauthenticated"),
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, "dispatching request");
        Ok(builder.send().await?)
    }

    /// Trade the stored refresh token for a new access token.
    async fn refresh_access(&self) -> ClientResult<Refresh> {
        let started = self.current_epoch();
        let refresh = self.tokens.refresh()?.ok_or(ClientError::NotAuthenticated)?;

        let response = self
            .http
            .post(self.url(REFRESH_PATH))
            .json(&RefreshRequest { refresh })
            .send()
            .await?;
        let refreshed: RefreshedToken = decode(ensure_success(response).await?).await?;

        let epoch = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        if *epoch != started {
            return Ok(Refresh::Superseded);
        }
        match &refreshed.refresh {
            Some(rotated) => self.tokens.set_pair(&refreshed.access, rotated)?,
            None => self.tokens.set_access(&refreshed.access)?,
        }
        drop(epoch);
        info!(rotated = refreshed.refresh.is_some(), "access token refreshed");
        Ok(Refresh::Renewed)
    }

    fn expire_session(&self) {
        if let Err(err) = self.tokens.clear() {
            warn!(error = %err, "failed to clear token slot");
        }
        // No receivers simply means no UI is listening.
        let _ = self.events.send(TransportEvent::LoginRequired);
    }
}

async fn ensure_success(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(rejection(response).await)
    }
}

async fn rejection(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ClientError::from_response_body(status, &body)
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}
