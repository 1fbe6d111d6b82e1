//! Token and user-management endpoints.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use stockdesk_auth::tokens::RefreshRequest;
use stockdesk_auth::{Credentials, PasswordChange, RegisterData, TokenPair, UserActivity, UserIdentity, UserUpdate};
use stockdesk_core::UserId;

use crate::error::ClientResult;
use crate::transport::{ApiRequest, Transport};

/// A list endpoint's body: a bare array, or a paginated envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Plain(Vec<T>),
    Page { results: Vec<T> },
}

impl<T> Listing<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Plain(items) => items,
            Listing::Page { results } => results,
        }
    }
}

pub(crate) async fn fetch_list<T: serde::de::DeserializeOwned>(
    transport: &Transport,
    path: &str,
) -> ClientResult<Vec<T>> {
    let listing: Listing<T> = transport.send_json(&ApiRequest::get(path)).await?;
    Ok(listing.into_vec())
}

/// Token issuance, invalidation, registration and the current-user lookup.
#[derive(Debug, Clone)]
pub struct AuthApi {
    transport: Arc<Transport>,
}

impl AuthApi {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// `POST /token/`
    pub async fn issue_token(&self, credentials: &Credentials) -> ClientResult<TokenPair> {
        let request = ApiRequest::post("/token/").json(credentials)?.public();
        self.transport.send_json(&request).await
    }

    /// `POST /token/blacklist/`
    pub async fn blacklist(&self, refresh: &str) -> ClientResult<()> {
        let request = ApiRequest::post("/token/blacklist/").json(&RefreshRequest {
            refresh: refresh.to_string(),
        })?;
        self.transport.send_empty(&request).await
    }

    /// `POST /users/`. The created-account body echoes the input fields
    /// without an `id`, so it is not decoded.
    pub async fn register(&self, data: &RegisterData) -> ClientResult<()> {
        let request = ApiRequest::post("/users/").json(data)?.public();
        self.transport.send_empty(&request).await
    }

    /// `GET /users/me/`
    pub async fn current_user(&self) -> ClientResult<UserIdentity> {
        self.transport.send_json(&ApiRequest::get("/users/me/")).await
    }
}

/// User-management screen operations.
#[derive(Debug, Clone)]
pub struct UsersApi {
    transport: Arc<Transport>,
}

impl UsersApi {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub async fn list(&self) -> ClientResult<Vec<UserIdentity>> {
        fetch_list(&self.transport, "/users/").await
    }

    /// `GET /users/{id}/`
    pub async fn get(&self, id: UserId) -> ClientResult<UserIdentity> {
        self.transport
            .send_json(&ApiRequest::get(format!("/users/{id}/")))
            .await
    }

    /// `PATCH /users/{id}/`. Servers that answer with only the writable
    /// fields (no `id`/`username`) get a follow-up read of the full record.
    pub async fn update(&self, id: UserId, update: &UserUpdate) -> ClientResult<UserIdentity> {
        update.validate()?;
        let request = ApiRequest::patch(format!("/users/{id}/")).json(update)?;
        let body: serde_json::Value = self.transport.send_json(&request).await?;
        match serde_json::from_value::<UserIdentity>(body) {
            Ok(user) => Ok(user),
            Err(err) => {
                debug!(user = %id, error = %err, "partial update response; reloading user");
                self.get(id).await
            }
        }
    }

    pub async fn delete(&self, id: UserId) -> ClientResult<()> {
        self.transport
            .send_empty(&ApiRequest::delete(format!("/users/{id}/")))
            .await
    }

    pub async fn change_password(&self, change: &PasswordChange) -> ClientResult<()> {
        change.validate()?;
        let request = ApiRequest::post("/users/change_password/").json(change)?;
        self.transport.send_empty(&request).await
    }

    /// The caller's own activity log.
    pub async fn activities(&self) -> ClientResult<Vec<UserActivity>> {
        fetch_list(&self.transport, "/users/activities/").await
    }

    pub async fn user_activities(&self, id: UserId) -> ClientResult<Vec<UserActivity>> {
        fetch_list(&self.transport, &format!("/users/{id}/user_activities/")).await
    }
}
