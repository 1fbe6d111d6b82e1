//! Session store: the single owner of "who is logged in".
//!
//! State changes are published as whole `Session` records through a `watch`
//! channel. Observers treat `loading` as the gate: while it is `true`,
//! `user`/`authenticated` are not yet meaningful.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use stockdesk_auth::{AuthzError, Credentials, RegisterData, Section, UserIdentity, UserUpdate, authorize};

use crate::api::{AuthApi, UsersApi};
use crate::catalog::CatalogApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::token_store::{FileTokenStore, TokenStore};
use crate::transport::Transport;

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";
const PROFILE_UPDATE_FAILED: &str = "Profile update failed";

/// In-memory authentication state.
///
/// `authenticated == true` implies `user` and `access_token` are present.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: Option<UserIdentity>,
    #[serde(skip)]
    pub access_token: Option<String>,
    #[serde(skip)]
    pub refresh_token: Option<String>,
    pub authenticated: bool,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl Session {
    /// Start-of-process state: restore pending.
    pub fn restoring() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }

    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn authenticated(user: UserIdentity, access: String, refresh: Option<String>) -> Self {
        Self {
            user: Some(user),
            access_token: Some(access),
            refresh_token: refresh,
            authenticated: true,
            loading: false,
            last_error: None,
        }
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user.as_ref().map(|u| &u.username))
            .field("authenticated", &self.authenticated)
            .field("loading", &self.loading)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct SessionStore {
    auth: AuthApi,
    users: UsersApi,
    catalog: CatalogApi,
    tokens: Arc<dyn TokenStore>,
    state: watch::Sender<Session>,
    initialized: AtomicBool,
    login_after_register: bool,
}

impl SessionStore {
    pub fn new(transport: Arc<Transport>, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(Session::restoring());
        Self {
            auth: AuthApi::new(Arc::clone(&transport)),
            users: UsersApi::new(Arc::clone(&transport)),
            catalog: CatalogApi::new(Arc::clone(&transport)),
            tokens: Arc::clone(transport.tokens()),
            state,
            initialized: AtomicBool::new(false),
            login_after_register: config.login_after_register,
        }
    }

    /// Transport + file-backed token slot, both from `config`.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&config.token_file));
        let transport = Arc::new(Transport::new(config, tokens)?);
        Ok(Self::new(transport, config))
    }

    pub fn transport(&self) -> &Arc<Transport> {
        self.auth.transport()
    }

    pub fn users(&self) -> &UsersApi {
        &self.users
    }

    pub fn catalog(&self) -> &CatalogApi {
        &self.catalog
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Wait until no restore/login/register is in flight.
    pub async fn ready(&self) -> Session {
        let mut rx = self.subscribe();
        match rx.wait_for(|s| !s.loading).await {
            Ok(session) => session.clone(),
            // The sender lives in `self`, so it cannot be gone while we borrow it.
            Err(_) => self.snapshot(),
        }
    }

    /// Restore the session from the durable slot. Runs once per store; later
    /// calls return the current state untouched.
    pub async fn initialize(&self) -> Session {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return self.snapshot();
        }

        let access = match self.tokens.access() {
            Ok(access) => access,
            Err(err) => {
                warn!(error = %err, "token slot unreadable; starting logged out");
                self.discard_tokens();
                None
            }
        };

        if access.is_none() {
            self.state.send_replace(Session::logged_out());
            return self.snapshot();
        }

        match self.auth.current_user().await {
            Ok(user) => {
                // The transport may have refreshed the access token on the way.
                let access = self.tokens.access().ok().flatten();
                let refresh = self.tokens.refresh().ok().flatten();
                match access {
                    Some(access) => {
                        info!(user = %user.username, "session restored");
                        self.state
                            .send_replace(Session::authenticated(user, access, refresh));
                    }
                    None => {
                        self.state.send_replace(Session::logged_out());
                    }
                }
            }
            Err(err) => {
                info!(error = %err, "stored session rejected; starting logged out");
                self.discard_tokens();
                self.state.send_replace(Session::logged_out());
            }
        }

        self.snapshot()
    }

    /// Exchange credentials for a token pair, then load the user.
    ///
    /// On failure nothing is applied except `last_error`; the error is also
    /// returned so the caller can stay on its form.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<UserIdentity> {
        let credentials = Credentials::new(username, password);
        self.begin_loading();
        self.transport().supersede_pending_refreshes();

        let pair = match self.auth.issue_token(&credentials).await {
            Ok(pair) => pair,
            Err(err) => return Err(self.fail(err, LOGIN_FAILED, false)),
        };
        if let Err(err) = self.tokens.set_pair(&pair.access, &pair.refresh) {
            return Err(self.fail(err.into(), LOGIN_FAILED, false));
        }

        let user = match self.auth.current_user().await {
            Ok(user) => user,
            Err(err) => {
                self.discard_tokens();
                return Err(self.fail(err, LOGIN_FAILED, true));
            }
        };

        info!(user = %user.username, role = %user.role, "logged in");
        self.state.send_replace(Session::authenticated(
            user.clone(),
            pair.access,
            Some(pair.refresh),
        ));
        Ok(user)
    }

    /// Create an account. Validation runs before any request is made.
    pub async fn register(&self, data: &RegisterData) -> ClientResult<()> {
        if let Err(err) = data.validate() {
            return Err(self.fail(err.into(), REGISTRATION_FAILED, false));
        }

        self.begin_loading();
        if let Err(err) = self.auth.register(data).await {
            return Err(self.fail(err, REGISTRATION_FAILED, false));
        }
        info!(user = %data.username, "account registered");

        if self.login_after_register {
            let credentials = data.credentials();
            if let Err(err) = self.login(&credentials.username, &credentials.password).await {
                let message = err.user_message(REGISTRATION_FAILED);
                self.state.send_modify(|s| s.last_error = Some(message));
                return Err(err);
            }
            Ok(())
        } else {
            self.state.send_modify(|s| {
                s.loading = false;
                s.last_error = None;
            });
            Ok(())
        }
    }

    /// Best-effort server-side invalidation, then an unconditional local
    /// sign-out. Never fails.
    pub async fn logout(&self) {
        let _signed_out = SignOutOnDrop(self);

        match self.tokens.refresh() {
            Ok(Some(refresh)) => {
                if let Err(err) = self.auth.blacklist(&refresh).await {
                    warn!(error = %err, "token invalidation failed; signing out locally");
                }
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "could not read refresh token"),
        }
    }

    /// Patch the current user's profile and adopt the server's record.
    pub async fn update_profile(&self, update: &UserUpdate) -> ClientResult<UserIdentity> {
        let current = {
            let state = self.state.borrow();
            state.user.clone().filter(|_| state.authenticated)
        };
        let Some(current) = current else {
            return Err(self.fail(ClientError::NotAuthenticated, PROFILE_UPDATE_FAILED, false));
        };

        let updated = match self.users.update(current.id, update).await {
            Ok(user) => user,
            Err(err) => return Err(self.fail(err, PROFILE_UPDATE_FAILED, false)),
        };

        // Only adopt the record if the same user is still signed in.
        self.state.send_if_modified(|s| {
            let same_user = s.authenticated && s.user.as_ref().is_some_and(|u| u.id == current.id);
            if same_user {
                s.user = Some(updated.clone());
                s.last_error = None;
            }
            same_user
        });
        Ok(updated)
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.last_error.take().is_some());
    }

    /// Role gate for a dashboard section against the current user.
    pub fn authorize(&self, section: Section) -> Result<(), AuthzError> {
        let state = self.state.borrow();
        let user = state.user.as_ref().filter(|_| state.authenticated);
        authorize(user, section)
    }

    fn begin_loading(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.last_error = None;
        });
    }

    /// Record `err` as `last_error` and hand it back. `signed_out` resets the
    /// rest of the state as well.
    fn fail(&self, err: ClientError, fallback: &str, signed_out: bool) -> ClientError {
        let message = err.user_message(fallback);
        warn!(error = %err, "{fallback}");
        let base = if signed_out {
            Session::logged_out()
        } else {
            self.snapshot()
        };
        self.state.send_replace(Session {
            loading: false,
            last_error: Some(message),
            ..base
        });
        err
    }

    fn discard_tokens(&self) {
        if let Err(err) = self.tokens.clear() {
            warn!(error = %err, "failed to clear token slot");
        }
    }
}

/// Runs the local half of logout even if the logout future is dropped
/// mid-request.
struct SignOutOnDrop<'a>(&'a SessionStore);

impl Drop for SignOutOnDrop<'_> {
    fn drop(&mut self) {
        self.0.transport().supersede_pending_refreshes();
        self.0.discard_tokens();
        self.0.state.send_replace(Session::logged_out());
        info!("logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::MemoryTokenStore;

    fn store_with(tokens: MemoryTokenStore) -> SessionStore {
        // Nothing listens on this port; tests here must not reach the network.
        let config = ClientConfig::new("http://127.0.0.1:9");
        let transport = Arc::new(Transport::new(&config, Arc::new(tokens)).unwrap());
        SessionStore::new(transport, &config)
    }

    #[test]
    fn starts_in_restoring_state() {
        let store = store_with(MemoryTokenStore::new());
        let session = store.snapshot();
        assert!(session.loading);
        assert!(!session.authenticated);
        assert_eq!(store.authorize(Section::Dashboard), Err(AuthzError::NotAuthenticated));
    }

    #[tokio::test]
    async fn initialize_without_token_settles_logged_out() {
        let store = store_with(MemoryTokenStore::new());
        let session = store.initialize().await;
        assert_eq!(session, Session::logged_out());
        assert!(!store.ready().await.loading);
    }

    #[tokio::test]
    async fn update_profile_requires_a_user() {
        let store = store_with(MemoryTokenStore::new());
        store.initialize().await;

        let err = store
            .update_profile(&UserUpdate {
                first_name: Some("Al".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
        assert_eq!(store.snapshot().last_error.as_deref(), Some("User not found"));

        store.clear_error();
        assert_eq!(store.snapshot().last_error, None);
    }

    #[tokio::test]
    async fn register_validation_happens_before_any_request() {
        let store = store_with(MemoryTokenStore::new());
        let data = RegisterData::new("alice", "alice@example.com", "good-pw", "typo-pw");

        let err = store.register(&data).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        let session = store.snapshot();
        assert_eq!(session.last_error.as_deref(), Some("Passwords do not match"));
        assert!(!session.authenticated);
    }

    #[test]
    fn debug_never_prints_tokens() {
        let session = Session {
            access_token: Some("A1".into()),
            refresh_token: Some("R1".into()),
            ..Default::default()
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("A1"));
        assert!(!rendered.contains("R1"));
    }
}
