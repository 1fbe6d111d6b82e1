//! In-process mock of the inventory API, bound to an ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::Notify;

use stockdesk_client::{ClientConfig, SessionStore, TokenStore, Transport};

#[derive(Default)]
pub struct MockApi {
    users: Mutex<HashMap<u64, (String, Value)>>,
    access: Mutex<HashMap<String, u64>>,
    refresh: Mutex<HashMap<String, u64>>,
    pub token_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub blacklist_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub user_detail_calls: AtomicUsize,
    pub stock_calls: AtomicUsize,
    pub fail_blacklist: AtomicBool,
    pub reject_every_access: AtomicBool,
    pub bearer_on_public: AtomicBool,
    pub fail_token_issue: AtomicBool,
    /// Refresh answers wait for `refresh_release` once the new token is issued.
    pub hold_refresh: AtomicBool,
    pub refresh_release: Notify,
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

pub fn set(flag: &AtomicBool) {
    flag.store(true, Ordering::SeqCst);
}

impl MockApi {
    /// One account: id 1, `alice` / `good-pw`, ADMIN.
    pub fn with_alice() -> Self {
        let api = Self::default();
        api.add_user(
            "good-pw",
            json!({
                "id": 1,
                "username": "alice",
                "email": "alice@example.com",
                "role": "ADMIN",
                "first_name": "Alice",
                "last_name": "Archer",
                "is_active": true,
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }),
        );
        api
    }

    pub fn add_user(&self, password: &str, record: Value) {
        let id = record["id"].as_u64().expect("record id");
        self.users
            .lock()
            .unwrap()
            .insert(id, (password.to_string(), record));
    }

    pub fn grant_access(&self, token: &str, user_id: u64) {
        self.access.lock().unwrap().insert(token.to_string(), user_id);
    }

    pub fn grant_refresh(&self, token: &str, user_id: u64) {
        self.refresh.lock().unwrap().insert(token.to_string(), user_id);
    }

    fn bearer_user(&self, headers: &HeaderMap) -> Option<u64> {
        if self.reject_every_access.load(Ordering::SeqCst) {
            return None;
        }
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let token = value.strip_prefix("Bearer ")?;
        self.access.lock().unwrap().get(token).copied()
    }

    fn note_public(&self, headers: &HeaderMap) {
        if headers.contains_key(header::AUTHORIZATION) {
            set(&self.bearer_on_public);
        }
    }

    fn record(&self, id: u64) -> Option<Value> {
        self.users.lock().unwrap().get(&id).map(|(_, r)| r.clone())
    }
}

fn not_authenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })),
    )
        .into_response()
}

async fn issue_token(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    api.token_calls.fetch_add(1, Ordering::SeqCst);
    api.note_public(&headers);
    if api.fail_token_issue.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let found = api
        .users
        .lock()
        .unwrap()
        .iter()
        .find(|(_, (pw, r))| r["username"] == username && pw == password)
        .map(|(id, _)| *id);

    let Some(id) = found else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
            .into_response();
    };

    let (access, refresh) = if username == "alice" {
        ("A1".to_string(), "R1".to_string())
    } else {
        (format!("A-{username}"), format!("R-{username}"))
    };
    api.grant_access(&access, id);
    api.grant_refresh(&refresh, id);
    Json(json!({ "access": access, "refresh": refresh })).into_response()
}

async fn refresh_token(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    api.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let refresh = body["refresh"].as_str().unwrap_or_default();
    let owner = api.refresh.lock().unwrap().get(refresh).copied();
    match owner {
        Some(id) => {
            let access = if id == 1 { "A2".to_string() } else { format!("A2-{id}") };
            api.grant_access(&access, id);
            if api.hold_refresh.load(Ordering::SeqCst) {
                api.refresh_release.notified().await;
            }
            Json(json!({ "access": access })).into_response()
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" })),
        )
            .into_response(),
    }
}

async fn blacklist(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    api.blacklist_calls.fetch_add(1, Ordering::SeqCst);
    if api.fail_blacklist.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "detail": "maintenance" })),
        )
            .into_response();
    }
    if let Some(refresh) = body["refresh"].as_str() {
        api.refresh.lock().unwrap().remove(refresh);
    }
    Json(json!({})).into_response()
}

async fn register(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    api.register_calls.fetch_add(1, Ordering::SeqCst);
    api.note_public(&headers);

    let username = body["username"].as_str().unwrap_or_default().to_string();
    let mut users = api.users.lock().unwrap();
    if users.values().any(|(_, r)| r["username"] == username.as_str()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "username": ["A user with that username already exists."] })),
        )
            .into_response();
    }
    if body["password"] != body["password2"] {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "password": ["Password fields didn't match."] })),
        )
            .into_response();
    }

    let id = users.keys().max().copied().unwrap_or(0) + 1;
    let record = json!({
        "id": id,
        "username": username,
        "email": body["email"],
        "role": body["role"],
        "first_name": body.get("first_name").cloned().unwrap_or(json!("")),
        "last_name": body.get("last_name").cloned().unwrap_or(json!("")),
        "is_active": true
    });
    let password = body["password"].as_str().unwrap_or_default().to_string();
    users.insert(id, (password, record));

    // The create serializer echoes the writable fields only: no id, and the
    // role as its storage code.
    let role = match body["role"].as_str() {
        Some("SUPER_ADMIN") | Some("SA") => "SA",
        _ => "AD",
    };
    let created = json!({
        "username": username,
        "email": body["email"],
        "role": role,
        "first_name": body.get("first_name").cloned().unwrap_or(json!("")),
        "last_name": body.get("last_name").cloned().unwrap_or(json!(""))
    });
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn me(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    api.me_calls.fetch_add(1, Ordering::SeqCst);
    match api.bearer_user(&headers).and_then(|id| api.record(id)) {
        Some(record) => Json(record).into_response(),
        None => not_authenticated(),
    }
}

async fn list_users(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    if api.bearer_user(&headers).is_none() {
        return not_authenticated();
    }
    let mut records: Vec<Value> = api
        .users
        .lock()
        .unwrap()
        .values()
        .map(|(_, r)| r.clone())
        .collect();
    records.sort_by_key(|r| r["id"].as_u64());
    Json(json!({ "count": records.len(), "results": records })).into_response()
}

async fn update_user(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Response {
    if api.bearer_user(&headers).is_none() {
        return not_authenticated();
    }
    let mut users = api.users.lock().unwrap();
    let Some((_, record)) = users.get_mut(&id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response();
    };
    if let (Some(target), Some(fields)) = (record.as_object_mut(), body.as_object()) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
        target.insert("updated_at".into(), json!("2024-05-01T12:00:00Z"));
    }
    // The update serializer echoes the writable fields only.
    Json(json!({
        "email": record["email"],
        "first_name": record["first_name"],
        "last_name": record["last_name"],
        "role": record["role"]
    }))
    .into_response()
}

async fn get_user(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    api.user_detail_calls.fetch_add(1, Ordering::SeqCst);
    if api.bearer_user(&headers).is_none() {
        return not_authenticated();
    }
    match api.record(id) {
        Some(record) => Json(record).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response(),
    }
}

async fn delete_user(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if api.bearer_user(&headers).is_none() {
        return not_authenticated();
    }
    match api.users.lock().unwrap().remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response(),
    }
}

async fn list_stock(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    api.stock_calls.fetch_add(1, Ordering::SeqCst);
    if api.bearer_user(&headers).is_none() {
        return not_authenticated();
    }
    Json(json!([
        { "id": 1, "product": 1, "product_name": "Widget", "quantity": 3, "reorder_level": 10, "reorder_quantity": 20 },
        { "id": 2, "product": 2, "product_name": "Gadget", "quantity": 50, "reorder_level": 10, "reorder_quantity": 20 }
    ]))
    .into_response()
}

fn router(api: Arc<MockApi>) -> Router {
    Router::new()
        .route("/api/token/", post(issue_token))
        .route("/api/token/refresh/", post(refresh_token))
        .route("/api/token/blacklist/", post(blacklist))
        .route("/api/users/", get(list_users).post(register))
        .route("/api/users/me/", get(me))
        .route("/api/users/:id/", get(get_user).patch(update_user).delete(delete_user))
        .route("/api/stock/", get(list_stock))
        .with_state(api)
}

pub struct TestServer {
    pub base_url: String,
    pub api: Arc<MockApi>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn(api: MockApi) -> Self {
        let api = Arc::new(api);
        let app = router(Arc::clone(&api));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            api,
            handle,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url.clone())
    }

    pub fn session(&self, tokens: Arc<dyn TokenStore>) -> SessionStore {
        self.session_with(self.config(), tokens)
    }

    pub fn session_with(&self, config: ClientConfig, tokens: Arc<dyn TokenStore>) -> SessionStore {
        let transport = Arc::new(Transport::new(&config, tokens).expect("transport"));
        SessionStore::new(transport, &config)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
