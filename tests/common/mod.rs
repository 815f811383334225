use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use formgate::config::{Config, StoreConfig};

/// In-process stand-in for the hosted data store: REST rows per table, an
/// identity endpoint, and a bucketed blob store.
#[derive(Default)]
pub struct StubState {
    pub rows: Mutex<HashMap<String, Vec<Value>>>,
    /// Column names the stub's "schema" does not know; inserts carrying one
    /// are rejected with a structured unknown-column error.
    pub rejected_columns: Mutex<HashSet<String>>,
    /// bearer token -> email
    pub tokens: Mutex<HashMap<String, String>>,
    pub buckets: Mutex<HashSet<String>>,
}

pub type StubHandle = Arc<StubState>;

async fn stub_insert(
    State(stub): State<StubHandle>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let rejected = stub.rejected_columns.lock().await;
    if let Some(obj) = body.as_object() {
        for key in obj.keys() {
            if rejected.contains(key) {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "code": "PGRST204",
                        "message": format!("Could not find the '{key}' column of '{table}' in the schema cache"),
                    })),
                )
                    .into_response();
            }
        }
    }
    drop(rejected);

    let mut rows = stub.rows.lock().await;
    let table_rows = rows.entry(table).or_default();
    let mut row = body.clone();
    if let Some(obj) = row.as_object_mut() {
        obj.insert("id".to_string(), json!(table_rows.len() as i64 + 1));
    }
    table_rows.push(row.clone());

    let wants_rows = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("return=representation"));
    if wants_rows {
        (StatusCode::CREATED, Json(json!([row]))).into_response()
    } else {
        StatusCode::CREATED.into_response()
    }
}

async fn stub_list(
    State(stub): State<StubHandle>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let rows = stub.rows.lock().await;
    let mut matched: Vec<Value> = rows.get(&table).cloned().unwrap_or_default();

    for (column, filter) in &params {
        if let Some(wanted) = filter.strip_prefix("eq.") {
            matched.retain(|row| {
                row.get(column)
                    .map(|v| match v {
                        Value::String(s) => s == wanted,
                        other => other.to_string() == *wanted,
                    })
                    .unwrap_or(false)
            });
        }
    }

    Json(json!(matched)).into_response()
}

async fn stub_update(
    State(stub): State<StubHandle>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let wanted = params
        .get("id")
        .and_then(|f| f.strip_prefix("eq."))
        .map(|s| s.to_string());
    let mut rows = stub.rows.lock().await;
    let mut updated = Vec::new();
    if let (Some(wanted), Some(table_rows)) = (wanted, rows.get_mut(&table)) {
        for row in table_rows.iter_mut() {
            if row.get("id").map(|v| v.to_string()) == Some(wanted.clone()) {
                if let (Some(obj), Some(patch)) = (row.as_object_mut(), body.as_object()) {
                    for (k, v) in patch {
                        obj.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
    }
    Json(json!(updated)).into_response()
}

async fn stub_delete(
    State(stub): State<StubHandle>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    let wanted = params
        .get("id")
        .and_then(|f| f.strip_prefix("eq."))
        .map(|s| s.to_string());
    let mut rows = stub.rows.lock().await;
    if let (Some(wanted), Some(table_rows)) = (wanted, rows.get_mut(&table)) {
        table_rows.retain(|row| row.get("id").map(|v| v.to_string()) != Some(wanted.clone()));
    }
    StatusCode::NO_CONTENT
}

async fn stub_user(State(stub): State<StubHandle>, headers: HeaderMap) -> Response {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let tokens = stub.tokens.lock().await;
    match token.and_then(|t| tokens.get(&t).cloned()) {
        Some(email) => Json(json!({ "email": email })).into_response(),
        None => (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad token" }))).into_response(),
    }
}

async fn stub_put_object(
    State(stub): State<StubHandle>,
    Path((bucket, _path)): Path<(String, String)>,
) -> Response {
    let buckets = stub.buckets.lock().await;
    if buckets.contains(&bucket) {
        StatusCode::OK.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Bucket not found" })),
        )
            .into_response()
    }
}

async fn stub_create_bucket(State(stub): State<StubHandle>, Json(body): Json<Value>) -> StatusCode {
    if let Some(name) = body.get("name").and_then(|n| n.as_str()) {
        stub.buckets.lock().await.insert(name.to_string());
    }
    StatusCode::OK
}

/// Spawn the stub store on a random port, returning its base URL and handle.
pub async fn spawn_stub_store() -> (String, StubHandle) {
    let stub: StubHandle = Arc::new(StubState::default());

    let app = Router::new()
        .route(
            "/rest/v1/{table}",
            post(stub_insert)
                .get(stub_list)
                .patch(stub_update)
                .delete(stub_delete),
        )
        .route("/auth/v1/user", get(stub_user))
        .route("/storage/v1/object/{bucket}/{*path}", put(stub_put_object))
        .route("/storage/v1/bucket", post(stub_create_bucket))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub store");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Stub store failed");
    });

    (format!("http://{addr}"), stub)
}

/// A running formgate instance under test.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub queue_dir: PathBuf,
    pub stub: Option<StubHandle>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn submit_json(&self, path: &str, data: &Value) -> (Value, reqwest::StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(data)
            .send()
            .await
            .expect("submit failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Admin request using the debug-build bypass header.
    pub async fn admin_get(&self, path: &str) -> (Value, reqwest::StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .header("x-skip-auth", "1")
            .send()
            .await
            .expect("admin get failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn admin_post(&self, path: &str, body: &Value) -> (Value, reqwest::StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .header("x-skip-auth", "1")
            .json(body)
            .send()
            .await
            .expect("admin post failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Rows the stub store has accepted for a table.
    pub async fn stub_rows(&self, table: &str) -> Vec<Value> {
        let stub = self.stub.as_ref().expect("no stub store");
        stub.rows.lock().await.get(table).cloned().unwrap_or_default()
    }

    pub async fn reject_column(&self, column: &str) {
        let stub = self.stub.as_ref().expect("no stub store");
        stub.rejected_columns
            .lock()
            .await
            .insert(column.to_string());
    }

    pub async fn accept_column(&self, column: &str) {
        let stub = self.stub.as_ref().expect("no stub store");
        stub.rejected_columns.lock().await.remove(column);
    }

    pub async fn add_token(&self, token: &str, email: &str) {
        let stub = self.stub.as_ref().expect("no stub store");
        stub.tokens
            .lock()
            .await
            .insert(token.to_string(), email.to_string());
    }

    /// Put an email on the stub's admin allow-list.
    pub async fn add_admin(&self, email: &str) {
        let stub = self.stub.as_ref().expect("no stub store");
        stub.rows
            .lock()
            .await
            .entry("admin_users".to_string())
            .or_default()
            .push(json!({ "email": email }));
    }
}

fn test_config(store: Option<StoreConfig>, queue_dir: PathBuf) -> Config {
    Config {
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to a random port
        store,
        queue_dir,
        max_body_size: 1_048_576,
        request_timeout_secs: 5,
        sync_on_start: false,
        dev_admin_email: "dev@localhost".to_string(),
        log_level: "warn".to_string(),
    }
}

async fn spawn_with(store: Option<StoreConfig>, stub: Option<StubHandle>) -> TestApp {
    let queue_dir = std::env::temp_dir().join(format!(
        "formgate_test_{}",
        Uuid::now_v7().to_string().replace('-', "")
    ));

    let (app, _state) = formgate::build_app(test_config(store, queue_dir.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        queue_dir,
        stub,
    }
}

/// Spawn the app wired to a live stub store.
pub async fn spawn_app() -> TestApp {
    let (url, stub) = spawn_stub_store().await;
    spawn_with(
        Some(StoreConfig {
            url,
            key: "test-key".to_string(),
        }),
        Some(stub),
    )
    .await
}

/// Spawn the app pointing at a dead address: every remote call fails as a
/// transient store error.
pub async fn spawn_app_unreachable() -> TestApp {
    spawn_with(
        Some(StoreConfig {
            url: "http://127.0.0.1:1".to_string(),
            key: "test-key".to_string(),
        }),
        None,
    )
    .await
}

/// Spawn the app with no store credentials at all.
pub async fn spawn_app_unconfigured() -> TestApp {
    spawn_with(None, None).await
}

/// Remove the app's queue directory.
pub async fn cleanup(app: TestApp) {
    let _ = tokio::fs::remove_dir_all(&app.queue_dir).await;
}
