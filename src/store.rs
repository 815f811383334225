use reqwest::Method;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::AppError;

/// Options for a single store request.
///
/// `return_representation` is the "give me the inserted/updated rows back"
/// flag. The remote protocol expects it as a `Prefer` header, not a query
/// parameter, so it never appears in the URL.
#[derive(Debug, Default, Clone)]
pub struct QueryOptions {
    pub params: Vec<(String, String)>,
    pub return_representation: bool,
    pub idempotency_key: Option<String>,
}

impl QueryOptions {
    pub fn returning() -> Self {
        Self {
            return_representation: true,
            ..Self::default()
        }
    }

    pub fn filter(key: &str, value: &str) -> Self {
        Self {
            params: vec![(key.to_string(), value.to_string())],
            ..Self::default()
        }
    }
}

/// Whether a remote failure is the store rejecting an unknown column.
///
/// The store returns a structured error code when it can; the message
/// substring is a fallback for plain-text rejections only.
pub fn is_unknown_column_error(err: &AppError) -> bool {
    let AppError::RemoteStore { body, .. } = err else {
        return false;
    };
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(code) = parsed.get("code").and_then(|c| c.as_str()) {
            return code == "PGRST204" || code == "42703";
        }
    }
    body.contains("Could not find") || body.contains("PGRST204")
}

/// Thin protocol-translation client for the hosted tabular data store.
///
/// One REST endpoint per table under `rest/v1/`. The credential goes out as
/// both an `apikey` header and a bearer token. These header requirements are
/// part of the remote protocol; the store rejects requests without them.
pub struct StoreClient {
    http: reqwest::Client,
    config: Option<StoreConfig>,
}

impl StoreClient {
    pub fn new(config: Option<StoreConfig>, timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .build()
                .expect("Failed to build reqwest client"),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&StoreConfig, AppError> {
        self.config
            .as_ref()
            .ok_or_else(|| AppError::Configuration("remote store credentials not set".to_string()))
    }

    /// Perform one logical operation against a table.
    ///
    /// JSON response bodies are parsed; anything else comes back as a string
    /// value. An empty body is `Value::Null`, never an error.
    pub async fn request(
        &self,
        table: &str,
        method: Method,
        body: Option<&Value>,
        opts: QueryOptions,
    ) -> Result<Value, AppError> {
        let cfg = self.config()?;
        let url = format!("{}/rest/v1/{}", cfg.url, table);

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("apikey", &cfg.key)
            .bearer_auth(&cfg.key);

        if !opts.params.is_empty() {
            req = req.query(&opts.params);
        }
        if opts.return_representation {
            req = req.header("Prefer", "return=representation");
        }
        if let Some(key) = &opts.idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        if method == Method::GET {
            req = req.header("Accept", "application/json");
        }
        if let Some(body) = body {
            // .json() also sets Content-Type: application/json, which the
            // store requires for writes.
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| AppError::RemoteStore {
            status: 0,
            body: e.to_string(),
            url: url.clone(),
        })?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AppError::RemoteStore {
                status: status.as_u16(),
                body: text,
                url,
            });
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        if content_type.contains("application/json") {
            serde_json::from_str(&text).map_err(|e| AppError::RemoteStore {
                status: status.as_u16(),
                body: format!("invalid JSON in response: {e}"),
                url,
            })
        } else {
            Ok(Value::String(text))
        }
    }

    pub async fn list(&self, table: &str) -> Result<Value, AppError> {
        self.request(table, Method::GET, None, QueryOptions::default())
            .await
    }

    pub async fn insert(
        &self,
        table: &str,
        record: &Value,
        opts: QueryOptions,
    ) -> Result<Value, AppError> {
        self.request(table, Method::POST, Some(record), opts).await
    }

    pub async fn update(&self, table: &str, id: &str, record: &Value) -> Result<Value, AppError> {
        let mut opts = QueryOptions::filter("id", &format!("eq.{id}"));
        opts.return_representation = true;
        self.request(table, Method::PATCH, Some(record), opts).await
    }

    pub async fn delete(&self, table: &str, id: &str) -> Result<Value, AppError> {
        self.request(
            table,
            Method::DELETE,
            None,
            QueryOptions::filter("id", &format!("eq.{id}")),
        )
        .await
    }

    /// Validate a caller's bearer token against the store's identity endpoint
    /// and return the authenticated email.
    pub async fn validate_token(&self, bearer: &str) -> Result<String, AppError> {
        let cfg = self.config()?;
        let url = format!("{}/auth/v1/user", cfg.url);

        let resp = self
            .http
            .get(&url)
            .header("apikey", &cfg.key)
            .header("Authorization", bearer)
            .send()
            .await
            .map_err(|e| AppError::RemoteStore {
                status: 0,
                body: e.to_string(),
                url: url.clone(),
            })?;

        if !resp.status().is_success() {
            return Err(AppError::Unauthorized("Invalid auth token".to_string()));
        }

        let user: Value = resp
            .json()
            .await
            .map_err(|_| AppError::Unauthorized("Invalid auth token".to_string()))?;

        user.get("email")
            .and_then(|e| e.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Unauthorized("Unauthenticated".to_string()))
    }
}
