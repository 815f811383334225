use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::error::AppError;
use crate::reconcile;
use crate::schema::ADMIN_TABLES;
use crate::state::SharedState;
use crate::store::QueryOptions;

fn check_table(table: &str) -> Result<(), AppError> {
    if ADMIN_TABLES.contains(&table) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Unknown table: {table}")))
    }
}

pub async fn list_table(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> Result<Json<Value>, AppError> {
    check_table(&table)?;
    let rows = state.store.list(&table).await?;
    Ok(Json(rows))
}

pub async fn create_record(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    check_table(&table)?;
    let rows = state
        .store
        .insert(&table, &payload, QueryOptions::returning())
        .await?;
    Ok(Json(rows))
}

pub async fn update_record(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path((table, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    check_table(&table)?;
    let rows = state.store.update(&table, &id, &payload).await?;
    Ok(Json(rows))
}

pub async fn delete_record(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    check_table(&table)?;
    state.store.delete(&table, &id).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Replay the local fallback queue against the remote store and report the
/// per-table outcome.
pub async fn sync_local(
    _admin: AdminUser,
    State(state): State<SharedState>,
) -> Result<Json<Value>, AppError> {
    let reports = reconcile::run_all(&state.store, &state.queue).await;
    Ok(Json(serde_json::to_value(reports).unwrap_or(Value::Null)))
}

#[derive(Deserialize)]
pub struct UploadRequest {
    pub bucket: String,
    pub path: String,
    pub file_base64: String,
    pub content_type: Option<String>,
}

pub async fn upload(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<Value>, AppError> {
    if req.bucket.is_empty() || req.path.is_empty() {
        return Err(AppError::BadRequest(
            "bucket, path and file_base64 are required".to_string(),
        ));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.file_base64)
        .map_err(|e| AppError::BadRequest(format!("Invalid base64 payload: {e}")))?;

    let content_type = req
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let url = state
        .blobs
        .upload(&req.bucket, &req.path, bytes, &content_type)
        .await?;

    Ok(Json(json!({ "ok": true, "url": url })))
}

pub async fn export_table(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    check_table(&table)?;

    let rows = state.store.list(&table).await?;
    let rows = rows
        .as_array()
        .ok_or_else(|| AppError::Internal("Unexpected response from store".to_string()))?;

    let csv = rows_to_csv(rows);
    let disposition = format!("attachment; filename=\"{table}.csv\"");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

/// Multi-table export: one `# SECTION` per table in a single delimited-text
/// document. A table whose read fails becomes an error note; the export
/// never aborts on one table.
pub async fn export_forms(
    _admin: AdminUser,
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let mut out = String::new();

    for table in ADMIN_TABLES {
        out.push_str(&format!("# {}\n", table.to_uppercase()));

        let rows = match state.store.list(table).await {
            Ok(rows) => rows,
            Err(e) => {
                out.push_str(&format!("(error: {e})\n\n"));
                continue;
            }
        };
        let Some(rows) = rows.as_array() else {
            out.push_str("(unexpected response)\n\n");
            continue;
        };
        if rows.is_empty() {
            out.push_str("(no rows)\n\n");
            continue;
        }

        out.push_str(&rows_to_csv(rows));
        out.push('\n');
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"all_forms.csv\"".to_string(),
            ),
        ],
        out,
    ))
}

fn rows_to_csv(rows: &[Value]) -> String {
    use std::fmt::Write;

    let mut csv = String::new();
    let Some(first) = rows.first().and_then(|r| r.as_object()) else {
        return csv;
    };
    let columns: Vec<&String> = first.keys().collect();

    let _ = writeln!(csv, "{}", columns.iter().map(|c| csv_escape(c)).collect::<Vec<_>>().join(","));

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match row.get(c.as_str()) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => csv_escape(s),
                Some(other) => csv_escape(&other.to_string()),
            })
            .collect();
        let _ = writeln!(csv, "{}", cells.join(","));
    }

    csv
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
