use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::AppError;
use crate::ingest;
use crate::schema::FormTable;
use crate::state::SharedState;
use crate::store::QueryOptions;

pub async fn submit_quote(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    submit(&state, FormTable::Quotes, &headers, &body).await
}

pub async fn submit_contact(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    submit(&state, FormTable::Contacts, &headers, &body).await
}

/// One submission's lifecycle: validate, normalize, attempt the remote
/// insert, and fall back to the local queue on any remote failure. The
/// submitter only sees an error when the remote insert *and* the local queue
/// write both fail.
async fn submit(
    state: &SharedState,
    table: FormTable,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response, AppError> {
    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());
    let payload = ingest::parse_body(content_type, body).map_err(AppError::BadRequest)?;

    table
        .validate(&payload)
        .map_err(AppError::Validation)?;

    let record = table.normalize(&payload);

    match state
        .store
        .insert(table.name(), &record, QueryOptions::returning())
        .await
    {
        Ok(rows) => Ok((
            StatusCode::CREATED,
            Json(json!({ "ok": true, "rows": rows })),
        )
            .into_response()),
        Err(e) => {
            tracing::warn!("Remote insert into {} failed, queueing locally: {e}", table.name());
            let entry = state.queue.enqueue(table.name(), record).await?;
            Ok((
                StatusCode::CREATED,
                Json(json!({ "id": entry.id, "receivedAt": entry.received_at })),
            )
                .into_response())
        }
    }
}
