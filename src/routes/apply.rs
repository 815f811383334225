use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::error::AppError;
use crate::ingest::{self, UploadedFile};
use crate::schema::FormTable;
use crate::state::SharedState;
use crate::store::{is_unknown_column_error, QueryOptions};

const RESUME_BUCKET: &str = "resumes";
const RESUME_FIELDS: &[&str] = &["resume_url", "resume_filename", "resume_content_type"];

/// Job application intake. Multipart when a resume is attached, plain JSON
/// otherwise. The resume goes to the blob store first; only its reference is
/// attached to the record. The binary itself is never queued locally.
pub async fn submit_application(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());

    let (payload, resume) = if content_type.is_some_and(|ct| ct.contains("multipart/form-data")) {
        ingest::parse_multipart(&headers, body)
            .await
            .map_err(AppError::BadRequest)?
    } else {
        let payload = ingest::parse_body(content_type, &body).map_err(AppError::BadRequest)?;
        (payload, None)
    };

    FormTable::Applications
        .validate(&payload)
        .map_err(AppError::Validation)?;

    let mut record = FormTable::Applications.normalize(&payload);

    if let Some(file) = resume {
        let url = upload_resume(&state, &file).await?;
        if let Some(obj) = record.as_object_mut() {
            obj.insert("resume_url".to_string(), json!(url));
            obj.insert("resume_filename".to_string(), json!(file.filename));
            obj.insert("resume_content_type".to_string(), json!(file.content_type));
        }
    }

    let first = match state
        .store
        .insert("applications", &record, QueryOptions::returning())
        .await
    {
        Ok(rows) => {
            return Ok((
                StatusCode::CREATED,
                Json(json!({ "ok": true, "rows": rows })),
            )
                .into_response())
        }
        Err(e) => e,
    };

    // The resume_* columns were added later than the rest of the table; a
    // store running the older schema rejects them. Retry once without them.
    if is_unknown_column_error(&first) && has_resume_fields(&record) {
        let mut stripped = record.clone();
        if let Some(obj) = stripped.as_object_mut() {
            for field in RESUME_FIELDS {
                obj.remove(*field);
            }
        }
        tracing::warn!("Insert rejected resume columns, retrying without them");
        if let Ok(rows) = state
            .store
            .insert("applications", &stripped, QueryOptions::returning())
            .await
        {
            return Ok((
                StatusCode::CREATED,
                Json(json!({ "ok": true, "rows": rows })),
            )
                .into_response());
        }
    }

    tracing::warn!("Remote insert into applications failed, queueing locally: {first}");
    let entry = state.queue.enqueue("applications", record).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": entry.id, "receivedAt": entry.received_at })),
    )
        .into_response())
}

fn has_resume_fields(record: &serde_json::Value) -> bool {
    record
        .as_object()
        .is_some_and(|obj| RESUME_FIELDS.iter().any(|f| obj.contains_key(*f)))
}

async fn upload_resume(state: &SharedState, file: &UploadedFile) -> Result<String, AppError> {
    let safe_name: String = file
        .filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let path = format!("{}_{safe_name}", Utc::now().timestamp_millis());

    state
        .blobs
        .upload(RESUME_BUCKET, &path, file.bytes.clone(), &file.content_type)
        .await
}
