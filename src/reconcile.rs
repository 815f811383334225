use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::queue::{LocalQueue, QueueEntry};
use crate::store::{is_unknown_column_error, QueryOptions, StoreClient};

/// Outcome of one table's reconciliation pass. Produced fresh on every run,
/// never persisted.
#[derive(Debug, Serialize)]
pub struct TableReport {
    pub table: String,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<Value>,
}

/// A column the remote schema renamed at some point. Records queued before
/// the rename still carry the old field name; replay tries the candidates in
/// order until one is accepted.
///
/// Kept as one table of strategies so it can be deleted outright once the
/// remote schema stabilizes and the queue drains.
struct FieldRename {
    table: &'static str,
    from: &'static str,
    candidates: &'static [&'static str],
}

const FIELD_RENAMES: &[FieldRename] = &[FieldRename {
    table: "quotes",
    from: "pincode",
    candidates: &["postal_code", "postcode", "zip", "zip_code", "zipcode", "pin"],
}];

fn rename_for(table: &str) -> Option<&'static FieldRename> {
    FIELD_RENAMES.iter().find(|r| r.table == table)
}

/// Replay every queued table against the remote store.
///
/// Each table's read + rewrite happens under that table's queue lock, so an
/// enqueue arriving mid-pass can never be dropped by the rewrite. Failures
/// are isolated per entry; one rejected record never aborts the table.
pub async fn run_all(store: &StoreClient, queue: &LocalQueue) -> Vec<TableReport> {
    let mut reports = Vec::new();

    for table in queue.tables().await {
        let report = reconcile_table(store, queue, &table).await;
        tracing::info!(
            "Reconciled {}: {} succeeded, {} still queued",
            report.table,
            report.success,
            report.failed
        );
        reports.push(report);
    }

    reports
}

async fn reconcile_table(store: &StoreClient, queue: &LocalQueue, table: &str) -> TableReport {
    let guard = queue.lock_table(table).await;
    let entries = guard.entries().await;

    if entries.is_empty() {
        return TableReport {
            table: table.to_string(),
            success: 0,
            failed: 0,
            errors: Vec::new(),
        };
    }

    let mut success = 0;
    let mut still_failed: Vec<QueueEntry> = Vec::new();
    let mut errors = Vec::new();

    for entry in entries {
        match replay_entry(store, table, &entry).await {
            Ok(()) => success += 1,
            Err(e) => {
                errors.push(json!({ "id": entry.id, "error": e.to_string() }));
                still_failed.push(entry);
            }
        }
    }

    // Zero failures deletes the file entirely; otherwise only the failed
    // entries survive, in their original relative order.
    if let Err(e) = guard.replace(&still_failed).await {
        tracing::error!("Failed to rewrite queue for {table}: {e}");
    }

    TableReport {
        table: table.to_string(),
        success,
        failed: still_failed.len(),
        errors,
    }
}

async fn replay_entry(store: &StoreClient, table: &str, entry: &QueueEntry) -> Result<(), AppError> {
    let opts = QueryOptions {
        return_representation: true,
        idempotency_key: Some(idempotency_key(entry)),
        ..QueryOptions::default()
    };

    let first = match store.insert(table, &entry.payload, opts.clone()).await {
        Ok(_) => return Ok(()),
        Err(e) => e,
    };

    // Bounded schema adaptation: only for a known renamed column, and only
    // when the store reported an unknown-column rejection.
    let Some(rename) = rename_for(table) else {
        return Err(first);
    };
    let Some(old_value) = entry.payload.get(rename.from).cloned() else {
        return Err(first);
    };
    if !is_unknown_column_error(&first) {
        return Err(first);
    }

    let mut last = first;
    for candidate in rename.candidates {
        let mut renamed = entry.payload.clone();
        if let Some(obj) = renamed.as_object_mut() {
            obj.remove(rename.from);
            obj.insert((*candidate).to_string(), old_value.clone());
        }
        match store.insert(table, &renamed, opts.clone()).await {
            Ok(_) => {
                tracing::info!("Replayed {table} entry {} as {candidate}", entry.id);
                return Ok(());
            }
            Err(e) => last = e,
        }
    }

    Err(last)
}

/// Deterministic key for one queue entry, so a store with upsert-by-key
/// semantics can deduplicate a replay that raced a crash.
fn idempotency_key(entry: &QueueEntry) -> String {
    let digest = Sha256::digest(entry.id.as_bytes());
    hex::encode(digest)
}
