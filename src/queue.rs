use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::AppError;

/// One durably buffered submission awaiting remote delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub payload: Value,
}

/// Append-only per-table record buffer, persisted as one JSON-array file per
/// table. Absence of a file is an empty queue; corrupt content is treated as
/// empty too, since queued data is best-effort recovery, not a system of
/// record.
///
/// All read-modify-write operations on one table are serialized through a
/// per-table async mutex. Reconciliation takes the same lock for its whole
/// read + rewrite pass via [`LocalQueue::lock_table`], so an enqueue can never
/// land between the read and a rewrite computed from it.
pub struct LocalQueue {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LocalQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: DashMap::new(),
        }
    }

    fn table_lock(&self, table: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn file_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.json"))
    }

    /// Take the table's lock for a multi-step operation. Held until the
    /// returned guard is dropped; concurrent `enqueue` calls on the same
    /// table block until then.
    pub async fn lock_table(&self, table: &str) -> TableGuard<'_> {
        let guard = self.table_lock(table).lock_owned().await;
        TableGuard {
            queue: self,
            table: table.to_string(),
            _guard: guard,
        }
    }

    /// Append a record to the table's queue, assigning an id and timestamp.
    pub async fn enqueue(&self, table: &str, payload: Value) -> Result<QueueEntry, AppError> {
        let lock = self.table_lock(table);
        let _guard = lock.lock().await;

        let mut entries = self.read_entries(table).await;
        let entry = QueueEntry {
            id: Uuid::now_v7(),
            received_at: Utc::now(),
            payload,
        };
        entries.push(entry.clone());
        self.write_entries(table, &entries).await?;
        Ok(entry)
    }

    /// All entries for a table in insertion order. Missing table yields an
    /// empty vec, not an error.
    pub async fn drain_all(&self, table: &str) -> Vec<QueueEntry> {
        let lock = self.table_lock(table);
        let _guard = lock.lock().await;
        self.read_entries(table).await
    }

    /// Table names with a persisted queue file.
    pub async fn tables(&self) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(mut dir) = tokio::fs::read_dir(&self.dir).await else {
            return names;
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(table) = name.strip_suffix(".json") {
                names.push(table.to_string());
            }
        }
        names.sort();
        names
    }

    async fn read_entries(&self, table: &str) -> Vec<QueueEntry> {
        let raw = match tokio::fs::read_to_string(self.file_path(table)).await {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    /// Rewrite the table's file with exactly `entries`. Writes go to a temp
    /// file first and are renamed into place, so a failed write never
    /// truncates existing entries. An empty set deletes the file.
    async fn write_entries(&self, table: &str, entries: &[QueueEntry]) -> Result<(), AppError> {
        let path = self.file_path(table);

        if entries.is_empty() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(AppError::LocalPersistence(e.to_string())),
            }
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::LocalPersistence(e.to_string()))?;

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| AppError::LocalPersistence(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::LocalPersistence(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::LocalPersistence(e.to_string()))?;
        Ok(())
    }
}

/// Exclusive access to one table's queue for the guard's lifetime.
pub struct TableGuard<'a> {
    queue: &'a LocalQueue,
    table: String,
    _guard: OwnedMutexGuard<()>,
}

impl TableGuard<'_> {
    pub async fn entries(&self) -> Vec<QueueEntry> {
        self.queue.read_entries(&self.table).await
    }

    pub async fn replace(&self, entries: &[QueueEntry]) -> Result<(), AppError> {
        self.queue.write_entries(&self.table, entries).await
    }
}
