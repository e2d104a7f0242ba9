//! JSON-document store in a data directory.
//!
//! Layout:
//!   <data_dir>/records.json   array of canonical records
//!   <data_dir>/history.json   array of search results, newest first
//!
//! Writes go to a sibling temp file and are renamed into place. A missing
//! file reads as empty; an unreadable or corrupt one is a storage error so
//! a bad file is never silently overwritten.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use litharvest_common::{LitharvestError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{CanonicalRecord, SearchResult};
use crate::repository::{merge_records, push_history, RecordStore};

const RECORDS_FILE: &str = "records.json";
const HISTORY_FILE: &str = "history.json";

fn storage_err(path: &Path, e: impl std::fmt::Display) -> LitharvestError {
    LitharvestError::Storage(format!("{}: {e}", path.display()))
}

pub struct JsonFileRepository {
    dir: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileRepository {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_err(&dir, e))?;
        info!(dir = %dir.display(), "opened record store");
        Ok(Self { dir, write_lock: Mutex::new(()) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    async fn read_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| storage_err(path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(storage_err(path, e)),
        }
    }

    async fn write_list<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
        let body = serde_json::to_vec_pretty(items)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(|e| storage_err(&tmp, e))?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| storage_err(path, e))?;
        debug!(path = %path.display(), count = items.len(), "wrote store file");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileRepository {
    async fn save_records(&self, records: &[CanonicalRecord]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let path = self.records_path();
        let mut all: Vec<CanonicalRecord> = Self::read_list(&path).await?;
        let added = merge_records(&mut all, records);
        if added > 0 {
            Self::write_list(&path, &all).await?;
        }
        Ok(added)
    }

    async fn load_all_records(&self) -> Result<Vec<CanonicalRecord>> {
        Self::read_list(&self.records_path()).await
    }

    async fn clear_all(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.records_path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(&path, e)),
        }
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<CanonicalRecord>> {
        Ok(self
            .load_all_records()
            .await?
            .into_iter()
            .find(|r| r.id == id))
    }

    async fn delete_record(&self, id: Uuid) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let path = self.records_path();
        let mut all: Vec<CanonicalRecord> = Self::read_list(&path).await?;
        let before = all.len();
        all.retain(|r| r.id != id);
        if all.len() == before {
            return Ok(false);
        }
        Self::write_list(&path, &all).await?;
        Ok(true)
    }

    async fn append_search_history(&self, result: &SearchResult) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.history_path();
        let mut history: Vec<SearchResult> = Self::read_list(&path).await?;
        push_history(&mut history, result.clone());
        Self::write_list(&path, &history).await
    }

    async fn search_history(&self) -> Result<Vec<SearchResult>> {
        Self::read_list(&self.history_path()).await
    }
}
