//! Snapshot persistence
//!
//! `JsonlSnapshotStore` appends one JSON line per snapshot to
//! `<dir>/<SYMBOL>_data.jsonl`. Lines carry the series `sequence`, so history
//! can be re-ordered if two dispatcher workers raced on the same symbol.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::models::SeriesSnapshot;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn persist(&self, snapshot: &SeriesSnapshot) -> Result<(), SinkError>;
}

pub struct JsonlSnapshotStore {
    dir: PathBuf,
}

impl JsonlSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}_data.jsonl", symbol))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl SnapshotStore for JsonlSnapshotStore {
    async fn persist(&self, snapshot: &SeriesSnapshot) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(snapshot)?;
        line.push(b'\n');

        fs::create_dir_all(&self.dir).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(&snapshot.symbol))
            .await?;
        // single write keeps each line whole under O_APPEND
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps persisted snapshots in memory
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    snapshots: Arc<Mutex<Vec<SeriesSnapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshots(&self) -> Vec<SeriesSnapshot> {
        self.snapshots.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn persist(&self, snapshot: &SeriesSnapshot) -> Result<(), SinkError> {
        self.snapshots.lock().await.push(snapshot.clone());
        Ok(())
    }
}
