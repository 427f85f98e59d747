//! File-backed collection that keeps every record in memory and answers
//! queries with an exhaustive cosine scan.

use crate::embeddings::cosine_similarity;
use crate::store::{Candidate, StoredRecord};
use crate::traits::VectorCollection;
use crate::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    name: String,
    records: Vec<StoredRecord>,
}

pub struct LocalCollection {
    name: String,
    snapshot_path: Option<PathBuf>,
    records: RwLock<BTreeMap<String, StoredRecord>>,
}

impl LocalCollection {
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snapshot_path: None,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Loads `<dir>/<name>.json` if present; every mutation rewrites it.
    pub fn open(dir: &Path, name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        let snapshot_path = dir.join(format!("{name}.json"));

        let mut records = BTreeMap::new();
        if snapshot_path.exists() {
            let raw = std::fs::read(&snapshot_path)?;
            let snapshot: Snapshot = serde_json::from_slice(&raw)?;
            for record in snapshot.records {
                records.insert(record.id.clone(), record);
            }
            debug!(collection = %name, records = records.len(), "loaded local snapshot");
        }

        Ok(Self {
            name,
            snapshot_path: Some(snapshot_path),
            records: RwLock::new(records),
        })
    }

    async fn persist(&self, records: &BTreeMap<String, StoredRecord>) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            name: self.name.clone(),
            records: records.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorCollection for LocalCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        let mut store = self.records.write().await;
        let mut next = store.clone();
        for record in records {
            next.insert(record.id.clone(), record.clone());
        }
        // memory only changes once the snapshot is on disk
        self.persist(&next).await?;
        *store = next;
        debug!(collection = %self.name, count = records.len(), "upserted records");
        Ok(())
    }

    async fn insert(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        let mut store = self.records.write().await;
        let mut incoming = HashSet::new();
        for record in records {
            if store.contains_key(&record.id) || !incoming.insert(record.id.as_str()) {
                return Err(StoreError::Duplicate {
                    collection: self.name.clone(),
                    id: record.id.clone(),
                });
            }
        }

        let mut next = store.clone();
        for record in records {
            next.insert(record.id.clone(), record.clone());
        }
        self.persist(&next).await?;
        *store = next;
        debug!(collection = %self.name, count = records.len(), "inserted records");
        Ok(())
    }

    async fn ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.records.read().await.keys().cloned().collect())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Candidate>, StoreError> {
        let store = self.records.read().await;

        let mut candidates: Vec<Candidate> = store
            .values()
            .map(|record| Candidate {
                id: record.id.clone(),
                distance: 1.0 - cosine_similarity(vector, &record.vector),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
            })
            .collect();

        // BTreeMap iteration is id-ordered and the sort is stable, so ties stay id-ordered.
        candidates.sort_by(|left, right| left.distance.total_cmp(&right.distance));
        candidates.truncate(top_k);
        Ok(candidates)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}
