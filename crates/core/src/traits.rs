use crate::store::{Candidate, StoredRecord};
use crate::StoreError;
use async_trait::async_trait;
use std::collections::HashSet;

/// A named collection of embeddings compared by cosine distance.
#[async_trait]
pub trait VectorCollection: Send + Sync {
    fn name(&self) -> &str;

    async fn upsert(&self, records: &[StoredRecord]) -> Result<(), StoreError>;

    /// Inserts records whose ids are not yet present; an existing id is an error.
    async fn insert(&self, records: &[StoredRecord]) -> Result<(), StoreError>;

    async fn ids(&self) -> Result<HashSet<String>, StoreError>;

    /// Returns up to `top_k` candidates ordered by increasing distance.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Candidate>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.ids().await?.len())
    }
}
