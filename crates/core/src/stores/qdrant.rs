use crate::store::{Candidate, StoredRecord};
use crate::traits::VectorCollection;
use crate::StoreError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use url::Url;
use uuid::Uuid;

const SCROLL_PAGE: usize = 256;

/// Qdrant point ids must be integers or UUIDs, so each record id is mapped to
/// a UUIDv5 and the original id travels in the payload.
pub struct QdrantCollection {
    endpoint: String,
    collection: String,
    client: Client,
    ready: AtomicBool,
}

impl QdrantCollection {
    pub fn new(endpoint: &str, collection: impl Into<String>) -> Result<Self, StoreError> {
        let endpoint = Url::parse(endpoint)?.as_str().trim_end_matches('/').to_string();
        Ok(Self {
            endpoint,
            collection: collection.into(),
            client: Client::new(),
            ready: AtomicBool::new(false),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.endpoint, self.collection, suffix)
    }

    async fn exists(&self) -> Result<bool, StoreError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(true);
        }

        let response = self.client.get(self.url("")).send().await?;
        match response.status() {
            StatusCode::OK => {
                self.ready.store(true, Ordering::Release);
                Ok(true)
            }
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(backend_error(status)),
        }
    }

    async fn ensure_collection(&self, vector_size: usize) -> Result<(), StoreError> {
        if self.exists().await? {
            return Ok(());
        }

        let response = self
            .client
            .put(self.url(""))
            .json(&json!({
                "vectors": { "size": vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Request(format!(
                "qdrant collection setup failed with {}",
                response.status()
            )));
        }

        debug!(collection = %self.collection, vector_size, "created qdrant collection");
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn existing_points(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        let point_ids: Vec<String> = ids.iter().map(|id| point_id(id).to_string()).collect();
        let response = self
            .client
            .post(self.url("/points"))
            .json(&json!({ "ids": point_ids, "with_payload": ["record_id"], "with_vector": false }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .map(|points| points.iter().filter_map(record_id).collect())
            .unwrap_or_default())
    }

    async fn write_points(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let vector_size = first.vector.len();
        self.ensure_collection(vector_size).await?;

        let points = records
            .iter()
            .map(|record| {
                if record.vector.len() != vector_size {
                    return Err(StoreError::Request(format!(
                        "embedding dimension {} != {}",
                        record.vector.len(),
                        vector_size
                    )));
                }

                Ok(json!({
                    "id": point_id(&record.id).to_string(),
                    "vector": record.vector,
                    "payload": {
                        "record_id": record.id,
                        "document": record.document,
                        "metadata": record.metadata,
                    },
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let response = self
            .client
            .put(self.url("/points?wait=true"))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        debug!(collection = %self.collection, count = records.len(), "wrote qdrant points");
        Ok(())
    }
}

#[async_trait]
impl VectorCollection for QdrantCollection {
    fn name(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        self.write_points(records).await
    }

    async fn insert(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        if self.exists().await? {
            let ids: Vec<String> = records.iter().map(|record| record.id.clone()).collect();
            if let Some(id) = self.existing_points(&ids).await?.into_iter().next() {
                return Err(StoreError::Duplicate {
                    collection: self.collection.clone(),
                    id,
                });
            }
        }

        self.write_points(records).await
    }

    async fn ids(&self) -> Result<HashSet<String>, StoreError> {
        let mut ids = HashSet::new();
        if !self.exists().await? {
            return Ok(ids);
        }

        let mut offset = Value::Null;
        loop {
            let response = self
                .client
                .post(self.url("/points/scroll"))
                .json(&json!({
                    "limit": SCROLL_PAGE,
                    "offset": offset,
                    "with_payload": ["record_id"],
                    "with_vector": false,
                }))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(backend_error(response.status()));
            }

            let parsed: Value = response.json().await?;
            let points = parsed
                .pointer("/result/points")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            ids.extend(points.iter().filter_map(record_id));

            offset = parsed
                .pointer("/result/next_page_offset")
                .cloned()
                .unwrap_or(Value::Null);
            if offset.is_null() {
                break;
            }
        }

        Ok(ids)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Candidate>, StoreError> {
        if top_k == 0 || !self.exists().await? {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.url("/points/search"))
            .json(&json!({
                "vector": vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(hits.iter().filter_map(parse_hit).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        if !self.exists().await? {
            return Ok(0);
        }

        let response = self
            .client
            .post(self.url("/points/count"))
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: "count missing from response".to_string(),
            })
    }
}

fn point_id(record_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes())
}

fn record_id(point: &Value) -> Option<String> {
    point
        .pointer("/payload/record_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

// Qdrant reports cosine similarity as the score; callers expect a distance.
fn parse_hit(hit: &Value) -> Option<Candidate> {
    let id = record_id(hit)?;
    let score = hit.pointer("/score").and_then(Value::as_f64)?;
    Some(Candidate {
        id,
        distance: 1.0 - score,
        document: hit
            .pointer("/payload/document")
            .and_then(Value::as_str)
            .map(str::to_string),
        metadata: hit
            .pointer("/payload/metadata")
            .cloned()
            .unwrap_or(Value::Null),
    })
}

fn backend_error(status: StatusCode) -> StoreError {
    StoreError::BackendResponse {
        backend: "qdrant".to_string(),
        details: status.to_string(),
    }
}
