use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub document: Option<String>,
    pub metadata: Value,
}

/// A nearest-neighbour hit. `distance` is a cosine distance in `[0, 2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub distance: f64,
    pub document: Option<String>,
    pub metadata: Value,
}

impl Candidate {
    pub fn similarity(&self) -> f64 {
        distance_to_similarity(self.distance)
    }
}

pub fn distance_to_similarity(distance: f64) -> f64 {
    1.0 - distance
}
