use crate::error::EmbedError;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Maps text into one embedding space. Calls block the current thread.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

pub trait ImageEmbedder: Send + Sync {
    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbedError>;
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let dot: f64 = left
        .iter()
        .zip(right)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum();
    let norm_left = left.iter().map(|a| f64::from(*a).powi(2)).sum::<f64>().sqrt();
    let norm_right = right.iter().map(|b| f64::from(*b).powi(2)).sum::<f64>().sqrt();

    if norm_left == 0.0 || norm_right == 0.0 {
        return 0.0;
    }

    dot / (norm_left * norm_right)
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return vector;
        }

        // Pad so two-letter labels such as "CV" still produce trigrams.
        let padded = format!(" {} ", trimmed.to_lowercase());
        let chars: Vec<char> = padded.chars().collect();

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.vectorize(text))
    }
}

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl EndpointConfig {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
struct TextEmbedRequest<'a> {
    inputs: &'a [String],
}

#[derive(Debug, Serialize)]
struct ImageEmbedRequest {
    image_base64: String,
    filename: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbedResponse {
    Batch(Vec<Vec<f32>>),
    Single(Vec<f32>),
    Wrapped { embeddings: Vec<Vec<f32>> },
    WrappedOne { embedding: Vec<f32> },
}

impl EmbedResponse {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            Self::Batch(vectors) | Self::Wrapped { embeddings: vectors } => vectors,
            Self::Single(vector) | Self::WrappedOne { embedding: vector } => vec![vector],
        }
    }
}

/// Text embedding served by an HTTP model server that accepts
/// `{"inputs": [...]}` and answers with one vector per input.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    config: EndpointConfig,
}

impl HttpEmbedder {
    pub fn new(config: EndpointConfig) -> Self {
        Self { config }
    }

    fn post_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut request = Client::new()
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&TextEmbedRequest { inputs: texts });

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(EmbedError::Status {
                endpoint: self.config.endpoint.clone(),
                status: response.status().to_string(),
            });
        }

        let vectors = response.json::<EmbedResponse>()?.into_vectors();
        if vectors.len() != texts.len() {
            return Err(EmbedError::Response(format!(
                "{} vectors returned for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        Ok(vectors)
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::Response("empty embedding batch".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        run_blocking(|| self.post_blocking(texts))
    }
}

/// Image embedding served over HTTP; the request carries the base64 file bytes.
#[derive(Debug, Clone)]
pub struct HttpImageEmbedder {
    config: EndpointConfig,
}

impl HttpImageEmbedder {
    pub fn new(config: EndpointConfig) -> Self {
        Self { config }
    }

    fn post_blocking(&self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        let bytes = std::fs::read(path)?;
        let payload = ImageEmbedRequest {
            image_base64: STANDARD.encode(bytes),
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
        };

        let mut request = Client::new()
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(EmbedError::Status {
                endpoint: self.config.endpoint.clone(),
                status: response.status().to_string(),
            });
        }

        response
            .json::<EmbedResponse>()?
            .into_vectors()
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Response(format!("no vector for {}", path.display())))
    }
}

impl ImageEmbedder for HttpImageEmbedder {
    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        run_blocking(|| self.post_blocking(path))
    }
}

// reqwest's blocking client must not run directly on an async worker thread.
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    use tokio::runtime::{Handle, RuntimeFlavor};

    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}
