use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::IngestError;
use crate::models::CategorySet;

pub struct Classifier<'a> {
    embedder: &'a dyn Embedder,
    prefix_chars: usize,
}

impl<'a> Classifier<'a> {
    pub fn new(embedder: &'a dyn Embedder, prefix_chars: usize) -> Self {
        Self {
            embedder,
            prefix_chars,
        }
    }

    pub fn classify(&self, sample: &str, categories: &CategorySet) -> Result<String, IngestError> {
        let prefix: String = sample.chars().take(self.prefix_chars).collect();
        let sample_vector = self.embedder.embed(&prefix)?;
        let label_vectors = self.embedder.embed_batch(categories.labels())?;

        let mut best: Option<(usize, f64)> = None;
        for (index, label_vector) in label_vectors.iter().enumerate() {
            let score = cosine_similarity(&sample_vector, label_vector);
            let score = if score.is_finite() { score } else { f64::NEG_INFINITY };
            // strict comparison keeps the first maximal label on ties
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }

        best.and_then(|(index, _)| categories.labels().get(index).cloned())
            .ok_or_else(|| IngestError::InvalidArgument("no topic could be scored".to_string()))
    }
}
