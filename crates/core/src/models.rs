use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const PAPERS_COLLECTION: &str = "papers";
pub const IMAGES_COLLECTION: &str = "images";

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

/// A window of one page's text. Page 0 marks the filename-only fallback used
/// when extraction fails for the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub path: String,
    pub filename: String,
    pub category: String,
    pub page: u32,
    pub chunk_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub path: String,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub text: String,
    pub metadata: PaperMetadata,
}

#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: String,
    pub metadata: ImageMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet(Vec<String>);

impl CategorySet {
    pub fn new(labels: Vec<String>) -> Result<Self, IngestError> {
        let labels = labels
            .into_iter()
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect::<Vec<_>>();

        if labels.is_empty() {
            return Err(IngestError::InvalidArgument(
                "at least one topic is required".to_string(),
            ));
        }

        Ok(Self(labels))
    }

    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        Self::new(raw.split(',').map(str::to_string).collect())
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub classification_sample_chunks: usize,
    pub classification_prefix_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            classification_sample_chunks: 3,
            classification_prefix_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationMode {
    Detailed,
    PathList,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Candidates requested from the store before threshold filtering.
    pub top_k: usize,
    pub threshold: f64,
    pub mode: PresentationMode,
}

impl SearchOptions {
    pub fn papers() -> Self {
        Self {
            top_k: 5,
            threshold: 0.4,
            mode: PresentationMode::Detailed,
        }
    }

    pub fn images() -> Self {
        Self {
            top_k: 3,
            threshold: 0.25,
            mode: PresentationMode::Detailed,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_mode(mut self, mode: PresentationMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperHit {
    pub rank: usize,
    pub similarity: f64,
    pub record_id: String,
    pub filename: String,
    pub page: u32,
    pub category: String,
    pub path: PathBuf,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageHit {
    pub rank: usize,
    pub similarity: f64,
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome<H> {
    NoCandidates,
    BelowThreshold { threshold: f64 },
    Hits(Vec<H>),
    Paths(Vec<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub filename: String,
    pub category: String,
    pub archived_path: PathBuf,
    pub record_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub ingested: Vec<IngestionReport>,
    pub failed: Vec<FailedFile>,
}

#[derive(Debug, Default)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: Vec<FailedFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_set_trims_and_drops_blank_entries() {
        let set = CategorySet::parse(" CV, NLP ,,RL ").expect("topics should parse");
        assert_eq!(set.labels(), &["CV", "NLP", "RL"]);
    }

    #[test]
    fn category_set_rejects_empty_list() {
        assert!(matches!(
            CategorySet::parse(" , "),
            Err(IngestError::InvalidArgument(_))
        ));
    }

    #[test]
    fn search_defaults_follow_collection() {
        assert_eq!(SearchOptions::papers().threshold, 0.4);
        assert_eq!(SearchOptions::images().threshold, 0.25);
        assert_eq!(SearchOptions::images().top_k, 3);
    }
}
