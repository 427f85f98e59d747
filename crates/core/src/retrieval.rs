use crate::error::SearchError;
use crate::images::ImageLibrary;
use crate::ingest::PaperLibrary;
use crate::models::{
    ImageHit, ImageMetadata, PaperHit, PaperMetadata, PresentationMode, SearchOptions,
    SearchOutcome,
};
use crate::store::Candidate;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

const SNIPPET_CHARS: usize = 150;

#[derive(Debug, Clone)]
pub struct Survivor {
    pub candidate: Candidate,
    pub similarity: f64,
}

/// Converts distances to similarities and keeps candidates with
/// `similarity >= threshold`, preserving the store's order.
pub fn filter_by_threshold(candidates: Vec<Candidate>, threshold: f64) -> Vec<Survivor> {
    candidates
        .into_iter()
        .map(|candidate| Survivor {
            similarity: candidate.similarity(),
            candidate,
        })
        .filter(|survivor| survivor.similarity >= threshold)
        .collect()
}

pub fn distinct_paths(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

fn metadata<T: DeserializeOwned>(candidate: &Candidate) -> Result<T, SearchError> {
    serde_json::from_value(candidate.metadata.clone()).map_err(|source| SearchError::Metadata {
        id: candidate.id.clone(),
        source,
    })
}

fn snippet(text: &str) -> String {
    text.chars()
        .take(SNIPPET_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Shared front half of every search: ranked candidates, then threshold.
/// `Err` carries the terminal outcome when nothing is left to present.
fn survivors<H>(
    candidates: Vec<Candidate>,
    threshold: f64,
) -> Result<Vec<Survivor>, SearchOutcome<H>> {
    if candidates.is_empty() {
        return Err(SearchOutcome::NoCandidates);
    }

    let survivors = filter_by_threshold(candidates, threshold);
    if survivors.is_empty() {
        return Err(SearchOutcome::BelowThreshold { threshold });
    }

    Ok(survivors)
}

impl PaperLibrary {
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchOutcome<PaperHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let query_vector = self.embedder.embed(query)?;
        let candidates = self.collection.query(&query_vector, options.top_k).await?;
        info!(query, candidates = candidates.len(), threshold = options.threshold, "paper search");

        let survivors = match survivors(candidates, options.threshold) {
            Ok(survivors) => survivors,
            Err(outcome) => return Ok(outcome),
        };

        let mut hits = Vec::with_capacity(survivors.len());
        for (index, survivor) in survivors.into_iter().enumerate() {
            let meta: PaperMetadata = metadata(&survivor.candidate)?;
            hits.push(PaperHit {
                rank: index + 1,
                similarity: survivor.similarity,
                record_id: survivor.candidate.id,
                filename: meta.filename,
                page: meta.page,
                category: meta.category,
                path: PathBuf::from(meta.path),
                snippet: snippet(survivor.candidate.document.as_deref().unwrap_or_default()),
            });
        }

        Ok(match options.mode {
            PresentationMode::PathList => {
                SearchOutcome::Paths(distinct_paths(hits.into_iter().map(|hit| hit.path)))
            }
            PresentationMode::Detailed => SearchOutcome::Hits(hits),
        })
    }
}

impl ImageLibrary {
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchOutcome<ImageHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let query_vector = self.text_encoder.embed(query)?;
        let candidates = self.collection.query(&query_vector, options.top_k).await?;
        info!(query, candidates = candidates.len(), threshold = options.threshold, "image search");

        let survivors = match survivors(candidates, options.threshold) {
            Ok(survivors) => survivors,
            Err(outcome) => return Ok(outcome),
        };

        let mut hits = Vec::with_capacity(survivors.len());
        for (index, survivor) in survivors.into_iter().enumerate() {
            let meta: ImageMetadata = metadata(&survivor.candidate)?;
            hits.push(ImageHit {
                rank: index + 1,
                similarity: survivor.similarity,
                filename: meta.filename,
                path: PathBuf::from(meta.path),
            });
        }

        Ok(match options.mode {
            PresentationMode::PathList => {
                SearchOutcome::Paths(hits.into_iter().map(|hit| hit.path).collect())
            }
            PresentationMode::Detailed => SearchOutcome::Hits(hits),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{Embedder, ImageEmbedder};
    use crate::error::EmbedError;
    use crate::extractor::{LopdfExtractor, PdfExtractor};
    use crate::models::IngestionOptions;
    use crate::store::StoredRecord;
    use crate::traits::VectorCollection;
    use crate::StoreError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    /// Returns a fixed candidate list regardless of the query vector.
    struct CannedStore(Vec<Candidate>);

    #[async_trait]
    impl VectorCollection for CannedStore {
        fn name(&self) -> &str {
            "canned"
        }

        async fn upsert(&self, _records: &[StoredRecord]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn insert(&self, _records: &[StoredRecord]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn ids(&self) -> Result<HashSet<String>, StoreError> {
            Ok(self.0.iter().map(|candidate| candidate.id.clone()).collect())
        }

        async fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<Candidate>, StoreError> {
            Ok(self.0.iter().take(top_k).cloned().collect())
        }
    }

    struct UnitEmbedder;

    impl Embedder for UnitEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![1.0])
        }
    }

    impl ImageEmbedder for UnitEmbedder {
        fn embed_image(&self, _path: &Path) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![1.0])
        }
    }

    fn chunk_candidate(id: &str, distance: f64, path: &str, page: u32) -> Candidate {
        Candidate {
            id: id.to_string(),
            distance,
            document: Some(format!("line one\nline two of {id}")),
            metadata: json!({
                "path": path,
                "filename": Path::new(path).file_name().and_then(|n| n.to_str()),
                "category": "NLP",
                "page": page,
                "chunk_id": 0,
            }),
        }
    }

    fn papers(candidates: Vec<Candidate>) -> PaperLibrary {
        let extractor: Arc<dyn PdfExtractor> = Arc::new(LopdfExtractor);
        PaperLibrary::new(
            Arc::new(UnitEmbedder),
            extractor,
            Arc::new(CannedStore(candidates)),
            "/tmp/papers",
            IngestionOptions::default(),
        )
    }

    fn images(candidates: Vec<Candidate>) -> ImageLibrary {
        ImageLibrary::new(
            Arc::new(UnitEmbedder),
            Arc::new(UnitEmbedder),
            Arc::new(CannedStore(candidates)),
            "/tmp/images",
        )
    }

    #[test]
    fn threshold_is_inclusive() {
        let candidates = vec![
            chunk_candidate("exact", 0.5, "/p/a.pdf", 1),
            chunk_candidate("below", 0.5000001, "/p/a.pdf", 1),
        ];
        let kept = filter_by_threshold(candidates, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].candidate.id, "exact");
        assert_eq!(kept[0].similarity, 0.5);
    }

    #[test]
    fn similarity_is_one_minus_distance() {
        for distance in [0.0, 0.25, 1.0, 1.5, 2.0] {
            let candidate = chunk_candidate("c", distance, "/p/a.pdf", 1);
            assert_eq!(candidate.similarity(), 1.0 - distance);
        }
    }

    #[tokio::test]
    async fn detailed_results_keep_store_order() -> Result<(), SearchError> {
        let lib = papers(vec![
            chunk_candidate("a", 0.4, "/p/NLP/a.pdf", 1),
            chunk_candidate("b", 0.55, "/p/NLP/b.pdf", 2),
            chunk_candidate("c", 0.7, "/p/NLP/c.pdf", 3),
            chunk_candidate("d", 0.9, "/p/NLP/d.pdf", 4),
        ]);

        let outcome = lib.search("attention", &SearchOptions::papers()).await?;
        let SearchOutcome::Hits(hits) = outcome else {
            panic!("expected detailed hits");
        };

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record_id, "a");
        assert_eq!(hits[0].rank, 1);
        assert!((hits[0].similarity - 0.6).abs() < 1e-12);
        assert_eq!(hits[1].record_id, "b");
        assert_eq!(hits[1].page, 2);
        assert_eq!(hits[0].snippet, "line one line two of a");
        Ok(())
    }

    #[tokio::test]
    async fn path_list_deduplicates_chunks_of_one_file() -> Result<(), SearchError> {
        let lib = papers(vec![
            chunk_candidate("a0", 0.1, "/p/NLP/a.pdf", 1),
            chunk_candidate("b0", 0.2, "/p/NLP/b.pdf", 1),
            chunk_candidate("a1", 0.3, "/p/NLP/a.pdf", 2),
        ]);
        let options = SearchOptions::papers().with_mode(PresentationMode::PathList);

        let outcome = lib.search("attention", &options).await?;

        assert_eq!(
            outcome,
            SearchOutcome::Paths(vec![
                PathBuf::from("/p/NLP/a.pdf"),
                PathBuf::from("/p/NLP/b.pdf")
            ])
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_store_and_low_scores_are_not_errors() -> Result<(), SearchError> {
        let empty = papers(Vec::new());
        assert_eq!(
            empty.search("anything", &SearchOptions::papers()).await?,
            SearchOutcome::NoCandidates
        );

        let weak = papers(vec![chunk_candidate("a", 0.9, "/p/a.pdf", 1)]);
        assert_eq!(
            weak.search("anything", &SearchOptions::papers()).await?,
            SearchOutcome::BelowThreshold { threshold: 0.4 }
        );
        Ok(())
    }

    #[tokio::test]
    async fn top_k_limits_candidates_before_filtering() -> Result<(), SearchError> {
        let lib = papers(vec![
            chunk_candidate("a", 0.1, "/p/a.pdf", 1),
            chunk_candidate("b", 0.1, "/p/b.pdf", 1),
            chunk_candidate("c", 0.1, "/p/c.pdf", 1),
        ]);
        let options = SearchOptions::papers().with_top_k(2);
        let SearchOutcome::Hits(hits) = lib.search("q", &options).await? else {
            panic!("expected hits");
        };
        assert_eq!(hits.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let lib = papers(Vec::new());
        assert!(matches!(
            lib.search("   ", &SearchOptions::papers()).await,
            Err(SearchError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn image_path_list_has_one_entry_per_survivor() -> Result<(), SearchError> {
        let hit = |id: &str, distance: f64| Candidate {
            id: id.to_string(),
            distance,
            document: None,
            metadata: json!({ "path": format!("/data/images/{id}"), "filename": id }),
        };
        let lib = images(vec![hit("cat.png", 0.7), hit("dog.png", 0.74), hit("car.png", 0.9)]);

        let detailed = lib.search("a cat", &SearchOptions::images()).await?;
        let SearchOutcome::Hits(hits) = detailed else {
            panic!("expected hits");
        };
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].filename, "dog.png");

        let options = SearchOptions::images().with_mode(PresentationMode::PathList);
        assert_eq!(
            lib.search("a cat", &options).await?,
            SearchOutcome::Paths(vec![
                PathBuf::from("/data/images/cat.png"),
                PathBuf::from("/data/images/dog.png")
            ])
        );
        Ok(())
    }

    #[tokio::test]
    async fn malformed_metadata_is_reported() {
        let lib = images(vec![Candidate {
            id: "odd.png".to_string(),
            distance: 0.0,
            document: None,
            metadata: json!({ "unexpected": true }),
        }]);
        assert!(matches!(
            lib.search("x", &SearchOptions::images()).await,
            Err(SearchError::Metadata { .. })
        ));
    }
}
