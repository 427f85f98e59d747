use crate::chunking::{chunk_pages, ChunkingConfig};
use crate::classify::Classifier;
use crate::embeddings::Embedder;
use crate::error::{EmbedError, IngestError};
use crate::extractor::PdfExtractor;
use crate::layout::{category_dir_name, same_file};
use crate::models::{
    BatchReport, CategorySet, Chunk, DocumentRecord, FailedFile, IngestionOptions,
    IngestionReport, PaperMetadata,
};
use crate::store::StoredRecord;
use crate::traits::VectorCollection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// The paper side of the library: archive directory, chunk collection and the
/// services used to fill it. Built once and shared by every command.
pub struct PaperLibrary {
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) extractor: Arc<dyn PdfExtractor>,
    pub(crate) collection: Arc<dyn VectorCollection>,
    pub(crate) papers_dir: PathBuf,
    pub(crate) options: IngestionOptions,
}

impl PaperLibrary {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn PdfExtractor>,
        collection: Arc<dyn VectorCollection>,
        papers_dir: impl Into<PathBuf>,
        options: IngestionOptions,
    ) -> Self {
        Self {
            embedder,
            extractor,
            collection,
            papers_dir: papers_dir.into(),
            options,
        }
    }

    pub fn collection(&self) -> &dyn VectorCollection {
        self.collection.as_ref()
    }

    /// Extracts, classifies, archives and upserts one PDF.
    ///
    /// Record ids depend only on the file name and chunk index, so ingesting
    /// the same file again overwrites its records instead of adding new ones.
    pub async fn add_paper(
        &self,
        path: &Path,
        categories: &CategorySet,
    ) -> Result<IngestionReport, IngestError> {
        if !path.is_file() {
            return Err(IngestError::NotFound(path.to_path_buf()));
        }

        let config = ChunkingConfig::from(&self.options);
        config.validate()?;

        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
            .to_string();

        info!(file = %filename, "processing paper");

        let chunks = match self.extractor.extract_pages(path) {
            Ok(pages) => chunk_pages(&pages, config)?,
            Err(error) => {
                warn!(file = %filename, %error, "text extraction failed, indexing file name only");
                vec![Chunk {
                    text: filename.clone(),
                    page: 0,
                }]
            }
        };

        if chunks.is_empty() {
            return Err(IngestError::EmptyContent(format!(
                "no text could be extracted from {filename}"
            )));
        }

        let usable: Vec<(usize, &Chunk)> = chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| !chunk.text.trim().is_empty())
            .collect();

        if usable.is_empty() {
            return Err(IngestError::EmptyContent(format!(
                "every chunk of {filename} is blank"
            )));
        }

        let sample = classification_sample(&chunks, self.options.classification_sample_chunks)
            .unwrap_or_else(|| filename.clone());
        let category = Classifier::new(
            self.embedder.as_ref(),
            self.options.classification_prefix_chars,
        )
        .classify(&sample, categories)?;
        info!(file = %filename, %category, "classified paper");

        let archived_path = self.archive(path, &category, &filename)?;
        let stored_path = archived_path.to_string_lossy().to_string();

        let documents: Vec<DocumentRecord> = usable
            .into_iter()
            .map(|(index, chunk)| DocumentRecord {
                id: record_id(&filename, index),
                text: chunk.text.clone(),
                metadata: PaperMetadata {
                    path: stored_path.clone(),
                    filename: filename.clone(),
                    category: category.clone(),
                    page: chunk.page,
                    chunk_id: index as u64,
                },
            })
            .collect();

        let texts: Vec<String> = documents.iter().map(|doc| doc.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != documents.len() {
            return Err(IngestError::Embedding(EmbedError::Response(format!(
                "embedding count {} doesn't match chunk count {}",
                vectors.len(),
                documents.len()
            ))));
        }

        let records = documents
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| {
                Ok(StoredRecord {
                    id: doc.id.clone(),
                    vector,
                    document: Some(doc.text.clone()),
                    metadata: serde_json::to_value(&doc.metadata)
                        .map_err(crate::StoreError::from)?,
                })
            })
            .collect::<Result<Vec<_>, IngestError>>()?;

        self.collection.upsert(&records).await?;
        info!(file = %filename, records = records.len(), "indexed paper chunks");

        Ok(IngestionReport {
            filename,
            category,
            archived_path,
            record_ids: documents.into_iter().map(|doc| doc.id).collect(),
        })
    }

    /// Runs [`PaperLibrary::add_paper`] for every PDF directly inside `folder`.
    /// A failing file is recorded and the batch moves on.
    pub async fn batch_organize(
        &self,
        folder: &Path,
        categories: &CategorySet,
    ) -> Result<BatchReport, IngestError> {
        if !folder.is_dir() {
            return Err(IngestError::NotFound(folder.to_path_buf()));
        }

        let files = discover_pdf_files(folder);
        info!(folder = %folder.display(), count = files.len(), "organizing pdf files");

        let mut report = BatchReport::default();
        for path in files {
            match self.add_paper(&path, categories).await {
                Ok(ingested) => report.ingested.push(ingested),
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipped pdf");
                    report.failed.push(FailedFile {
                        path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    fn archive(&self, source: &Path, category: &str, filename: &str) -> Result<PathBuf, IngestError> {
        let target_dir = self.papers_dir.join(category_dir_name(category));
        fs::create_dir_all(&target_dir)?;
        let target = target_dir.join(filename);

        if same_file(source, &target) {
            return Ok(target);
        }

        fs::copy(source, &target)?;
        info!(target = %target.display(), "archived paper");
        Ok(target)
    }
}

fn classification_sample(chunks: &[Chunk], count: usize) -> Option<String> {
    let sample = chunks
        .iter()
        .take(count)
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if sample.trim().is_empty() {
        None
    } else {
        Some(sample)
    }
}

/// `<file name with spaces and dots replaced by '_'>_part_<chunk index>`
pub fn record_id(filename: &str, chunk_index: usize) -> String {
    let safe = filename.replace([' ', '.'], "_");
    format!("{safe}_part_{chunk_index}")
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}
