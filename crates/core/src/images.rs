use crate::embeddings::{Embedder, ImageEmbedder};
use crate::error::IndexError;
use crate::layout::same_file;
use crate::models::{FailedFile, ImageMetadata, ImageRecord, IndexReport, IMAGE_EXTENSIONS};
use crate::store::StoredRecord;
use crate::traits::VectorCollection;
use image::GenericImageView;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// The image side of the library: a flat managed image directory plus a
/// collection in the cross-modal embedding space.
pub struct ImageLibrary {
    pub(crate) text_encoder: Arc<dyn Embedder>,
    pub(crate) image_encoder: Arc<dyn ImageEmbedder>,
    pub(crate) collection: Arc<dyn VectorCollection>,
    pub(crate) images_dir: PathBuf,
}

impl ImageLibrary {
    pub fn new(
        text_encoder: Arc<dyn Embedder>,
        image_encoder: Arc<dyn ImageEmbedder>,
        collection: Arc<dyn VectorCollection>,
        images_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            text_encoder,
            image_encoder,
            collection,
            images_dir: images_dir.into(),
        }
    }

    pub fn collection(&self) -> &dyn VectorCollection {
        self.collection.as_ref()
    }

    /// Indexes every image under `source` (default: the managed directory).
    ///
    /// Images are keyed by file name. A name already in the collection, or
    /// seen earlier in this walk, is skipped rather than overwritten. Files
    /// from an external source are copied into the managed directory first.
    pub async fn index_images(&self, source: Option<&Path>) -> Result<IndexReport, IndexError> {
        let scan_dir = source.unwrap_or(self.images_dir.as_path());
        if !scan_dir.is_dir() {
            return Err(IndexError::NotFound(scan_dir.to_path_buf()));
        }
        let copy_into_store = source.is_some_and(|dir| !same_file(dir, &self.images_dir));
        if copy_into_store {
            fs::create_dir_all(&self.images_dir)?;
        }

        let mut known = self.collection.ids().await?;
        let mut report = IndexReport::default();

        for path in discover_images(scan_dir) {
            let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let filename = filename.to_string();

            if known.contains(&filename) {
                debug!(file = %filename, "already indexed");
                report.skipped += 1;
                continue;
            }

            let target = self.images_dir.join(&filename);
            let stored_path = if copy_into_store && !same_file(&path, &target) {
                if let Err(error) = fs::copy(&path, &target) {
                    warn!(path = %path.display(), %error, "cannot copy image");
                    report.failed.push(FailedFile {
                        path,
                        reason: error.to_string(),
                    });
                    continue;
                }
                target
            } else {
                path.clone()
            };

            let vector = match self.embed_file(&stored_path) {
                Ok(vector) => vector,
                Err(error) => {
                    warn!(path = %stored_path.display(), %error, "cannot read image");
                    report.failed.push(FailedFile {
                        path: stored_path,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            let record = ImageRecord {
                id: filename.clone(),
                metadata: ImageMetadata {
                    path: stored_path.to_string_lossy().to_string(),
                    filename: filename.clone(),
                },
            };
            self.collection
                .insert(&[StoredRecord {
                    id: record.id.clone(),
                    vector,
                    document: None,
                    metadata: serde_json::to_value(&record.metadata)
                        .map_err(crate::StoreError::from)?,
                }])
                .await?;

            known.insert(record.id);
            report.indexed += 1;
            info!(file = %filename, "indexed image");
        }

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            failed = report.failed.len(),
            "image indexing finished"
        );
        Ok(report)
    }

    fn embed_file(&self, path: &Path) -> Result<Vec<f32>, IndexError> {
        let decoded = image::open(path).map_err(|error| IndexError::Decode {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        let (width, height) = decoded.dimensions();
        debug!(path = %path.display(), width, height, "decoded image");

        Ok(self.image_encoder.embed_image(path)?)
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

pub fn discover_images(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file() && is_image_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}
