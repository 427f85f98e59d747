pub mod chunking;
pub mod classify;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod images;
pub mod ingest;
pub mod layout;
pub mod models;
pub mod retrieval;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_pages, chunk_text, ChunkingConfig};
pub use classify::Classifier;
pub use embeddings::{
    cosine_similarity, CharacterNgramEmbedder, Embedder, EndpointConfig, HttpEmbedder,
    HttpImageEmbedder, ImageEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{EmbedError, IndexError, IngestError, SearchError, StoreError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use images::{discover_images, is_image_file, ImageLibrary};
pub use ingest::{discover_pdf_files, record_id, PaperLibrary};
pub use layout::DataLayout;
pub use models::{
    BatchReport, CategorySet, Chunk, DocumentRecord, FailedFile, ImageHit, ImageMetadata,
    ImageRecord, IndexReport, IngestionOptions, IngestionReport, PaperHit, PaperMetadata,
    PresentationMode, SearchOptions, SearchOutcome, IMAGES_COLLECTION, PAPERS_COLLECTION,
};
pub use retrieval::{distinct_paths, filter_by_threshold, Survivor};
pub use store::{distance_to_similarity, Candidate, StoredRecord};
pub use stores::{LocalCollection, QdrantCollection};
pub use traits::VectorCollection;
