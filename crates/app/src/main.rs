use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use paper_atlas_core::{
    BatchReport, CategorySet, CharacterNgramEmbedder, DataLayout, Embedder, EndpointConfig,
    HttpEmbedder, HttpImageEmbedder, ImageHit, ImageLibrary, IndexReport, IngestionOptions,
    LocalCollection, LopdfExtractor, PaperHit, PaperLibrary, PresentationMode, QdrantCollection,
    SearchOptions, SearchOutcome, VectorCollection,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "paper-atlas", version, about = "Organize papers by topic and search papers and images by meaning")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root directory holding papers/, images/ and vectors/
    #[arg(long, env = "PAPER_ATLAS_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Vector store backend
    #[arg(long, env = "PAPER_ATLAS_BACKEND", value_enum, default_value_t = Backend::Local, global = true)]
    backend: Backend,

    /// Qdrant base URL (qdrant backend only)
    #[arg(long, env = "PAPER_ATLAS_QDRANT_URL", default_value = "http://localhost:6333", global = true)]
    qdrant_url: String,

    /// Collection holding paper chunks
    #[arg(long, default_value = "papers", global = true)]
    papers_collection: String,

    /// Collection holding images
    #[arg(long, default_value = "images", global = true)]
    images_collection: String,

    /// Document-text embedding endpoint; the offline n-gram embedder is used when unset
    #[arg(long, env = "PAPER_ATLAS_TEXT_EMBED_URL", global = true)]
    text_embed_url: Option<String>,

    /// Cross-modal text encoder endpoint
    #[arg(long, env = "PAPER_ATLAS_CLIP_TEXT_URL", global = true)]
    clip_text_url: Option<String>,

    /// Cross-modal image encoder endpoint
    #[arg(long, env = "PAPER_ATLAS_CLIP_IMAGE_URL", global = true)]
    clip_image_url: Option<String>,

    /// Bearer token sent to the embedding endpoints
    #[arg(long, env = "PAPER_ATLAS_EMBED_API_KEY", hide_env_values = true, global = true)]
    embed_api_key: Option<String>,

    /// Characters per paper chunk
    #[arg(long, default_value_t = 500, global = true)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value_t = 50, global = true)]
    chunk_overlap: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Local,
    Qdrant,
}

#[derive(Subcommand)]
enum Command {
    /// Classify one PDF into a topic, archive it and index its text.
    #[command(name = "add_paper")]
    AddPaper {
        /// PDF file
        path: PathBuf,
        /// Comma-separated topics, e.g. "CV,NLP,RL"
        #[arg(long)]
        topics: String,
    },
    /// Semantic search over indexed papers.
    #[command(name = "search_paper")]
    SearchPaper {
        query: String,
        /// Print matching file paths only
        #[arg(long)]
        index_only: bool,
        /// Minimum similarity
        #[arg(short = 't', long, default_value_t = 0.4)]
        threshold: f64,
        /// Candidates fetched before threshold filtering
        #[arg(short = 'n', default_value_t = 5)]
        candidates: usize,
    },
    /// Run add_paper for every PDF directly inside a folder.
    #[command(name = "batch_organize")]
    BatchOrganize {
        folder: PathBuf,
        /// Comma-separated topics
        #[arg(long)]
        topics: String,
    },
    /// Index images from a folder (default: the managed image directory).
    #[command(name = "index_images")]
    IndexImages {
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Find images matching a text description.
    #[command(name = "search_image")]
    SearchImage {
        query: String,
        /// Print matching file paths only
        #[arg(long)]
        index_only: bool,
        /// Minimum similarity
        #[arg(short = 't', long, default_value_t = 0.25)]
        threshold: f64,
        /// Candidates fetched before threshold filtering
        #[arg(short = 'n', default_value_t = 3)]
        candidates: usize,
    },
}

impl Cli {
    fn layout(&self) -> anyhow::Result<DataLayout> {
        let layout = DataLayout::new(&self.data_dir);
        layout
            .ensure()
            .with_context(|| format!("cannot create data directory {}", self.data_dir.display()))?;
        Ok(layout)
    }

    fn endpoint(&self, url: &str) -> EndpointConfig {
        EndpointConfig::new(url, self.embed_api_key.clone())
    }

    fn collection(&self, layout: &DataLayout, name: &str) -> anyhow::Result<Arc<dyn VectorCollection>> {
        Ok(match self.backend {
            Backend::Local => {
                Arc::new(LocalCollection::open(&layout.vectors_dir(), name)?) as Arc<dyn VectorCollection>
            }
            Backend::Qdrant => Arc::new(QdrantCollection::new(&self.qdrant_url, name)?),
        })
    }

    fn paper_library(&self, layout: &DataLayout) -> anyhow::Result<PaperLibrary> {
        let embedder: Arc<dyn Embedder> = match &self.text_embed_url {
            Some(url) => Arc::new(HttpEmbedder::new(self.endpoint(url))) as Arc<dyn Embedder>,
            None => Arc::new(CharacterNgramEmbedder::default()),
        };

        Ok(PaperLibrary::new(
            embedder,
            Arc::new(LopdfExtractor),
            self.collection(layout, &self.papers_collection)?,
            layout.papers_dir(),
            IngestionOptions {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
                ..IngestionOptions::default()
            },
        ))
    }

    fn image_library(&self, layout: &DataLayout) -> anyhow::Result<ImageLibrary> {
        let (Some(text_url), Some(image_url)) = (&self.clip_text_url, &self.clip_image_url) else {
            bail!(
                "image commands need a cross-modal embedding service: set --clip-text-url and \
                 --clip-image-url (or PAPER_ATLAS_CLIP_TEXT_URL / PAPER_ATLAS_CLIP_IMAGE_URL)"
            );
        };

        Ok(ImageLibrary::new(
            Arc::new(HttpEmbedder::new(self.endpoint(text_url))),
            Arc::new(HttpImageEmbedder::new(self.endpoint(image_url))),
            self.collection(layout, &self.images_collection)?,
            layout.images_dir(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "paper-atlas boot"
    );

    let layout = cli.layout()?;

    match &cli.command {
        Command::AddPaper { path, topics } => {
            let topics = CategorySet::parse(topics)?;
            let library = cli.paper_library(&layout)?;
            let report = library
                .add_paper(path, &topics)
                .await
                .with_context(|| format!("failed to add {}", path.display()))?;

            println!(
                "{} -> {} ({} chunks indexed)",
                report.filename,
                report.archived_path.display(),
                report.record_ids.len()
            );
        }
        Command::SearchPaper {
            query,
            index_only,
            threshold,
            candidates,
        } => {
            let library = cli.paper_library(&layout)?;
            let options = search_options(SearchOptions::papers(), *threshold, *candidates, *index_only);
            let outcome = library.search(query, &options).await?;
            print_paper_outcome(query, &outcome);
        }
        Command::BatchOrganize { folder, topics } => {
            let topics = CategorySet::parse(topics)?;
            let library = cli.paper_library(&layout)?;
            let report = library.batch_organize(folder, &topics).await?;
            print_batch_report(folder, &report);
        }
        Command::IndexImages { source } => {
            let library = cli.image_library(&layout)?;
            let report = library.index_images(source.as_deref()).await?;
            print_index_report(&report);
        }
        Command::SearchImage {
            query,
            index_only,
            threshold,
            candidates,
        } => {
            let library = cli.image_library(&layout)?;
            let options = search_options(SearchOptions::images(), *threshold, *candidates, *index_only);
            let outcome = library.search(query, &options).await?;
            print_image_outcome(query, &outcome);
        }
    }

    Ok(())
}

fn search_options(base: SearchOptions, threshold: f64, candidates: usize, index_only: bool) -> SearchOptions {
    let mode = if index_only {
        PresentationMode::PathList
    } else {
        PresentationMode::Detailed
    };
    base.with_threshold(threshold)
        .with_top_k(candidates)
        .with_mode(mode)
}

fn print_terminal<H>(outcome: &SearchOutcome<H>, subject: &str) -> bool {
    match outcome {
        SearchOutcome::NoCandidates => {
            println!("no {subject} found");
            true
        }
        SearchOutcome::BelowThreshold { threshold } => {
            println!("no {subject} with similarity >= {threshold}");
            true
        }
        SearchOutcome::Paths(paths) => {
            for path in paths {
                println!("{}", path.display());
            }
            true
        }
        SearchOutcome::Hits(_) => false,
    }
}

fn print_paper_outcome(query: &str, outcome: &SearchOutcome<PaperHit>) {
    if print_terminal(outcome, "papers") {
        return;
    }
    let SearchOutcome::Hits(hits) = outcome else {
        return;
    };

    println!("query: {query}");
    for hit in hits {
        println!("[{}] similarity={:.4}", hit.rank, hit.similarity);
        println!("  source: {} (page {})", hit.filename, hit.page);
        println!("  category: {}", hit.category);
        println!("  snippet: \"{}...\"", hit.snippet);
        println!("  path: {}", hit.path.display());
    }
}

fn print_image_outcome(query: &str, outcome: &SearchOutcome<ImageHit>) {
    if print_terminal(outcome, "images") {
        return;
    }
    let SearchOutcome::Hits(hits) = outcome else {
        return;
    };

    println!("query: {query}");
    for hit in hits {
        println!("[{}] similarity={:.4}", hit.rank, hit.similarity);
        println!("  file: {}", hit.filename);
        println!("  path: {}", hit.path.display());
    }
}

fn print_batch_report(folder: &Path, report: &BatchReport) {
    for ingested in &report.ingested {
        println!("{} -> {}", ingested.filename, ingested.category);
    }
    for failed in &report.failed {
        warn!(path = %failed.path.display(), reason = %failed.reason, "not organized");
    }
    println!(
        "{}: {} organized, {} failed",
        folder.display(),
        report.ingested.len(),
        report.failed.len()
    );
}

fn print_index_report(report: &IndexReport) {
    for failed in &report.failed {
        warn!(path = %failed.path.display(), reason = %failed.reason, "not indexed");
    }
    println!(
        "indexed {} new, skipped {} already indexed, {} failed",
        report.indexed,
        report.skipped,
        report.failed.len()
    );
}
