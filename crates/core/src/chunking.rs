use crate::error::IngestError;
use crate::extractor::PageText;
use crate::models::{Chunk, IngestionOptions};

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, IngestError> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// The window must advance by at least one character per step.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Slides a `chunk_size` character window over `text`, advancing by
/// `chunk_size - overlap`, until the window start passes the end of the text.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        start += config.stride();
    }

    Ok(windows)
}

/// Chunks every page that has text; empty pages yield nothing.
pub fn chunk_pages(pages: &[PageText], config: ChunkingConfig) -> Result<Vec<Chunk>, IngestError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for page in pages.iter().filter(|page| !page.text.is_empty()) {
        for text in chunk_text(&page.text, config)? {
            chunks.push(Chunk {
                text,
                page: page.number,
            });
        }
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        assert!(ChunkingConfig::new(10, 10).is_err());
        assert!(ChunkingConfig::new(10, 12).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(10, 9).is_ok());
    }

    #[test]
    fn chunk_count_matches_stride_formula() {
        let config = ChunkingConfig::new(7, 3).expect("valid config");
        for len in 0..40usize {
            let text = "x".repeat(len);
            let chunks = chunk_text(&text, config).expect("chunking should succeed");
            assert_eq!(chunks.len(), len.div_ceil(config.stride()), "length {len}");
        }
    }

    #[test]
    fn windows_cover_every_character() {
        let config = ChunkingConfig::new(5, 2).expect("valid config");
        let text: String = ('a'..='z').collect();
        let chunks = chunk_text(&text, config).expect("chunking should succeed");

        let mut covered = vec![false; text.len()];
        for (index, chunk) in chunks.iter().enumerate() {
            let start = index * config.stride();
            assert_eq!(chunk.as_str(), &text[start..start + chunk.len()]);
            for flag in &mut covered[start..start + chunk.len()] {
                *flag = true;
            }
        }
        assert!(covered.iter().all(|flag| *flag));
    }

    #[test]
    fn windows_count_characters_not_bytes() {
        let config = ChunkingConfig::new(2, 0).expect("valid config");
        let chunks = chunk_text("äöüß", config).expect("chunking should succeed");
        assert_eq!(chunks, vec!["äö".to_string(), "üß".to_string()]);
    }

    #[test]
    fn pages_keep_their_number_and_empty_pages_are_skipped() {
        let config = ChunkingConfig::new(500, 50).expect("valid config");
        let pages = vec![page(1, &"A".repeat(600)), page(2, ""), page(3, &"B".repeat(50))];

        let chunks = chunk_pages(&pages, config).expect("chunking should succeed");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "A".repeat(500));
        assert_eq!(chunks[1].text, "A".repeat(150));
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[1].page, 1);
        assert_eq!(chunks[2].page, 3);
    }
}
