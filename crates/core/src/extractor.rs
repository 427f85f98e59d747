use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-based page number.
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        Ok(collect_pages(document.get_pages().into_keys(), |page_no| {
            document.extract_text(&[page_no])
        }))
    }
}

/// A page whose text cannot be read comes back empty, so the chunker skips
/// it and the rest of the document is kept.
fn collect_pages<E: std::fmt::Display>(
    page_numbers: impl IntoIterator<Item = u32>,
    mut read: impl FnMut(u32) -> Result<String, E>,
) -> Vec<PageText> {
    page_numbers
        .into_iter()
        .map(|number| {
            let text = read(number).unwrap_or_else(|error| {
                warn!(page = number, %error, "cannot extract page text");
                String::new()
            });
            PageText { number, text }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{collect_pages, LopdfExtractor, PdfExtractor};
    use crate::IngestError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn broken_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = LopdfExtractor.extract_pages(&path);
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
        Ok(())
    }

    #[test]
    fn unreadable_page_is_blank_and_others_survive() {
        let pages = collect_pages(1..=4, |page| {
            if page == 3 {
                Err("unsupported font encoding")
            } else {
                Ok(format!("page {page} text"))
            }
        });

        let texts: Vec<_> = pages.iter().map(|page| page.text.as_str()).collect();
        assert_eq!(texts, vec!["page 1 text", "page 2 text", "", "page 4 text"]);
        assert_eq!(pages[3].number, 4);
    }
}
