use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// On-disk layout under one data root: archived papers grouped by category,
/// a flat image store, and the local vector snapshots.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn papers_dir(&self) -> PathBuf {
        self.root.join("papers")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn vectors_dir(&self) -> PathBuf {
        self.root.join("vectors")
    }

    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(self.papers_dir())?;
        fs::create_dir_all(self.images_dir())?;
        fs::create_dir_all(self.vectors_dir())?;
        Ok(())
    }
}

/// Directory name for a category label. Always a single normal path
/// component: separators become `_`, and empty or all-dot labels (`.`, `..`)
/// have every dot replaced.
pub fn category_dir_name(label: &str) -> String {
    let name: String = label
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();

    if name.chars().all(|c| c == '.') {
        "_".repeat(name.len().max(1))
    } else {
        name
    }
}

pub fn same_file(left: &Path, right: &Path) -> bool {
    match (left.canonicalize(), right.canonicalize()) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ensure_creates_all_subtrees() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let layout = DataLayout::new(dir.path().join("data"));
        layout.ensure()?;
        assert!(layout.papers_dir().is_dir());
        assert!(layout.images_dir().is_dir());
        assert!(layout.vectors_dir().is_dir());
        Ok(())
    }

    #[test]
    fn category_names_cannot_escape_papers_dir() {
        assert_eq!(category_dir_name("ML/Vision"), "ML_Vision");
        assert_eq!(category_dir_name(" NLP "), "NLP");
        assert_eq!(category_dir_name(".."), "__");
        assert_eq!(category_dir_name(" . "), "_");
        assert_eq!(category_dir_name(""), "_");
        assert_eq!(category_dir_name("v1.2"), "v1.2");
    }

    #[test]
    fn same_file_resolves_relative_segments() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("a"))?;
        let file = dir.path().join("a").join("x.pdf");
        fs::write(&file, b"x")?;

        assert!(same_file(&file, &dir.path().join("a").join("..").join("a").join("x.pdf")));
        assert!(!same_file(&file, &dir.path().join("missing.pdf")));
        Ok(())
    }
}
