//! Finds the note files under the source directory.

use crate::util::is_hidden;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const MARKDOWN_EXTENSION: &str = "md";

/// A note file found under the source directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    /// The full path to the file.
    pub path: PathBuf,

    /// The path relative to the source directory, e.g. `guide/intro.md`.
    pub relative_path: PathBuf,
}

/// Recursively lists the markdown files under `root`, skipping dotfiles and
/// dot-directories. Entries are visited in file-name order so the result is
/// the same for an unchanged tree; that order decides category order.
pub fn markdown_files(root: &Path) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(Error::MissingRoot(root.to_owned()));
    }

    let mut files = Vec::new();
    for result in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = result?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some(MARKDOWN_EXTENSION) {
            continue;
        }
        files.push(SourceFile {
            path: entry.path().to_owned(),
            // strip_prefix() can't fail, every entry is below `root`
            relative_path: entry.path().strip_prefix(root).unwrap_or(entry.path()).to_owned(),
        });
    }
    Ok(files)
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The source directory doesn't exist.
    #[error("source directory `{}` not found", .0.display())]
    MissingRoot(PathBuf),

    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_markdown_files() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        fs::create_dir_all(root.join("b"))?;
        fs::create_dir_all(root.join(".hidden"))?;
        fs::write(root.join("b/two.md"), "")?;
        fs::write(root.join("a.md"), "")?;
        fs::write(root.join("notes.txt"), "")?;
        fs::write(root.join(".draft.md"), "")?;
        fs::write(root.join(".hidden/secret.md"), "")?;

        let relative: Vec<PathBuf> = markdown_files(root)?
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        assert_eq!(relative, vec![PathBuf::from("a.md"), PathBuf::from("b/two.md")]);
        Ok(())
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        match markdown_files(&dir.path().join("nope")) {
            Err(Error::MissingRoot(path)) => assert!(path.ends_with("nope")),
            other => panic!("expected MissingRoot, got {:?}", other),
        }
    }
}
