//! Scaffolds new notes with an empty header.

use crate::config::Config;
use crate::util::format_time;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The text a new note starts with.
pub fn note_template(title: &str, time: &str) -> String {
    format!("title: {}\ncategory: \ntime: {}\n---\n\n", title, time)
}

/// Creates `<source>/<name>.md` with a header stamped with the current time.
/// `name` may contain `/` to place the note in a subdirectory. An existing
/// file is never overwritten.
pub fn create_note(config: &Config, name: &str) -> Result<PathBuf> {
    let name = name.trim().trim_end_matches(".md");
    if name.is_empty() {
        return Err(Error::EmptyName);
    }
    let path = config.source_directory().join(format!("{}.md", name));
    let title = Path::new(name)
        .file_name()
        .map(|title| title.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_owned());
    let time = format_time(&chrono::Local::now(), &config.custom.time_format);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| Error::Io {
            path: parent.to_owned(),
            err,
        })?;
    }
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::AlreadyExists => Error::Exists(path.clone()),
            _ => Error::Io {
                path: path.clone(),
                err,
            },
        })?;
    file.write_all(note_template(&title, &time).as_bytes())
        .map_err(|err| Error::Io {
            path: path.clone(),
            err,
        })?;
    tracing::info!("Created note {}", path.display());
    Ok(path)
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("a note name is required")]
    EmptyName,

    #[error("`{}` already exists", .0.display())]
    Exists(PathBuf),

    #[error("writing '{}': {err}", path.display())]
    Io { path: PathBuf, err: std::io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter;

    #[test]
    fn test_new_note_parses() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let config = Config::from_yaml(dir.path(), "custom:\n  time: \"%Y\"\n")?;

        let path = create_note(&config, "guide/intro")?;
        assert_eq!(path, dir.path().join("notes/guide/intro.md"));

        let text = std::fs::read_to_string(&path)?;
        let header = frontmatter::parse(&text)?;
        assert_eq!(header.title, "intro");
        assert_eq!(header.category, "");
        assert_eq!(header.time.len(), 4);
        Ok(())
    }

    #[test]
    fn test_existing_note_is_kept() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let config = Config::from_yaml(dir.path(), "{}")?;
        let path = create_note(&config, "todo.md")?;
        std::fs::write(&path, "mine")?;

        assert!(matches!(create_note(&config, "todo"), Err(Error::Exists(_))));
        assert_eq!(std::fs::read_to_string(&path)?, "mine");
        assert!(matches!(create_note(&config, "  "), Err(Error::EmptyName)));
        Ok(())
    }
}
