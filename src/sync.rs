//! Mirrors the theme assets, static files and raw sources into the site, and
//! manages the custom-domain marker and the favicon.
//!
//! None of these steps stop the build. Callers log and collect the errors.

use crate::config::Config;
use crate::util::is_hidden;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// The file GitHub Pages-style hosts read the custom domain from.
pub const DOMAIN_MARKER_FILE: &str = "CNAME";

const FAVICON_FILE: &str = "favicon.ico";

/// Copies every file under `source` to the same relative path under
/// `destination`, skipping dotfiles and dot-directories. Existing files are
/// overwritten. Returns the number of files copied.
pub fn mirror(source: &Path, destination: &Path) -> Result<usize> {
    let mut copied = 0;
    for result in WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = result?;
        let relative = match entry.path().strip_prefix(source) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|err| Error::Io {
                path: target.clone(),
                err,
            })?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|err| Error::Io {
                path: entry.path().to_owned(),
                err,
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Runs [`mirror`] on the blocking pool. A missing `source` is not an error;
/// nothing is copied.
pub async fn mirror_tree(source: PathBuf, destination: PathBuf) -> Result<usize> {
    if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
        tracing::debug!("Nothing to copy from `{}`", source.display());
        return Ok(0);
    }
    tokio::task::spawn_blocking(move || mirror(&source, &destination)).await?
}

/// Copies the theme's assets to `<site>/assets` and the static directory to
/// `<site>/static`, then the favicon if one is configured.
pub async fn sync_assets(config: &Config, theme_assets: &Path) -> Vec<Error> {
    let site = config.site_directory();
    let (assets, statics, favicon) = tokio::join!(
        mirror_tree(theme_assets.to_owned(), site.join("assets")),
        mirror_tree(config.static_directory(), site.join("static")),
        sync_favicon(config),
    );

    let mut failures = Vec::new();
    for result in [assets, statics] {
        match result {
            Ok(copied) => tracing::debug!("Copied {} asset file(s)", copied),
            Err(err) => failures.push(err),
        }
    }
    if let Err(err) = favicon {
        failures.push(err);
    }
    failures
}

/// Mirrors the source tree to the raw directory so footers can link to each
/// page's source file.
pub async fn sync_sources(config: &Config) -> Result<usize> {
    let copied = mirror_tree(config.source_directory(), config.raw_directory()).await?;
    tracing::info!("Source files synced.");
    Ok(copied)
}

/// What [`sync_domain_marker`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomainMarker {
    Written,
    Removed,
    Absent,
}

/// Writes `domain` followed by a newline to the marker file in `site`. When
/// no domain is configured (or it is empty) an existing marker file is
/// deleted; a missing one is left missing.
pub async fn sync_domain_marker(site: &Path, domain: Option<&str>) -> Result<DomainMarker> {
    let path = site.join(DOMAIN_MARKER_FILE);
    match domain.filter(|domain| !domain.is_empty()) {
        Some(domain) => {
            tokio::fs::create_dir_all(site).await.map_err(|err| Error::Io {
                path: site.to_owned(),
                err,
            })?;
            tokio::fs::write(&path, format!("{}\n", domain))
                .await
                .map_err(|err| Error::Io {
                    path: path.clone(),
                    err,
                })?;
            tracing::info!("Domain marker set to {}", domain);
            Ok(DomainMarker::Written)
        }
        None => match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Domain marker removed.");
                Ok(DomainMarker::Removed)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No domain configured and no marker to remove");
                Ok(DomainMarker::Absent)
            }
            Err(err) => Err(Error::Io { path, err }),
        },
    }
}

/// Copies `favicon.ico` from the project root to the site root when
/// `wiki.favicon` is on. A missing favicon is only a warning.
pub async fn sync_favicon(config: &Config) -> Result<()> {
    if !config.wiki.favicon {
        return Ok(());
    }
    let source = config.favicon_path();
    if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
        tracing::warn!(
            "Favicon is enabled but `{}` was not found",
            source.display()
        );
        return Ok(());
    }
    let site = config.site_directory();
    tokio::fs::create_dir_all(&site).await.map_err(|err| Error::Io {
        path: site.clone(),
        err,
    })?;
    tokio::fs::copy(&source, site.join(FAVICON_FILE))
        .await
        .map_err(|err| Error::Io { path: source, err })?;
    Ok(())
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("copying '{}': {err}", path.display())]
    Io { path: PathBuf, err: std::io::Error },

    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    #[error("copy task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_domain_marker_written() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("site");
        assert_eq!(
            sync_domain_marker(&site, Some("example.com")).await?,
            DomainMarker::Written
        );
        assert_eq!(
            std::fs::read_to_string(site.join(DOMAIN_MARKER_FILE)).unwrap(),
            "example.com\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_domain_marker_removed_when_unset() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join(DOMAIN_MARKER_FILE);
        std::fs::write(&marker, "old.example.com\n").unwrap();

        assert_eq!(
            sync_domain_marker(dir.path(), None).await?,
            DomainMarker::Removed
        );
        assert!(!marker.exists());

        // Unset again with nothing left to remove.
        assert_eq!(
            sync_domain_marker(dir.path(), None).await?,
            DomainMarker::Absent
        );
        // An empty domain counts as unset.
        assert_eq!(
            sync_domain_marker(dir.path(), Some("")).await?,
            DomainMarker::Absent
        );
        Ok(())
    }

    #[test]
    fn test_mirror_skips_dotfiles() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes");
        std::fs::create_dir_all(source.join("guide")).unwrap();
        std::fs::create_dir_all(source.join(".git")).unwrap();
        std::fs::write(source.join("top.md"), "a").unwrap();
        std::fs::write(source.join("guide/intro.md"), "b").unwrap();
        std::fs::write(source.join(".secret"), "c").unwrap();
        std::fs::write(source.join(".git/HEAD"), "d").unwrap();

        let raw = dir.path().join("site/raw");
        assert_eq!(mirror(&source, &raw)?, 2);
        assert_eq!(std::fs::read_to_string(raw.join("guide/intro.md")).unwrap(), "b");
        assert!(raw.join("top.md").exists());
        assert!(!raw.join(".secret").exists());
        assert!(!raw.join(".git").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_mirror_tree_missing_source() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let copied = mirror_tree(dir.path().join("nope"), dir.path().join("out")).await?;
        assert_eq!(copied, 0);
        assert!(!dir.path().join("out").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_favicon_is_not_an_error() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_yaml(dir.path(), "wiki:\n  favicon: true\n").unwrap();
        sync_favicon(&config).await?;
        assert!(!config.site_directory().join(FAVICON_FILE).exists());

        std::fs::write(config.favicon_path(), [0u8, 1, 2]).unwrap();
        sync_favicon(&config).await?;
        assert_eq!(
            std::fs::read(config.site_directory().join(FAVICON_FILE)).unwrap(),
            vec![0u8, 1, 2]
        );
        Ok(())
    }
}
