//! Templates pages and writes them to disk.
//!
//! Every output file is an `index.html` inside a directory named after what
//! it renders. Writes run as tasks on a [`JoinSet`]; [`Writer::finish`]
//! waits for all of them and reports each failure.

use crate::config::Config;
use crate::page::Site;
use crate::template::{self, categories_value, page_context, page_value, Theme};
use gtmpl::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task::JoinSet;

const INDEX_FILE: &str = "index.html";

/// Creates `directory` if needed and writes `html` to its `index.html`.
pub async fn write_index(directory: PathBuf, html: String) -> Result<PathBuf> {
    let path = directory.join(INDEX_FILE);
    tokio::fs::create_dir_all(&directory)
        .await
        .map_err(|err| Error::Io {
            path: directory.clone(),
            err,
        })?;
    tokio::fs::write(&path, html)
        .await
        .map_err(|err| Error::Io {
            path: path.clone(),
            err,
        })?;
    tracing::info!("Rendered: {}", path.display());
    Ok(path)
}

/// Schedules output writes and joins them.
pub struct Writer {
    tasks: JoinSet<Result<PathBuf>>,
}

/// What became of the scheduled writes.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<Error>,
}

impl Writer {
    pub fn new() -> Writer {
        Writer {
            tasks: JoinSet::new(),
        }
    }

    /// Starts writing `html` to `{directory}/index.html`.
    pub fn schedule(&mut self, directory: PathBuf, html: String) {
        self.tasks.spawn(write_index(directory, html));
    }

    /// Renders the index at the site root and every page under the pages
    /// directory, scheduling a write for each. Stops scheduling at the first
    /// template error; writes already scheduled still run.
    pub fn write_site(&mut self, site: &Site, theme: &Theme, config: &Config) -> Result<()> {
        let index_template = theme.index()?;
        let page_template = theme.page()?;

        let config_value = Value::from(config);
        let categories = categories_value(&site.categories, config);

        let index = template::render(
            &index_template,
            page_context(&config_value, &categories, None),
        )?;
        self.schedule(config.site_directory(), index);

        let pages_directory = config.pages_directory();
        for category in &site.categories {
            for page in &category.pages {
                let html = template::render(
                    &page_template,
                    page_context(&config_value, &categories, Some(page_value(page, config))),
                )?;
                self.schedule(page_directory(&pages_directory, &page.link), html);
            }
        }
        Ok(())
    }

    /// Waits for every scheduled write. Failures are logged and returned in
    /// the report; nothing is left running.
    pub async fn finish(mut self) -> WriteReport {
        let mut report = WriteReport::default();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(path)) => report.written.push(path),
                Ok(Err(err)) => {
                    tracing::error!("Error when writing page: {}", err);
                    report.failures.push(err);
                }
                Err(err) => {
                    tracing::error!("Write task failed: {}", err);
                    report.failures.push(Error::Join(err));
                }
            }
        }
        report
    }
}

/// The output directory of the page at `link`.
pub fn page_directory(pages_directory: &Path, link: &str) -> PathBuf {
    link.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(pages_directory.to_owned(), |dir, segment| dir.join(segment))
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] template::Error),

    #[error("writing '{}': {err}", path.display())]
    Io { path: PathBuf, err: std::io::Error },

    #[error("write task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_directory() {
        assert_eq!(
            page_directory(Path::new("/site/page"), "guide/intro"),
            PathBuf::from("/site/page/guide/intro")
        );
        assert_eq!(
            page_directory(Path::new("/site/page"), "top"),
            PathBuf::from("/site/page/top")
        );
    }

    #[tokio::test]
    async fn test_writes_are_joined() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut writer = Writer::new();
        writer.schedule(dir.path().join("a/b"), String::from("<p>a</p>"));
        writer.schedule(dir.path().to_owned(), String::from("<p>root</p>"));
        // A file where a directory should be fails, the others still land.
        writer.schedule(blocker.join("c"), String::from("<p>c</p>"));
        let report = writer.finish().await;

        assert_eq!(report.written.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], Error::Io { .. }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b/index.html")).unwrap(),
            "<p>a</p>"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "<p>root</p>"
        );
    }
}
