//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output site: parsing the notes one at a time
//! ([`crate::frontmatter`], [`crate::math`], [`crate::markdown`]), grouping
//! them into categories ([`crate::page`]), rendering the index and page files
//! ([`crate::write`]), and, alongside the note pipeline, mirroring assets and
//! sources ([`crate::sync`]) and building the changelog
//! ([`crate::changelog`]).

use crate::changelog::{self, build_changelog};
use crate::config::{Config, TimestampSource};
use crate::discover::{self, markdown_files, SourceFile};
use crate::frontmatter;
use crate::markdown::Renderer;
use crate::math::{self, Typesetter};
use crate::page::{Page, Site};
use crate::sync::{self, sync_assets, sync_domain_marker, sync_sources};
use crate::template::{self, Theme};
use crate::util::{format_time, to_slash};
use crate::write::{self, Writer};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The outcome of a build that ran to the end.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// The number of pages rendered.
    pub pages: usize,

    /// The number of files written by the index and page writers.
    pub written: usize,

    /// Notes left out because they couldn't be read or had a bad header.
    pub skipped: Vec<PathBuf>,

    /// Everything that went wrong without stopping the build.
    pub failures: Vec<Error>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds the site described by `config`. A missing source directory, a
/// typesetting failure or a template error stops the build and is returned
/// as an error, but only after every write already scheduled has finished.
/// Other failures are logged and listed in the report.
pub async fn build_site(config: &Config, typesetter: &dyn Typesetter) -> Result<BuildReport> {
    let theme = Theme::load(&config.theme_directory())?;
    let renderer = Renderer::new(config.custom.markdown, config.custom.autospacing);

    let (failures, parsed) = tokio::join!(
        sync_site(config, &theme),
        parse_notes(config, &renderer, typesetter),
    );
    let (site, skipped) = parsed?;

    let mut writer = Writer::new();
    let scheduled = writer.write_site(&site, &theme, config);
    let writes = writer.finish().await;
    scheduled?;

    let mut report = BuildReport {
        pages: site.pages.len(),
        written: writes.written.len(),
        skipped,
        failures,
    };
    report
        .failures
        .extend(writes.failures.into_iter().map(Error::from));
    tracing::info!(
        "Built {} page(s), skipped {}, {} failure(s)",
        report.pages,
        report.skipped.len(),
        report.failures.len()
    );
    Ok(report)
}

// Everything that doesn't depend on the notes: the mirrors, the domain marker
// and the changelog. Failures are logged and collected.
async fn sync_site(config: &Config, theme: &Theme) -> Vec<Error> {
    let site = config.site_directory();
    let assets_directory = theme.assets_directory();
    let changelog = async {
        match config.wiki.log {
            true => build_changelog(config, theme).await.map(Some),
            false => Ok(None),
        }
    };

    let (assets, sources, marker, changelog) = tokio::join!(
        sync_assets(config, &assets_directory),
        sync_sources(config),
        sync_domain_marker(&site, config.deploy.cname.as_deref()),
        changelog,
    );

    let mut failures: Vec<Error> = assets.into_iter().map(Error::from).collect();
    if let Err(err) = sources {
        failures.push(err.into());
    }
    if let Err(err) = marker {
        failures.push(err.into());
    }
    if let Err(err) = changelog {
        failures.push(err.into());
    }
    for err in &failures {
        tracing::error!("{}", err);
    }
    failures
}

// Parses the notes strictly one after another, so category order follows
// file order and only one typesetting call is in flight.
async fn parse_notes(
    config: &Config,
    renderer: &Renderer,
    typesetter: &dyn Typesetter,
) -> Result<(Site, Vec<PathBuf>)> {
    let mut site = Site::new();
    let mut skipped = Vec::new();
    for file in markdown_files(&config.source_directory())? {
        tracing::info!("Parsing: {}", file.relative_path.display());
        match parse_page(config, renderer, typesetter, &file).await? {
            Some(page) => site.add(page),
            None => skipped.push(file.path),
        }
    }
    Ok((site, skipped))
}

/// Turns one note into a [`Page`]. Returns `None`, after logging why, when
/// the file can't be read or its header is malformed.
pub async fn parse_page(
    config: &Config,
    renderer: &Renderer,
    typesetter: &dyn Typesetter,
    file: &SourceFile,
) -> Result<Option<Page>> {
    let (text, modified) = match read_note(&file.path).await {
        Ok(read) => read,
        Err(err) => {
            tracing::error!("Error when reading {}: {}", file.path.display(), err);
            return Ok(None);
        }
    };
    let header = match frontmatter::parse(&text) {
        Ok(header) => header,
        Err(err) => {
            tracing::error!("Error when parsing {}: {}", file.path.display(), err);
            return Ok(None);
        }
    };

    let timestamp = match config.custom.timestamp {
        TimestampSource::Mtime => format_time(&modified, &config.custom.time_format),
        TimestampSource::Frontmatter => header.time.to_owned(),
    };
    let source_path = format!("{}/{}", config.raw_url(), to_slash(&file.relative_path));
    let mut body = String::with_capacity(header.body.len() + config.custom.last_update.len());
    body.push_str(header.body);
    body.push_str(&last_update_footer(
        &config.custom.last_update,
        &timestamp,
        &source_path,
    ));

    let body = math::process(&body, config.custom.math, typesetter).await?;
    Ok(Some(Page {
        title: renderer.space(header.title).into_owned(),
        category: renderer.space(header.category).into_owned(),
        time: header.time.to_owned(),
        link: page_link(&file.relative_path),
        content: renderer.render(&body),
    }))
}

async fn read_note(path: &Path) -> std::io::Result<(String, DateTime<Local>)> {
    let modified = tokio::fs::metadata(path).await?.modified()?;
    let text = tokio::fs::read_to_string(path).await?;
    Ok((text, DateTime::<Local>::from(modified)))
}

/// Expands the footer placeholders: `%n%` is a newline, `%mtime%` the
/// timestamp and `%sourcepath%` the URL of the raw source file.
pub fn last_update_footer(template: &str, timestamp: &str, source_path: &str) -> String {
    template
        .replace("%n%", "\n")
        .replace("%mtime%", timestamp)
        .replace("%sourcepath%", source_path)
}

/// The link of the note at `relative_path`: the path without its extension,
/// `/`-separated.
pub fn page_link(relative_path: &Path) -> String {
    to_slash(&relative_path.with_extension(""))
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Discover(#[from] discover::Error),

    #[error(transparent)]
    Math(#[from] math::Error),

    #[error(transparent)]
    Template(#[from] template::Error),

    #[error(transparent)]
    Write(#[from] write::Error),

    #[error("syncing files: {0}")]
    Sync(#[from] sync::Error),

    #[error("building the changelog: {0}")]
    Changelog(#[from] changelog::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::MathMlTypesetter;

    fn source(dir: &Path, relative: &str, text: &str) -> SourceFile {
        let path = dir.join(relative);
        std::fs::write(&path, text).unwrap();
        SourceFile {
            path,
            relative_path: PathBuf::from(relative),
        }
    }

    #[test]
    fn test_last_update_footer() {
        assert_eq!(
            last_update_footer(
                "%n%%n%_Last Update: %mtime%_ [Source File](%sourcepath%)%n%",
                "2021-01-01 10:00",
                "/raw/a.md"
            ),
            "\n\n_Last Update: 2021-01-01 10:00_ [Source File](/raw/a.md)\n"
        );
    }

    #[test]
    fn test_page_link() {
        assert_eq!(page_link(&Path::new("guide").join("intro.md")), "guide/intro");
        assert_eq!(page_link(Path::new("top.md")), "top");
    }

    #[tokio::test]
    async fn test_parse_page() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_yaml(dir.path(), "{}").unwrap();
        let renderer = Renderer::new(config.custom.markdown, false);
        let file = source(
            dir.path(),
            "intro.md",
            "title: Intro\ncategory: Guide\ntime: 2021-01-01\n---\nHello **World**",
        );

        let page = parse_page(&config, &renderer, &MathMlTypesetter, &file)
            .await?
            .expect("page");
        assert_eq!(page.title, "Intro");
        assert_eq!(page.category, "Guide");
        assert_eq!(page.time, "2021-01-01");
        assert_eq!(page.link, "intro");
        assert!(page.content.contains("<strong>World</strong>"));
        assert!(page.content.contains("Last Update: "));
        assert!(page.content.contains(r#"<a href="/raw/intro.md">Source File</a>"#));
        // the footer shows the modification time, not the header's time
        assert!(!page.content.contains("Last Update: 2021-01-01<"));
        Ok(())
    }

    #[tokio::test]
    async fn test_parse_page_frontmatter_timestamp() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config =
            Config::from_yaml(dir.path(), "custom:\n  timestamp: frontmatter\n").unwrap();
        let renderer = Renderer::new(config.custom.markdown, false);
        let file = source(
            dir.path(),
            "a.md",
            "title: A\ncategory: B\ntime: 1999-12-31\n---\nbody",
        );
        let page = parse_page(&config, &renderer, &MathMlTypesetter, &file)
            .await?
            .expect("page");
        assert!(page.content.contains("<em>Last Update: 1999-12-31</em>"));
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_header_is_skipped() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_yaml(dir.path(), "{}").unwrap();
        let renderer = Renderer::new(config.custom.markdown, false);
        let file = source(dir.path(), "bad.md", "no header here\n");
        assert!(parse_page(&config, &renderer, &MathMlTypesetter, &file)
            .await?
            .is_none());

        let missing = SourceFile {
            path: dir.path().join("gone.md"),
            relative_path: PathBuf::from("gone.md"),
        };
        assert!(parse_page(&config, &renderer, &MathMlTypesetter, &missing)
            .await?
            .is_none());
        Ok(())
    }
}
