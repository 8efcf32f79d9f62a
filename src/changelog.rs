//! Builds the changelog page from the source directory's git history.

use crate::config::Config;
use crate::template::{self, changes_context, Theme};
use crate::util::format_time;
use crate::write::{self, write_index};
use chrono::DateTime;
use gtmpl::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

const FIELD_SEPARATOR: char = '\u{1f}';

/// A commit as listed on the changelog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub hash: String,
    pub abbrev_hash: String,
    pub subject: String,
    pub author: String,
    pub date: String,
}

/// Lists up to `max` of the most recent commits touching `repo`, newest
/// first. Commit dates are formatted with the strftime-style `date_format`.
pub async fn git_log(repo: &Path, max: usize, date_format: &str) -> Result<Vec<Commit>> {
    let output = Command::new("git")
        .current_dir(repo)
        .arg("log")
        .arg(format!("--max-count={}", max))
        .arg("--format=%H%x1f%h%x1f%s%x1f%cn%x1f%cI")
        .arg("--")
        .arg(".")
        .output()
        .await
        .map_err(Error::Spawn)?;
    if !output.status.success() {
        return Err(Error::Git(
            String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        ));
    }
    Ok(parse_log(&String::from_utf8_lossy(&output.stdout), date_format))
}

/// Parses `git log` output with one commit per line and fields separated by
/// U+001F, the last one a strict ISO 8601 date. Malformed lines are skipped;
/// a date that doesn't parse is kept as is.
pub fn parse_log(stdout: &str, date_format: &str) -> Vec<Commit> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(5, FIELD_SEPARATOR);
            Some(Commit {
                hash: fields.next()?.to_owned(),
                abbrev_hash: fields.next()?.to_owned(),
                subject: fields.next()?.to_owned(),
                author: fields.next()?.to_owned(),
                date: format_date(fields.next()?, date_format),
            })
        })
        .collect()
}

fn format_date(date: &str, format: &str) -> String {
    match DateTime::parse_from_rfc3339(date) {
        Ok(time) => format_time(&time, format),
        Err(_) => date.to_owned(),
    }
}

/// Where the changelog is written.
pub fn changelog_directory(config: &Config) -> PathBuf {
    config.site_directory().join("changelog")
}

/// Renders the changelog. When the history can't be read, the failure is
/// logged and the page is rendered with no commits.
pub async fn build_changelog(config: &Config, theme: &Theme) -> Result<PathBuf> {
    let commits = match git_log(
        &config.source_directory(),
        config.wiki.commit_limit(),
        &config.custom.time_format,
    )
    .await
    {
        Ok(commits) => commits,
        Err(err) => {
            tracing::warn!(
                "Could not read the change history, the changelog will be empty: {}",
                err
            );
            Vec::new()
        }
    };
    let html = {
        let template = theme.changes()?;
        template::render(&template, changes_context(&Value::from(config), &commits))?
    };
    Ok(write_index(changelog_directory(config), html).await?)
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("running git: {0}")]
    Spawn(std::io::Error),

    #[error("git log failed: {0}")]
    Git(String),

    #[error(transparent)]
    Template(#[from] template::Error),

    #[error(transparent)]
    Write(#[from] write::Error),
}
