//! Loads the project configuration (`config.yml`) into an immutable
//! [`Config`]. Every directory is resolved against the project root, which is
//! the directory holding the configuration file.

use crate::util::open;
use anyhow::{anyhow, Context, Result};
use gtmpl::Value;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "config.yml";

const DEFAULT_LAST_UPDATE: &str =
    "%n%%n%_Last Update: %mtime%_ [Source File](%sourcepath%)%n%";
const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const DEFAULT_LOG_MAX: usize = 20;

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Directories {
    pub source: PathBuf,
    pub site: PathBuf,
    /// Path segment under the site root where pages are written.
    pub page: String,
    /// Path segment under the site root where raw sources are mirrored.
    pub raw: String,
    #[serde(rename = "static")]
    pub static_files: PathBuf,
    pub themes: PathBuf,
}

impl Default for Directories {
    fn default() -> Self {
        Directories {
            source: PathBuf::from("notes"),
            site: PathBuf::from("site"),
            page: String::from("page"),
            raw: String::from("raw"),
            static_files: PathBuf::from("static"),
            themes: PathBuf::from("themes"),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Wiki {
    pub title: String,
    pub description: String,
    pub email: String,
    pub theme: String,
    /// Whether to build the changelog page.
    pub log: bool,
    #[serde(rename = "logmax")]
    pub log_max: usize,
    pub favicon: bool,
}

impl Wiki {
    /// How many commits the changelog lists. `logmax: 0` means the default.
    pub fn commit_limit(&self) -> usize {
        match self.log_max {
            0 => DEFAULT_LOG_MAX,
            max => max,
        }
    }
}

impl Default for Wiki {
    fn default() -> Self {
        Wiki {
            title: String::from("Wiki"),
            description: String::new(),
            email: String::new(),
            theme: String::from("default"),
            log: false,
            log_max: DEFAULT_LOG_MAX,
            favicon: false,
        }
    }
}

/// Markdown parser options and per-extension toggles.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct MarkdownToggles {
    /// Pass raw HTML through. When off, HTML in notes is escaped. Typeset
    /// math is spliced in as markup, so math needs this on.
    pub html: bool,
    /// Render soft line breaks as `<br />`.
    pub breaks: bool,
    /// Smart quotes and dashes.
    pub typographer: bool,
    pub abbr: bool,
    pub sup_sub: bool,
    /// Reference (`[^1]`) and inline (`^[text]`) footnotes.
    pub footnote: bool,
    pub mark: bool,
    pub ins: bool,
}

impl Default for MarkdownToggles {
    fn default() -> Self {
        MarkdownToggles {
            html: true,
            breaks: false,
            typographer: false,
            abbr: false,
            sup_sub: false,
            footnote: false,
            mark: false,
            ins: false,
        }
    }
}

/// Which timestamp the last-update footer shows.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    /// The source file's modification time.
    #[default]
    Mtime,
    /// The `time:` header line, verbatim.
    Frontmatter,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Custom {
    #[serde(alias = "mathjax")]
    pub math: bool,
    pub autospacing: bool,
    pub markdown: MarkdownToggles,
    #[serde(rename = "lastupdate")]
    pub last_update: String,
    #[serde(rename = "time")]
    pub time_format: String,
    pub timestamp: TimestampSource,
}

impl Default for Custom {
    fn default() -> Self {
        Custom {
            math: false,
            autospacing: false,
            markdown: MarkdownToggles::default(),
            last_update: String::from(DEFAULT_LAST_UPDATE),
            time_format: String::from(DEFAULT_TIME_FORMAT),
            timestamp: TimestampSource::default(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Deploy {
    /// The custom domain written into the site's `CNAME` file.
    pub cname: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Base {
    /// URL path prefix the site is served under, e.g. `/` or `/wiki/`.
    pub path: String,
}

impl Default for Base {
    fn default() -> Self {
        Base {
            path: String::from("/"),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Project {
    dir: Directories,
    wiki: Wiki,
    custom: Custom,
    deploy: Deploy,
    base: Base,
}

/// The site configuration. Built once at startup and read-only afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    /// The directory containing the configuration file.
    pub root: PathBuf,
    pub dir: Directories,
    pub wiki: Wiki,
    pub custom: Custom,
    pub deploy: Deploy,
    pub base: Base,

    /// Hex SHA-256 of the normalized `wiki.email`, derived at construction.
    pub email_hash: String,
}

impl Config {
    /// Looks for [`CONFIG_FILE_NAME`] in `dir` and then in each of its
    /// ancestors, loading the first one found.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Config::from_project_file(&path)
                .with_context(|| format!("Loading configuration `{}`", path.display()))
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    CONFIG_FILE_NAME
                )),
            }
        }
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        let root = match path.parent() {
            Some(root) if root.as_os_str().is_empty() => PathBuf::from("."),
            Some(root) => root.to_owned(),
            None => {
                return Err(anyhow!(
                    "Can't get parent directory for provided project file path '{:?}'",
                    path
                ))
            }
        };
        Ok(Config::new(root, project))
    }

    /// Parses a configuration from YAML text with `root` as the project root.
    pub fn from_yaml(root: &Path, yaml: &str) -> Result<Config> {
        let project: Project = serde_yaml::from_str(yaml)?;
        Ok(Config::new(root.to_owned(), project))
    }

    fn new(root: PathBuf, project: Project) -> Config {
        let email_hash = identity_hash(&project.wiki.email);
        Config {
            root,
            dir: project.dir,
            wiki: project.wiki,
            custom: project.custom,
            deploy: project.deploy,
            base: project.base,
            email_hash,
        }
    }

    pub fn source_directory(&self) -> PathBuf {
        self.root.join(&self.dir.source)
    }

    pub fn site_directory(&self) -> PathBuf {
        self.root.join(&self.dir.site)
    }

    /// The directory under which page `index.html` files are written.
    pub fn pages_directory(&self) -> PathBuf {
        self.site_directory().join(&self.dir.page)
    }

    pub fn raw_directory(&self) -> PathBuf {
        self.site_directory().join(&self.dir.raw)
    }

    pub fn static_directory(&self) -> PathBuf {
        self.root.join(&self.dir.static_files)
    }

    pub fn theme_directory(&self) -> PathBuf {
        self.root.join(&self.dir.themes).join(&self.wiki.theme)
    }

    pub fn favicon_path(&self) -> PathBuf {
        self.root.join("favicon.ico")
    }

    /// The URL of a page given its link, e.g. `/page/guide/intro/`.
    pub fn page_url(&self, link: &str) -> String {
        format!("{}{}/{}/", self.base_path(), self.dir.page, link)
    }

    /// The URL prefix of the raw source mirror, e.g. `/raw`.
    pub fn raw_url(&self) -> String {
        format!("{}{}", self.base_path(), self.dir.raw)
    }

    fn base_path(&self) -> String {
        match self.base.path.ends_with('/') {
            true => self.base.path.clone(),
            false => format!("{}/", self.base.path),
        }
    }
}

/// The hash used for avatar lookups: the email is trimmed and lowercased
/// before hashing.
pub fn identity_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

impl From<&Config> for Value {
    /// Exposes the configuration to templates.
    fn from(config: &Config) -> Value {
        fn object(fields: Vec<(&str, Value)>) -> Value {
            Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.to_owned(), v))
                    .collect::<HashMap<String, Value>>(),
            )
        }
        let s = |v: &str| Value::String(v.to_owned());

        let toggles = &config.custom.markdown;
        object(vec![
            (
                "dir",
                object(vec![
                    ("page", s(&config.dir.page)),
                    ("raw", s(&config.dir.raw)),
                ]),
            ),
            (
                "wiki",
                object(vec![
                    ("title", s(&config.wiki.title)),
                    ("description", s(&config.wiki.description)),
                    ("email", s(&config.wiki.email)),
                    ("theme", s(&config.wiki.theme)),
                    ("log", Value::Bool(config.wiki.log)),
                    ("favicon", Value::Bool(config.wiki.favicon)),
                ]),
            ),
            (
                "custom",
                object(vec![
                    ("math", Value::Bool(config.custom.math)),
                    ("autospacing", Value::Bool(config.custom.autospacing)),
                    (
                        "markdown",
                        object(vec![
                            ("html", Value::Bool(toggles.html)),
                            ("breaks", Value::Bool(toggles.breaks)),
                            ("typographer", Value::Bool(toggles.typographer)),
                            ("abbr", Value::Bool(toggles.abbr)),
                            ("sup_sub", Value::Bool(toggles.sup_sub)),
                            ("footnote", Value::Bool(toggles.footnote)),
                            ("mark", Value::Bool(toggles.mark)),
                            ("ins", Value::Bool(toggles.ins)),
                        ]),
                    ),
                ]),
            ),
            (
                "deploy",
                object(vec![(
                    "cname",
                    match &config.deploy.cname {
                        Some(cname) => s(cname),
                        None => Value::Nil,
                    },
                )]),
            ),
            ("base", object(vec![("path", s(&config.base_path()))])),
            (
                "runtime",
                object(vec![("email_hash", s(&config.email_hash))]),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() -> Result<()> {
        let config = Config::from_yaml(Path::new("/project"), "{}")?;
        assert_eq!(config.source_directory(), PathBuf::from("/project/notes"));
        assert_eq!(config.pages_directory(), PathBuf::from("/project/site/page"));
        assert_eq!(config.wiki.log_max, 20);
        assert_eq!(config.custom.timestamp, TimestampSource::Mtime);
        assert_eq!(config.custom.last_update, DEFAULT_LAST_UPDATE);
        assert!(config.deploy.cname.is_none());
        Ok(())
    }

    #[test]
    fn test_sections() -> Result<()> {
        let config = Config::from_yaml(
            Path::new("."),
            r#"
dir:
  source: src
  page: p
wiki:
  theme: plain
  log: true
  logmax: 5
custom:
  math: true
  timestamp: frontmatter
  markdown:
    footnote: true
    mark: true
deploy:
  cname: example.com
base:
  path: /wiki
"#,
        )?;
        assert_eq!(config.dir.source, PathBuf::from("src"));
        assert_eq!(config.wiki.log_max, 5);
        assert!(config.custom.math);
        assert_eq!(config.custom.timestamp, TimestampSource::Frontmatter);
        assert!(config.custom.markdown.footnote && config.custom.markdown.mark);
        assert!(!config.custom.markdown.abbr);
        assert_eq!(config.deploy.cname.as_deref(), Some("example.com"));
        assert_eq!(config.page_url("guide/intro"), "/wiki/p/guide/intro/");
        assert_eq!(config.raw_url(), "/wiki/raw");
        Ok(())
    }

    #[test]
    fn test_legacy_keys_and_markdown_options() -> Result<()> {
        let config = Config::from_yaml(
            Path::new("."),
            r#"
wiki:
  logmax: 0
custom:
  mathjax: true
  markdown:
    html: false
    breaks: true
    typographer: true
"#,
        )?;
        assert!(config.custom.math);
        assert_eq!(config.wiki.commit_limit(), 20);
        let toggles = config.custom.markdown;
        assert!(!toggles.html && toggles.breaks && toggles.typographer);

        let defaults = Config::from_yaml(Path::new("."), "{}")?;
        assert!(defaults.custom.markdown.html);
        assert!(!defaults.custom.markdown.typographer);
        Ok(())
    }

    #[test]
    fn test_identity_hash_is_normalized() {
        assert_eq!(identity_hash(" Me@Example.com "), identity_hash("me@example.com"));
        assert_eq!(
            identity_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_from_directory_searches_ancestors() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "wiki:\n  title: Notes\n")?;
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested)?;
        let config = Config::from_directory(&nested)?;
        assert_eq!(config.wiki.title, "Notes");
        assert_eq!(config.root, dir.path());
        Ok(())
    }
}
