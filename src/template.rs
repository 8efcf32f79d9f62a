//! Loads a theme's templates and builds the values they are rendered with.
//!
//! A theme directory holds a `theme.yaml` naming the files that make up
//! each template, e.g.
//!
//! ```yaml
//! index: [partials.html, index.html]
//! page: [partials.html, page.html]
//! changes: [partials.html, changes.html]
//! ```
//!
//! The files of a template are concatenated in order before parsing, so
//! partials can be `define`d once and shared. Theme assets live in the
//! theme's `assets/` directory.

use crate::changelog::Commit;
use crate::config::Config;
use crate::page::{Category, Page};
use gtmpl::{Template, Value};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

const THEME_FILE: &str = "theme.yaml";

#[derive(Deserialize)]
struct ThemeFile {
    index: Vec<PathBuf>,
    page: Vec<PathBuf>,
    #[serde(default)]
    changes: Vec<PathBuf>,
}

/// The template file lists of a theme. Templates are parsed on demand with
/// [`Theme::index`], [`Theme::page`] and [`Theme::changes`].
#[derive(Clone, Debug)]
pub struct Theme {
    pub directory: PathBuf,
    index: Vec<PathBuf>,
    page: Vec<PathBuf>,
    changes: Vec<PathBuf>,
}

impl Theme {
    pub fn load(directory: &Path) -> Result<Theme> {
        let path = directory.join(THEME_FILE);
        let file = File::open(&path).map_err(|err| Error::OpenTemplateFile {
            path: path.clone(),
            err,
        })?;
        let theme: ThemeFile =
            serde_yaml::from_reader(file).map_err(|err| Error::ThemeFile { path, err })?;
        let resolve = |files: Vec<PathBuf>| -> Vec<PathBuf> {
            files.into_iter().map(|f| directory.join(f)).collect()
        };
        Ok(Theme {
            directory: directory.to_owned(),
            index: resolve(theme.index),
            page: resolve(theme.page),
            changes: resolve(theme.changes),
        })
    }

    pub fn assets_directory(&self) -> PathBuf {
        self.directory.join("assets")
    }

    pub fn index(&self) -> Result<Template> {
        parse_template(self.index.iter())
    }

    pub fn page(&self) -> Result<Template> {
        parse_template(self.page.iter())
    }

    pub fn changes(&self) -> Result<Template> {
        if self.changes.is_empty() {
            return Err(Error::MissingTemplate("changes"));
        }
        parse_template(self.changes.iter())
    }
}

// Loads the template file contents, concatenates them, and parses the result
// into a template.
pub fn parse_template<P: AsRef<Path>>(template_files: impl Iterator<Item = P>) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        let template_file = template_file.as_ref();
        let text = std::fs::read_to_string(template_file).map_err(|err| Error::OpenTemplateFile {
            path: template_file.to_owned(),
            err,
        })?;
        contents.push_str(&text);
        contents.push(' ');
    }

    let mut template = Template::default();
    template.parse(&contents).map_err(Error::ParseTemplate)?;
    Ok(template)
}

/// Applies `template` to `context` and returns the output text.
pub fn render(template: &Template, context: Value) -> Result<String> {
    let context = gtmpl::Context::from(context).map_err(Error::Render)?;
    let mut out: Vec<u8> = Vec::new();
    template.execute(&mut out, &context).map_err(Error::Render)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn object(fields: Vec<(&str, Value)>) -> Value {
    Value::Object(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect::<HashMap<String, Value>>(),
    )
}

fn string(s: &str) -> Value {
    Value::String(s.to_owned())
}

/// Converts a [`Page`] into a template value. `url` is where the page is
/// served, which depends on the configuration.
pub fn page_value(page: &Page, config: &Config) -> Value {
    let mut fields = page_fields(page, config);
    fields.push(("content", string(&page.content)));
    object(fields)
}

fn page_fields<'a>(page: &Page, config: &Config) -> Vec<(&'a str, Value)> {
    vec![
        ("title", string(&page.title)),
        ("category", string(&page.category)),
        ("time", string(&page.time)),
        ("link", string(&page.link)),
        ("url", string(&config.page_url(&page.link))),
    ]
}

/// The category listing shared by every page. Pages are listed without
/// their content; only the page being rendered carries it.
pub fn categories_value(categories: &[Category], config: &Config) -> Value {
    Value::Array(
        categories
            .iter()
            .map(|category| {
                object(vec![
                    ("name", string(&category.name)),
                    (
                        "pages",
                        Value::Array(
                            category
                                .pages
                                .iter()
                                .map(|page| object(page_fields(page, config)))
                                .collect(),
                        ),
                    ),
                ])
            })
            .collect(),
    )
}

impl From<&Commit> for Value {
    /// Converts a [`Commit`] into a template value.
    fn from(commit: &Commit) -> Value {
        object(vec![
            ("hash", string(&commit.hash)),
            ("abbrev_hash", string(&commit.abbrev_hash)),
            ("subject", string(&commit.subject)),
            ("author", string(&commit.author)),
            ("date", string(&commit.date)),
        ])
    }
}

/// The data the index and page templates see: `config`, `categories` and
/// `page`, which is an empty object on the index.
pub fn page_context(config: &Value, categories: &Value, page: Option<Value>) -> Value {
    object(vec![
        ("config", config.clone()),
        ("categories", categories.clone()),
        ("page", page.unwrap_or_else(|| Value::Object(HashMap::new()))),
    ])
}

/// The data the changelog template sees: `config`, `commits` and an empty
/// `page`.
pub fn changes_context(config: &Value, commits: &[Commit]) -> Value {
    object(vec![
        ("config", config.clone()),
        ("commits", Value::Array(commits.iter().map(Value::from).collect())),
        ("page", Value::Object(HashMap::new())),
    ])
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Returned for I/O problems while opening template or theme files.
    #[error("opening template file '{}': {err}", path.display())]
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    #[error("reading theme file '{}': {err}", path.display())]
    ThemeFile { path: PathBuf, err: serde_yaml::Error },

    #[error("theme has no `{0}` template")]
    MissingTemplate(&'static str),

    #[error("parsing template: {0}")]
    ParseTemplate(String),

    #[error("rendering template: {0}")]
    Render(String),
}
