//! Typesets `^^^math … ^^^` blocks in a note body.
//!
//! Blocks are typeset one at a time, left to right, and each result replaces
//! its own block by position, so two byte-identical blocks each get their own
//! result.

use async_trait::async_trait;
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;
use thiserror::Error;

/// Input notations a [`Typesetter`] may be asked to accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notation {
    Tex,
    MathMl,
}

/// The notations math blocks may be written in.
pub const INPUT_NOTATIONS: &[Notation] = &[Notation::Tex, Notation::MathMl];

/// Converts a math expression into markup.
#[async_trait]
pub trait Typesetter: Send + Sync {
    async fn typeset(&self, expression: &str, inputs: &[Notation]) -> Result<String>;
}

/// Typesets into MathML. MathML input is passed through as is, TeX is
/// converted with [`latex2mathml`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MathMlTypesetter;

#[async_trait]
impl Typesetter for MathMlTypesetter {
    async fn typeset(&self, expression: &str, inputs: &[Notation]) -> Result<String> {
        let expression = expression.trim();
        if inputs.contains(&Notation::MathMl) && expression.starts_with("<math") {
            return Ok(expression.to_owned());
        }
        if !inputs.contains(&Notation::Tex) {
            return Err(Error::UnsupportedNotation(expression.to_owned()));
        }
        let tex = expression.to_owned();
        tokio::task::spawn_blocking(move || {
            latex2mathml::latex_to_mathml(&tex, latex2mathml::DisplayStyle::Block).map_err(|err| {
                Error::Typeset {
                    expression: tex.clone(),
                    message: err.to_string(),
                }
            })
        })
        .await?
    }
}

/// A math block found in a body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MathBlock<'a> {
    /// The byte range of the whole block, markers included.
    pub range: Range<usize>,

    /// The text between the markers.
    pub expression: &'a str,
}

fn block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\^{3}math(.*?)\^{3}").expect("math pattern is valid"))
}

/// Finds the math blocks in `body`, in order.
pub fn find_blocks(body: &str) -> Vec<MathBlock<'_>> {
    block_pattern()
        .captures_iter(body)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let inner = c.get(1)?;
            Some(MathBlock {
                range: whole.range(),
                expression: inner.as_str(),
            })
        })
        .collect()
}

/// Replaces every math block in `body` with its typeset markup. Text outside
/// the blocks is kept byte for byte. When `enabled` is false, a body with
/// blocks is returned unchanged with a warning.
pub async fn process(body: &str, enabled: bool, typesetter: &dyn Typesetter) -> Result<String> {
    let blocks = find_blocks(body);
    if blocks.is_empty() {
        return Ok(body.to_owned());
    }
    if !enabled {
        tracing::warn!(
            "{} math block(s) found while math rendering is disabled; leaving them as is",
            blocks.len()
        );
        return Ok(body.to_owned());
    }

    let mut out = String::with_capacity(body.len());
    let mut last = 0;
    for block in &blocks {
        // One call at a time; the next block waits for this one.
        let markup = typesetter.typeset(block.expression, INPUT_NOTATIONS).await?;
        out.push_str(&body[last..block.range.start]);
        out.push_str(&markup);
        last = block.range.end;
    }
    out.push_str(&body[last..]);
    Ok(out)
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("typesetting `{expression}`: {message}")]
    Typeset { expression: String, message: String },

    #[error("no accepted notation for `{0}`")]
    UnsupportedNotation(String),

    #[error("typesetting task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
