//! Converts a note body into HTML. The optional syntax extensions and the
//! CJK autospacing pass are selected from the configuration when the
//! [`Renderer`] is built.
//!
//! Mark (`==x==`), insert (`++x++`), superscript (`^x^`) and subscript
//! (`~x~`) are recognized inside text runs, on the raw text, before it is
//! escaped. Abbreviations and autospacing only ever touch the literal text
//! between those markers.

use crate::config::MarkdownToggles;
use crate::htmlrenderer::{
    escape_html, footnote_ref_id, push_html, HtmlOptions, Rule, Rules, Token,
};
use crate::spacing::spacing;
use pulldown_cmark::{Options, Parser, TextMergeStream};
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::OnceLock;

const INLINE_FOOTNOTE_LABEL: &str = "inline-note-";

/// Renders note bodies. Build one per run and reuse it for every file.
pub struct Renderer {
    toggles: MarkdownToggles,
    autospacing: bool,
    options: Options,
    html_options: HtmlOptions,
}

impl Renderer {
    pub fn new(toggles: MarkdownToggles, autospacing: bool) -> Renderer {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        if toggles.footnote {
            options.insert(Options::ENABLE_FOOTNOTES);
        }
        // The parser only takes flanking forms like `a ^b^ c`; intraword
        // forms like `x^2^` are left to the text rule.
        if toggles.sup_sub {
            options.insert(Options::ENABLE_SUPERSCRIPT);
            options.insert(Options::ENABLE_SUBSCRIPT);
        }
        if toggles.typographer {
            options.insert(Options::ENABLE_SMART_PUNCTUATION);
        }
        Renderer {
            toggles,
            autospacing,
            options,
            html_options: HtmlOptions {
                raw_html: toggles.html,
                hard_breaks: toggles.breaks,
            },
        }
    }

    /// Renders `markdown` to HTML. Malformed markdown is rendered on a best
    /// effort basis; this never fails.
    pub fn render(&self, markdown: &str) -> String {
        let (mut body, abbreviations) = match self.toggles.abbr {
            true => extract_abbreviations(markdown),
            false => (markdown.to_owned(), Vec::new()),
        };
        if self.toggles.footnote {
            if let Some(expanded) = expand_inline_footnotes(&body) {
                body = expanded;
            }
        }
        let rules = self.rules(abbreviations);
        let mut out = String::with_capacity(body.len() * 3 / 2);
        push_html(
            &mut out,
            TextMergeStream::new(Parser::new_ext(&body, self.options)),
            &rules,
            self.html_options,
        );
        out
    }

    /// Autospacing applies to titles and category names as well as bodies.
    pub fn space<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self.autospacing {
            true => spacing(text),
            false => Cow::Borrowed(text),
        }
    }

    fn rules(&self, abbreviations: Vec<(String, String)>) -> Rules {
        Rules {
            heading: Box::new(|t: &Token<'_>| {
                let id = escape_html(&anchor_id(t.content));
                format!(
                    concat!(
                        r##"<h{level} id="{id}"><a href="#{id}" name="{id}" target="_self" "##,
                        r##"class="anchor"><span class="header-link">#</span></a>&nbsp;"##,
                    ),
                    level = t.level,
                    id = id,
                )
            }),
            footnote_ref: Box::new(|t: &Token<'_>| {
                format!(
                    concat!(
                        r##"<sup class="footnote-ref">"##,
                        r##"<a href="#fn{n}" id="{id}" target="_self">[{n}]</a></sup>"##,
                    ),
                    n = t.id,
                    id = footnote_ref_id(t),
                )
            }),
            footnote_anchor: Box::new(|t: &Token<'_>| {
                format!(
                    r##" <a href="#{}" class="footnote-backref" target="_self">↩</a>"##,
                    footnote_ref_id(t)
                )
            }),
            table_open: Box::new(|_: &Token<'_>| {
                String::from("<table class=\"ui celled table\">\n")
            }),
            text: self.text_rule(abbreviations),
        }
    }

    fn text_rule(&self, abbreviations: Vec<(String, String)>) -> Rule {
        let mut markers = Vec::new();
        if self.toggles.mark {
            markers.push(Marker::Mark);
        }
        if self.toggles.ins {
            markers.push(Marker::Ins);
        }
        if self.toggles.sup_sub {
            markers.push(Marker::Sup);
            markers.push(Marker::Sub);
        }
        let text = TextRule {
            autospacing: self.autospacing,
            markers,
            abbreviations: Abbreviations::new(abbreviations),
        };
        Box::new(move |t: &Token<'_>| {
            let mut html = String::with_capacity(t.content.len());
            text.push(t.content, &mut html);
            html
        })
    }
}

/// The anchor id for a heading: its text with every whitespace character
/// replaced by `_`. Identical headings get identical ids.
pub fn anchor_id(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Marker {
    Mark,
    Ins,
    Sup,
    Sub,
}

impl Marker {
    fn tag(self) -> &'static str {
        match self {
            Marker::Mark => "mark",
            Marker::Ins => "ins",
            Marker::Sup => "sup",
            Marker::Sub => "sub",
        }
    }

    fn pattern(self) -> &'static Regex {
        let patterns = patterns();
        match self {
            Marker::Mark => &patterns.mark,
            Marker::Ins => &patterns.ins,
            Marker::Sup => &patterns.sup,
            Marker::Sub => &patterns.sub,
        }
    }
}

struct Patterns {
    mark: Regex,
    ins: Regex,
    sup: Regex,
    sub: Regex,
    abbr_definition: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        mark: Regex::new(r"==([^=\n]+?)==").expect("mark pattern is valid"),
        ins: Regex::new(r"\+\+([^+\n]+?)\+\+").expect("ins pattern is valid"),
        sup: Regex::new(r"\^([^\^\s]+?)\^").expect("sup pattern is valid"),
        sub: Regex::new(r"~([^~\s]+?)~").expect("sub pattern is valid"),
        abbr_definition: Regex::new(r"(?m)^\*\[([^\]\n]+)\]:[ \t]*(.*?)[ \t]*\r?$\n?")
            .expect("abbreviation pattern is valid"),
    })
}

/// Turns the raw text of one text run into HTML.
struct TextRule {
    autospacing: bool,
    markers: Vec<Marker>,
    abbreviations: Option<Abbreviations>,
}

impl TextRule {
    fn push(&self, text: &str, out: &mut String) {
        let mut rest = text;
        while let Some((marker, start, end, inner)) = self.next_marker(rest) {
            self.push_literal(&rest[..start], out);
            let _ = write!(out, "<{}>", marker.tag());
            self.push(inner, out);
            let _ = write!(out, "</{}>", marker.tag());
            rest = &rest[end..];
        }
        self.push_literal(rest, out);
    }

    // The leftmost marker match in `text`; earlier markers win ties.
    fn next_marker<'t>(&self, text: &'t str) -> Option<(Marker, usize, usize, &'t str)> {
        self.markers
            .iter()
            .filter_map(|&marker| {
                let captures = marker.pattern().captures(text)?;
                let whole = captures.get(0)?;
                let inner = captures.get(1)?;
                Some((marker, whole.start(), whole.end(), inner.as_str()))
            })
            .min_by_key(|&(_, start, _, _)| start)
    }

    fn push_literal(&self, text: &str, out: &mut String) {
        if text.is_empty() {
            return;
        }
        let text = match self.autospacing {
            true => spacing(text),
            false => Cow::Borrowed(text),
        };
        match &self.abbreviations {
            Some(abbreviations) => abbreviations.push(&text, out),
            None => out.push_str(&escape_html(&text)),
        }
    }
}

/// Removes `*[ABBR]: Expansion` lines from `markdown`, returning the
/// remaining text and the definitions in document order.
fn extract_abbreviations(markdown: &str) -> (String, Vec<(String, String)>) {
    let pattern = &patterns().abbr_definition;
    let definitions = pattern
        .captures_iter(markdown)
        .map(|c| (c[1].to_owned(), c[2].to_owned()))
        .collect::<Vec<_>>();
    if definitions.is_empty() {
        return (markdown.to_owned(), definitions);
    }
    (pattern.replace_all(markdown, "").into_owned(), definitions)
}

/// Wraps occurrences of defined abbreviations in `<abbr>` elements.
struct Abbreviations {
    pattern: Regex,
    titles: HashMap<String, String>,
}

impl Abbreviations {
    fn new(definitions: Vec<(String, String)>) -> Option<Abbreviations> {
        if definitions.is_empty() {
            return None;
        }
        // Later definitions win, and longer keys are tried first.
        let titles: HashMap<String, String> = definitions.into_iter().collect();
        let mut keys: Vec<&String> = titles.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let word = |c: Option<char>| c.map_or(false, |c| c.is_alphanumeric() || c == '_');
        let alternatives = keys
            .iter()
            .map(|key| {
                format!(
                    "{}{}{}",
                    if word(key.chars().next()) { r"\b" } else { "" },
                    regex::escape(key),
                    if word(key.chars().last()) { r"\b" } else { "" },
                )
            })
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!("(?:{})", alternatives)).ok()?;
        Some(Abbreviations { pattern, titles })
    }

    /// Escapes `text` into `out`, wrapping each abbreviation.
    fn push(&self, text: &str, out: &mut String) {
        let mut last = 0;
        for found in self.pattern.find_iter(text) {
            out.push_str(&escape_html(&text[last..found.start()]));
            let abbr = found.as_str();
            match self.titles.get(abbr) {
                Some(title) => {
                    let _ = write!(
                        out,
                        r#"<abbr title="{}">{}</abbr>"#,
                        escape_html(title),
                        escape_html(abbr)
                    );
                }
                None => out.push_str(&escape_html(abbr)),
            }
            last = found.end();
        }
        out.push_str(&escape_html(&text[last..]));
    }
}

/// Rewrites inline footnotes (`^[text]`) into numbered references with their
/// definitions appended to the document. Fenced code blocks and code spans
/// are left alone. Returns `None` when there is nothing to rewrite.
fn expand_inline_footnotes(markdown: &str) -> Option<String> {
    if !markdown.contains("^[") {
        return None;
    }
    let mut out = String::with_capacity(markdown.len());
    let mut notes: Vec<&str> = Vec::new();
    let mut fence: Option<&str> = None;
    for line in markdown.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let marker = ["```", "~~~"]
            .into_iter()
            .find(|marker| trimmed.starts_with(marker));
        match (fence, marker) {
            (Some(open), Some(close)) if open == close => fence = None,
            (Some(_), _) => {}
            (None, Some(open)) => fence = Some(open),
            (None, None) => {
                expand_line(line, &mut out, &mut notes);
                continue;
            }
        }
        out.push_str(line);
    }
    if notes.is_empty() {
        return None;
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    for (i, note) in notes.iter().enumerate() {
        let _ = write!(out, "\n[^{}{}]: {}\n", INLINE_FOOTNOTE_LABEL, i + 1, note);
    }
    Some(out)
}

fn expand_line<'a>(line: &'a str, out: &mut String, notes: &mut Vec<&'a str>) {
    let mut rest = line;
    loop {
        let tick = rest.find('`');
        let note = rest.find("^[");
        match (tick, note) {
            (Some(t), n) if n.map_or(true, |n| t < n) => {
                // Copy the code span through its closing backticks.
                let run = rest[t..].bytes().take_while(|&b| b == b'`').count();
                let after = t + run;
                let end = rest[after..]
                    .find(&rest[t..after])
                    .map_or(after, |i| after + i + run);
                out.push_str(&rest[..end]);
                rest = &rest[end..];
            }
            (_, Some(n)) => {
                let body = &rest[n + 2..];
                match closing_bracket(body) {
                    Some(len) if len > 0 => {
                        out.push_str(&rest[..n]);
                        notes.push(&body[..len]);
                        let _ = write!(out, "[^{}{}]", INLINE_FOOTNOTE_LABEL, notes.len());
                        rest = &body[len + 1..];
                    }
                    _ => {
                        out.push_str(&rest[..n + 2]);
                        rest = body;
                    }
                }
            }
            _ => {
                out.push_str(rest);
                return;
            }
        }
    }
}

// The byte offset of the `]` closing an inline footnote, allowing nested
// brackets and `\]` escapes. Notes don't span lines.
fn closing_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => depth += 1,
            ']' if depth == 0 => return Some(i),
            ']' => depth -= 1,
            '\n' => return None,
            _ => {}
        }
    }
    None
}
