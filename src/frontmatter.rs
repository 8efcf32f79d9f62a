//! Splits a note into its header and body.
//!
//! A note starts with exactly three labelled header lines followed by a
//! `---` line with a newline on either side:
//!
//! ```md
//! title: Hello, world!
//! category: Greetings
//! time: 2021-04-16
//! ---
//! # Hello
//! ```
//!
//! Labels are matched case-insensitively and may be followed by a single
//! whitespace character after the colon. A byte order mark or indentation
//! before a label is ignored.

use thiserror::Error;

const DELIMITER: &str = "\n---\n";

/// The parsed header of a note plus the text after the delimiter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frontmatter<'a> {
    pub title: &'a str,
    pub category: &'a str,
    pub time: &'a str,
    pub body: &'a str,
}

pub fn parse(input: &str) -> Result<Frontmatter<'_>> {
    let end = input.find(DELIMITER).ok_or(Error::MissingDelimiter)?;
    let mut lines = input[..end].split('\n');
    let title = field(&mut lines, "title")?;
    let category = field(&mut lines, "category")?;
    let time = field(&mut lines, "time")?;
    Ok(Frontmatter {
        title,
        category,
        time,
        body: &input[end + DELIMITER.len()..],
    })
}

fn field<'a>(lines: &mut impl Iterator<Item = &'a str>, label: &'static str) -> Result<&'a str> {
    let line = lines.next().ok_or(Error::MissingLines)?;
    labelled(line.trim_end_matches('\r'), label).ok_or(Error::MissingLabel(label))
}

/// Returns what follows `label:` on `line`.
fn labelled<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = line.trim_start_matches('\u{feff}').trim_start();
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = line[label.len()..].strip_prefix(':')?;
    match rest.chars().next() {
        Some(c) if c.is_whitespace() => Some(&rest[c.len_utf8()..]),
        _ => Some(rest),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("missing `---` header delimiter")]
    MissingDelimiter,

    #[error("header must have title, category and time lines")]
    MissingLines,

    #[error("header line is missing the `{0}:` label")]
    MissingLabel(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let input = "title: Intro\ncategory: Guide\ntime: 2021-01-01\n---\nHello **World**";
        assert_eq!(
            parse(input),
            Ok(Frontmatter {
                title: "Intro",
                category: "Guide",
                time: "2021-01-01",
                body: "Hello **World**",
            })
        );
    }

    #[test]
    fn test_labels_are_case_insensitive_with_optional_space() {
        let fm = parse("TITLE:Intro\nCategory:  Guide\ntime:2021\n---\n").unwrap();
        assert_eq!(fm.title, "Intro");
        // only one whitespace character is consumed
        assert_eq!(fm.category, " Guide");
        assert_eq!(fm.time, "2021");
        assert_eq!(fm.body, "");
    }

    #[test]
    fn test_byte_order_mark() {
        let fm = parse("\u{feff}title: A\ncategory: B\ntime: C\n---\nbody").unwrap();
        assert_eq!((fm.title, fm.category, fm.time), ("A", "B", "C"));
        assert_eq!(fm.body, "body");
    }

    #[test]
    fn test_indented_labels() {
        let fm = parse("  title: A\n\tcategory: B\n time: C\n---\n").unwrap();
        assert_eq!((fm.title, fm.category, fm.time), ("A", "B", "C"));
    }

    #[test]
    fn test_crlf_header_lines() {
        let fm = parse("title: A\r\ncategory: B\r\ntime: C\r\n---\nbody").unwrap();
        assert_eq!((fm.title, fm.category, fm.time), ("A", "B", "C"));
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(parse("title: A\ncategory: B\ntime: C\n"), Err(Error::MissingDelimiter));
        assert_eq!(parse("title: A\ncategory: B\n---\n"), Err(Error::MissingLines));
        assert_eq!(
            parse("title: A\nkind: B\ntime: C\n---\n"),
            Err(Error::MissingLabel("category"))
        );
        assert_eq!(
            parse("name: A\ncategory: B\ntime: C\n---\n"),
            Err(Error::MissingLabel("title"))
        );
    }
}
