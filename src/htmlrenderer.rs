//! Renders markdown [`Event`]s into HTML. This is modeled after
//! [`pulldown_cmark`]'s private `HtmlWriter`, except that five pieces of
//! output are delegated to a [`Rules`] value chosen when the renderer is
//! built: heading open tags, footnote references, footnote back-references,
//! table open tags and plain text.
//!
//! Footnote definitions are collected while rendering and emitted at the end
//! of the document, numbered in order of first reference.

use pulldown_cmark::{Alignment, CodeBlockKind, CowStr, Event, LinkType, Tag};
use std::collections::HashMap;

/// How raw HTML and soft breaks are written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Write HTML blocks and inline HTML as is. When false they are escaped.
    pub raw_html: bool,

    /// Write soft line breaks as `<br />`.
    pub hard_breaks: bool,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        HtmlOptions {
            raw_html: true,
            hard_breaks: false,
        }
    }
}

/// What a [`Rule`] gets to render from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Token<'a> {
    /// Text for text rules, the plain heading text for heading rules.
    pub content: &'a str,

    /// Heading level, 1 through 6.
    pub level: u32,

    /// Footnote number, starting at 1.
    pub id: usize,

    /// How many times this footnote was referenced before this reference.
    pub sub_id: usize,
}

/// A rule turns a token into an HTML fragment.
pub type Rule = Box<dyn Fn(&Token<'_>) -> String + Send + Sync>;

/// The overridable parts of the HTML output.
pub struct Rules {
    pub heading: Rule,
    pub footnote_ref: Rule,
    pub footnote_anchor: Rule,
    pub table_open: Rule,
    pub text: Rule,
}

impl Default for Rules {
    /// Plain rules: bare heading and table tags, numbered footnote links and
    /// escaped text.
    fn default() -> Self {
        Rules {
            heading: Box::new(|t: &Token<'_>| format!("<h{}>", t.level)),
            footnote_ref: Box::new(|t: &Token<'_>| {
                format!(
                    r##"<sup class="footnote-ref"><a href="#fn{n}" id="{id}">[{n}]</a></sup>"##,
                    n = t.id,
                    id = footnote_ref_id(t),
                )
            }),
            footnote_anchor: Box::new(|t: &Token<'_>| {
                format!(
                    r##" <a href="#{}" class="footnote-backref">↩</a>"##,
                    footnote_ref_id(t)
                )
            }),
            table_open: Box::new(|_: &Token<'_>| String::from("<table>\n")),
            text: Box::new(|t: &Token<'_>| escape_html(t.content)),
        }
    }
}

/// The element id of a footnote reference: `fnref{n}`, or `fnref{n}:{k}`
/// for the k-th repeated reference to the same footnote.
pub fn footnote_ref_id(token: &Token<'_>) -> String {
    match token.sub_id {
        0 => format!("fnref{}", token.id),
        sub_id => format!("fnref{}:{}", token.id, sub_id),
    }
}

/// Escapes `&`, `<`, `>` and `"`.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    // Writing to a `String` can't fail.
    let _ = pulldown_cmark_escape::escape_html(&mut out, s);
    out
}

/// Percent-encodes and escapes a URL for an `href` or `src` attribute.
pub fn escape_href(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let _ = pulldown_cmark_escape::escape_href(&mut out, s);
    out
}

enum TableState {
    Head,
    Body,
}

/// How to close the element opened by a [`Tag`].
enum Close {
    Html(&'static str),
    Heading(u32),
    FootnoteDefinition(String),
    Image(String),
    TableHead,
    TableCell,
    CodeBlock,
}

struct HtmlRenderer<'r> {
    rules: &'r Rules,
    options: HtmlOptions,

    /// Output buffers. Headings and footnote definitions render into a
    /// buffer of their own which is spliced in when they close.
    out: String,
    buffers: Vec<String>,
    closers: Vec<Close>,

    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,

    /// Plain text of the heading being rendered, if any.
    heading_text: Option<String>,
    in_code_block: bool,
    image_depth: usize,

    /// Footnote labels in order of first reference.
    footnote_order: Vec<String>,
    footnote_refs: HashMap<String, usize>,
    footnote_definitions: HashMap<String, String>,
}

impl<'r> HtmlRenderer<'r> {
    fn new(rules: &'r Rules, options: HtmlOptions) -> Self {
        HtmlRenderer {
            rules,
            options,
            out: String::new(),
            buffers: Vec::new(),
            closers: Vec::new(),
            table_alignments: Vec::new(),
            table_state: TableState::Head,
            table_cell_index: 0,
            heading_text: None,
            in_code_block: false,
            image_depth: 0,
            footnote_order: Vec::new(),
            footnote_refs: HashMap::new(),
            footnote_definitions: HashMap::new(),
        }
    }

    fn w(&mut self) -> &mut String {
        match self.buffers.last_mut() {
            Some(buffer) => buffer,
            None => &mut self.out,
        }
    }

    fn write(&mut self, s: &str) {
        self.w().push_str(s)
    }

    fn on_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.on_start(tag),
            Event::End(_) => self.on_end(),
            Event::Text(text) => self.on_text(text),
            Event::Code(code) => {
                if let Some(heading) = self.heading_text.as_mut() {
                    heading.push_str(&code);
                }
                let html = match self.image_depth {
                    0 => format!("<code>{}</code>", escape_html(&code)),
                    _ => escape_html(&code),
                };
                self.write(&html)
            }
            Event::Html(html) | Event::InlineHtml(html) => match self.options.raw_html {
                true => self.write(&html),
                false => {
                    let escaped = escape_html(&html);
                    self.write(&escaped)
                }
            },
            Event::FootnoteReference(name) => self.on_footnote_reference(name),
            Event::SoftBreak => match self.options.hard_breaks {
                true => self.write("<br />\n"),
                false => self.write("\n"),
            },
            Event::HardBreak => self.write("<br />\n"),
            Event::Rule => self.write("<hr />\n"),
            Event::TaskListMarker(checked) => self.write(match checked {
                true => r#"<input disabled="" type="checkbox" checked="" />"#,
                false => r#"<input disabled="" type="checkbox" />"#,
            }),
            _ => {}
        }
    }

    fn on_start(&mut self, tag: Tag<'_>) {
        // Inside an image only the plain text is kept, for the alt attribute.
        if self.image_depth > 0 {
            self.closers.push(Close::Html(""));
            return;
        }
        let close = match tag {
            Tag::Paragraph => {
                self.write("<p>");
                Close::Html("</p>\n")
            }
            Tag::Heading { level, .. } => {
                self.heading_text = Some(String::new());
                self.buffers.push(String::new());
                Close::Heading(level as u32)
            }
            Tag::BlockQuote(_) => {
                self.write("<blockquote>\n");
                Close::Html("</blockquote>\n")
            }
            Tag::CodeBlock(kind) => {
                self.in_code_block = true;
                let html = match kind {
                    CodeBlockKind::Fenced(info) => match info.split(' ').next() {
                        Some(lang) if !lang.is_empty() => {
                            format!(r#"<pre><code class="language-{}">"#, escape_html(lang))
                        }
                        _ => String::from("<pre><code>"),
                    },
                    CodeBlockKind::Indented => String::from("<pre><code>"),
                };
                self.write(&html);
                Close::CodeBlock
            }
            Tag::List(None) => {
                self.write("<ul>\n");
                Close::Html("</ul>\n")
            }
            Tag::List(Some(1)) => {
                self.write("<ol>\n");
                Close::Html("</ol>\n")
            }
            Tag::List(Some(start)) => {
                let html = format!("<ol start=\"{}\">\n", start);
                self.write(&html);
                Close::Html("</ol>\n")
            }
            Tag::Item => {
                self.write("<li>");
                Close::Html("</li>\n")
            }
            Tag::FootnoteDefinition(name) => {
                self.buffers.push(String::new());
                Close::FootnoteDefinition(name.to_string())
            }
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                self.table_state = TableState::Head;
                let html = (self.rules.table_open)(&Token::default());
                self.write(&html);
                Close::Html("</tbody></table>\n")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                self.write("<thead><tr>");
                Close::TableHead
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                self.write("<tr>");
                Close::Html("</tr>\n")
            }
            Tag::TableCell => {
                let html = format!(
                    "<{}{}>",
                    self.cell_tag(),
                    match self.table_alignments.get(self.table_cell_index) {
                        Some(Alignment::Left) => r#" align="left""#,
                        Some(Alignment::Right) => r#" align="right""#,
                        Some(Alignment::Center) => r#" align="center""#,
                        _ => "",
                    }
                );
                self.write(&html);
                Close::TableCell
            }
            Tag::Emphasis => {
                self.write("<em>");
                Close::Html("</em>")
            }
            Tag::Strong => {
                self.write("<strong>");
                Close::Html("</strong>")
            }
            Tag::Strikethrough => {
                self.write("<del>");
                Close::Html("</del>")
            }
            Tag::Superscript => {
                self.write("<sup>");
                Close::Html("</sup>")
            }
            Tag::Subscript => {
                self.write("<sub>");
                Close::Html("</sub>")
            }
            Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            } => {
                let scheme = match link_type {
                    LinkType::Email => "mailto:",
                    _ => "",
                };
                let html = format!(
                    r#"<a href="{}{}"{}>"#,
                    scheme,
                    escape_href(&dest_url),
                    title_attribute(&title),
                );
                self.write(&html);
                Close::Html("</a>")
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                let html = format!(r#"<img src="{}" alt=""#, escape_href(&dest_url));
                self.write(&html);
                self.image_depth += 1;
                Close::Image(title.to_string())
            }
            _ => Close::Html(""),
        };
        self.closers.push(close);
    }

    fn on_end(&mut self) {
        let close = match self.closers.pop() {
            Some(close) => close,
            None => return,
        };
        match close {
            Close::Html(html) => self.write(html),
            Close::Heading(level) => {
                let inner = self.buffers.pop().unwrap_or_default();
                let text = self.heading_text.take().unwrap_or_default();
                let open = (self.rules.heading)(&Token {
                    content: &text,
                    level,
                    ..Token::default()
                });
                let html = format!("{}{}</h{}>\n", open, inner, level);
                self.write(&html);
            }
            Close::FootnoteDefinition(name) => {
                let body = self.buffers.pop().unwrap_or_default();
                self.footnote_definitions.insert(name, body);
            }
            Close::Image(title) => {
                self.image_depth -= 1;
                let html = format!(r#""{} />"#, title_attribute(&title));
                self.write(&html);
            }
            Close::TableHead => {
                self.table_state = TableState::Body;
                self.write("</tr></thead><tbody>\n");
            }
            Close::TableCell => {
                let html = format!("</{}>", self.cell_tag());
                self.table_cell_index += 1;
                self.write(&html);
            }
            Close::CodeBlock => {
                self.in_code_block = false;
                self.write("</code></pre>\n");
            }
        }
    }

    fn cell_tag(&self) -> &'static str {
        match self.table_state {
            TableState::Head => "th",
            TableState::Body => "td",
        }
    }

    fn on_text(&mut self, text: CowStr<'_>) {
        if let Some(heading) = self.heading_text.as_mut() {
            heading.push_str(&text);
        }
        // Code and image alt text are literal; only prose goes through the
        // text rule.
        let html = if self.in_code_block || self.image_depth > 0 {
            escape_html(&text)
        } else {
            (self.rules.text)(&Token {
                content: &text,
                ..Token::default()
            })
        };
        self.write(&html);
    }

    fn on_footnote_reference(&mut self, name: CowStr<'_>) {
        let id = match self.footnote_order.iter().position(|n| n.as_str() == &*name) {
            Some(i) => i + 1,
            None => {
                self.footnote_order.push(name.to_string());
                self.footnote_order.len()
            }
        };
        let count = self.footnote_refs.entry(name.to_string()).or_insert(0);
        let sub_id = *count;
        *count += 1;
        let html = (self.rules.footnote_ref)(&Token {
            id,
            sub_id,
            ..Token::default()
        });
        self.write(&html);
    }

    /// Appends the referenced footnote definitions and returns the document.
    fn finish(mut self) -> String {
        // Unbalanced buffers can't happen with a well-formed event stream,
        // but don't lose their content if they do.
        while let Some(buffer) = self.buffers.pop() {
            self.out.push_str(&buffer);
        }

        let mut items = String::new();
        for (i, name) in self.footnote_order.iter().enumerate() {
            let body = match self.footnote_definitions.get(name) {
                Some(body) => body.trim_end(),
                None => continue,
            };
            let anchor = (self.rules.footnote_anchor)(&Token {
                id: i + 1,
                ..Token::default()
            });
            let body = match body.strip_suffix("</p>") {
                Some(head) => format!("{}{}</p>", head, anchor),
                None => format!("{}{}", body, anchor),
            };
            items.push_str(&format!(
                "<li id=\"fn{}\" class=\"footnote-item\">{}</li>\n",
                i + 1,
                body
            ));
        }
        if !items.is_empty() {
            self.out.push_str(concat!(
                "<hr class=\"footnotes-sep\" />\n",
                "<section class=\"footnotes\">\n",
                "<ol class=\"footnotes-list\">\n"
            ));
            self.out.push_str(&items);
            self.out.push_str("</ol>\n</section>\n");
        }
        self.out
    }
}

fn title_attribute(title: &str) -> String {
    match title.is_empty() {
        true => String::new(),
        false => format!(r#" title="{}""#, escape_html(title)),
    }
}

/// Converts [`Event`]s into an HTML string using `rules` for the overridable
/// parts of the output.
pub fn push_html<'a, I>(out: &mut String, events: I, rules: &Rules, options: HtmlOptions)
where
    I: Iterator<Item = Event<'a>>,
{
    let mut renderer = HtmlRenderer::new(rules, options);
    for event in events {
        renderer.on_event(event);
    }
    out.push_str(&renderer.finish());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark::{Options, Parser};

    fn render_with(markdown: &str, rules: &Rules, options: HtmlOptions) -> String {
        let mut out = String::new();
        let parser = Parser::new_ext(
            markdown,
            Options::ENABLE_FOOTNOTES | Options::ENABLE_TABLES,
        );
        push_html(&mut out, parser, rules, options);
        out
    }

    fn render(markdown: &str, rules: &Rules) -> String {
        render_with(markdown, rules, HtmlOptions::default())
    }

    #[test]
    fn test_basic_blocks() {
        let html = render("# Title\n\nHello **World** & `a<b>`\n", &Rules::default());
        assert_eq!(
            html,
            "<h1>Title</h1>\n<p>Hello <strong>World</strong> &amp; <code>a&lt;b&gt;</code></p>\n"
        );
    }

    #[test]
    fn test_rules_are_used() {
        let rules = Rules {
            heading: Box::new(|t: &Token<'_>| {
                format!("<h{} data-text=\"{}\">", t.level, t.content)
            }),
            text: Box::new(|t: &Token<'_>| t.content.to_uppercase()),
            table_open: Box::new(|_: &Token<'_>| String::from("<table class=\"x\">\n")),
            ..Rules::default()
        };
        let html = render("## Some `code` here\n\n|a|\n|-|\n|b|\n", &rules);
        assert!(html.starts_with(
            "<h2 data-text=\"Some code here\">SOME <code>code</code> HERE</h2>\n"
        ));
        assert!(html.contains(concat!(
            "<table class=\"x\">\n<thead><tr><th>A</th></tr></thead><tbody>\n",
            "<tr><td>B</td></tr>\n</tbody></table>"
        )));
    }

    #[test]
    fn test_code_blocks_bypass_text_rule() {
        let rules = Rules {
            text: Box::new(|_: &Token<'_>| String::from("!")),
            ..Rules::default()
        };
        let html = render("```rust\nlet x = 1 < 2;\n```\n", &rules);
        assert_eq!(
            html,
            "<pre><code class=\"language-rust\">let x = 1 &lt; 2;\n</code></pre>\n"
        );
    }

    #[test]
    fn test_footnotes() {
        let html = render(
            "A[^b] and B[^a] and A again[^b].\n\n[^a]: Second.\n\n[^b]: First.\n",
            &Rules::default(),
        );
        assert!(html.contains(r##"<a href="#fn1" id="fnref1">[1]</a>"##));
        assert!(html.contains(r##"<a href="#fn2" id="fnref2">[2]</a>"##));
        assert!(html.contains(r##"<a href="#fn1" id="fnref1:1">[1]</a>"##));
        let first = html.find("<li id=\"fn1\"").unwrap();
        let second = html.find("<li id=\"fn2\"").unwrap();
        assert!(first < second);
        assert!(html.contains(concat!(
            "<li id=\"fn1\" class=\"footnote-item\"><p>First. ",
            "<a href=\"#fnref1\" class=\"footnote-backref\">↩</a></p></li>"
        )));
    }

    #[test]
    fn test_links_and_images() {
        let html = render(
            "[x](http://a.b/?q=1&r=2 \"T\") ![alt *text*](i.png)\n",
            &Rules::default(),
        );
        assert_eq!(
            html,
            concat!(
                "<p><a href=\"http://a.b/?q=1&amp;r=2\" title=\"T\">x</a> ",
                "<img src=\"i.png\" alt=\"alt text\" /></p>\n"
            )
        );
    }

    #[test]
    fn test_urls_are_percent_encoded() {
        let html = render("[x](<a b.md>) ![y](<my pic.png>)\n", &Rules::default());
        assert_eq!(
            html,
            "<p><a href=\"a%20b.md\">x</a> <img src=\"my%20pic.png\" alt=\"y\" /></p>\n"
        );
    }

    #[test]
    fn test_raw_html_and_breaks() {
        let markdown = "a <b>c</b>\nd\n";
        assert_eq!(
            render(markdown, &Rules::default()),
            "<p>a <b>c</b>\nd</p>\n"
        );
        let options = HtmlOptions {
            raw_html: false,
            hard_breaks: true,
        };
        assert_eq!(
            render_with(markdown, &Rules::default(), options),
            "<p>a &lt;b&gt;c&lt;/b&gt;<br />\nd</p>\n"
        );
    }
}
