//! Markdown to platform HTML
//!
//! The editor accepts a restricted HTML dialect. [`ZhihuHtmlRenderer`]
//! produces it from CommonMark plus a few platform conventions:
//!
//! - `$$…$$` and `$…$` equations outside code become `<img eeimg="1">` tags pointing at
//!   the equation service
//! - fenced code becomes `<pre lang="…">`
//! - pipe tables become `<table data-draft-node="block" …>` with a single
//!   `<tbody>` (the header row is the first `<tr>` of `<th>` cells)
//! - single newlines inside a paragraph are kept as `<br>`

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

#[allow(clippy::expect_used)] // literal pattern
static BLOCK_EQUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$([^$]+)\$\$").expect("block equation pattern"));

#[allow(clippy::expect_used)] // literal pattern
static INLINE_EQUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[^\\])\$([^$\n]+?)\$").expect("inline equation pattern"));

/// Converts document bodies to the platform's HTML dialect
pub trait ContentRenderer: Send + Sync {
    /// Render `markdown` (frontmatter already removed, images already resolved)
    fn render(&self, markdown: &str) -> String;
}

/// Default renderer
#[derive(Clone, Copy, Debug, Default)]
pub struct ZhihuHtmlRenderer;

impl ContentRenderer for ZhihuHtmlRenderer {
    fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let with_equations = replace_equations(markdown, options);
        let parser = Parser::new_ext(&with_equations, options);

        let mut state = RenderState::default();
        let events = parser.filter_map(|event| state.map(event));

        let mut out = String::with_capacity(with_equations.len() * 3 / 2);
        html::push_html(&mut out, events);
        out
    }
}

fn equation_tag(tex: &str) -> String {
    let tex: String = tex.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    format!(
        r#"<img eeimg="1" src="//www.zhihu.com/equation?tex={}" alt="{}"/>"#,
        urlencoding::encode(&tex),
        escape_html(&tex)
    )
}

/// Replace equations everywhere except inside code blocks and code spans
fn replace_equations(markdown: &str, options: Options) -> String {
    let code: Vec<Range<usize>> = Parser::new_ext(markdown, options)
        .into_offset_iter()
        .filter(|(event, _)| matches!(event, Event::Start(Tag::CodeBlock(_)) | Event::Code(_)))
        .map(|(_, range)| range)
        .collect();

    let mut out = String::with_capacity(markdown.len());
    let mut cursor = 0;
    for range in code {
        if range.start < cursor {
            continue;
        }
        out.push_str(&replace_equations_in(&markdown[cursor..range.start]));
        out.push_str(&markdown[range.clone()]);
        cursor = range.end;
    }
    out.push_str(&replace_equations_in(&markdown[cursor..]));
    out
}

fn replace_equations_in(text: &str) -> String {
    let blocks = BLOCK_EQUATION.replace_all(text, |caps: &Captures<'_>| equation_tag(&caps[1]));
    INLINE_EQUATION
        .replace_all(&blocks, |caps: &Captures<'_>| {
            format!("{}{}", &caps[1], equation_tag(&caps[2]))
        })
        .into_owned()
}

#[derive(Default)]
struct RenderState {
    code: Option<(String, String)>,
    in_table_head: bool,
}

impl RenderState {
    fn map<'a>(&mut self, event: Event<'a>) -> Option<Event<'a>> {
        if let Some((_, buffer)) = self.code.as_mut() {
            return match event {
                Event::Text(text) => {
                    buffer.push_str(&text);
                    None
                }
                Event::End(TagEnd::CodeBlock) => {
                    let (lang, body) = self.code.take().unwrap_or_default();
                    Some(html_event(format!(
                        "<pre lang=\"{}\">{}</pre>\n",
                        escape_html(&lang),
                        escape_html(body.trim())
                    )))
                }
                _ => None,
            };
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or("").to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((lang, String::new()));
                None
            }
            Event::Start(Tag::Table(_)) => Some(html_event(
                "<table data-draft-node=\"block\" data-draft-type=\"table\" data-size=\"normal\">\n<tbody>"
                    .to_string(),
            )),
            Event::End(TagEnd::Table) => Some(html_event("\n</tbody>\n</table>\n".to_string())),
            Event::Start(Tag::TableHead) => {
                self.in_table_head = true;
                Some(html_event("<tr>".to_string()))
            }
            Event::End(TagEnd::TableHead) => {
                self.in_table_head = false;
                Some(html_event("</tr>".to_string()))
            }
            Event::Start(Tag::TableRow) => Some(html_event("\n<tr>".to_string())),
            Event::End(TagEnd::TableRow) => Some(html_event("</tr>".to_string())),
            Event::Start(Tag::TableCell) => Some(html_event(
                if self.in_table_head { "<th>" } else { "<td>" }.to_string(),
            )),
            Event::End(TagEnd::TableCell) => Some(html_event(
                if self.in_table_head { "</th>" } else { "</td>" }.to_string(),
            )),
            Event::SoftBreak => Some(Event::HardBreak),
            other => Some(other),
        }
    }
}

fn html_event<'a>(html: String) -> Event<'a> {
    Event::Html(CowStr::from(html))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
