//! Markdown documents with YAML frontmatter
//!
//! A publishable document starts with a `---` fenced YAML block holding the
//! article properties (`tags`, `title`, `topics`, `cover`, `link`). The
//! editing helpers here work on the raw text line by line so that everything
//! outside the touched key (comments, ordering, quoting) survives a rewrite.

use crate::error::{PreconditionError, Result};
use crate::types::PublishStatus;
use regex::{NoExpand, Regex};
use serde_yaml::Value as Yaml;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Tag a document must carry to be publishable
pub const PUBLISH_TAG: &str = "zhihu";

/// Title used when the document has none
pub const DEFAULT_TITLE: &str = "untitled";

#[allow(clippy::expect_used)] // literal pattern
static FRONTMATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A---\r?\n((?s:.*?))\r?\n---").expect("frontmatter pattern"));

#[allow(clippy::expect_used)] // literal pattern
static FRONTMATTER_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A---\r?\n(?s:.*?)\r?\n---[\r\n]*").expect("frontmatter block pattern"));

#[allow(clippy::expect_used)] // literal pattern
static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(.*?)\]\]").expect("wiki link pattern"));

fn is_key_line(line: &str, key: &str) -> bool {
    line.strip_prefix(key).is_some_and(|rest| rest.starts_with(':'))
}

fn has_key(fm: &str, key: &str) -> bool {
    fm.lines().any(|line| is_key_line(line, key))
}

fn line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Raw text of the frontmatter block (without fences), if present
pub fn frontmatter_text(content: &str) -> Option<&str> {
    FRONTMATTER
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Add `key: value` unless the key already exists
///
/// A document without frontmatter gets a new block holding only this key.
pub fn add_frontmatter(content: &str, key: &str, value: &str) -> String {
    let eol = line_ending(content);
    match frontmatter_text(content) {
        Some(fm) if has_key(fm, key) => {
            tracing::debug!(key, "frontmatter key already present, skipping add");
            content.to_string()
        }
        Some(fm) => {
            let fm = format!("{fm}{eol}{key}: {value}");
            replace_block(content, &fm, eol)
        }
        None => format!("---{eol}{key}: {value}{eol}---{eol}{eol}{content}"),
    }
}

/// Set `key: value`, replacing an existing line or appending one
///
/// A document without frontmatter is returned unchanged.
pub fn update_frontmatter(content: &str, key: &str, value: &str) -> String {
    let Some(fm) = frontmatter_text(content) else {
        tracing::warn!(key, "document has no frontmatter, nothing to update");
        return content.to_string();
    };
    let eol = line_ending(content);
    let replacement = format!("{key}: {value}");
    let fm = if has_key(fm, key) {
        let mut replaced = false;
        fm.lines()
            .map(|line| {
                if !replaced && is_key_line(line, key) {
                    replaced = true;
                    replacement.as_str()
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join(eol)
    } else {
        format!("{fm}{eol}{replacement}")
    };
    replace_block(content, &fm, eol)
}

/// Strip the frontmatter block and the blank lines after it
pub fn remove_frontmatter(content: &str) -> String {
    FRONTMATTER_BLOCK.replace(content, "").into_owned()
}

fn replace_block(content: &str, fm: &str, eol: &str) -> String {
    FRONTMATTER
        .replace(content, NoExpand(&format!("---{eol}{fm}{eol}---")))
        .into_owned()
}

/// Article properties read from a document's frontmatter
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArticleMeta {
    /// Article title
    pub title: Option<String>,
    /// Document tags
    pub tags: Vec<String>,
    /// Requested topics, in document order
    pub topics: Vec<String>,
    /// Persisted article or draft link
    pub link: Option<String>,
    /// Cover reference as written (`[[name]]`)
    pub cover: Option<String>,
}

impl ArticleMeta {
    /// Parse the frontmatter of `content`; `Ok(None)` when there is no block
    pub fn parse(content: &str) -> Result<Option<Self>> {
        let Some(fm) = frontmatter_text(content) else {
            return Ok(None);
        };
        let yaml: Yaml = serde_yaml::from_str(fm)?;
        let get = |key: &str| yaml.get(key).filter(|v| !v.is_null());

        Ok(Some(Self {
            title: get("title").and_then(scalar_string),
            tags: get("tags").map(string_list).unwrap_or_default(),
            topics: get("topics").map(string_list).unwrap_or_default(),
            link: get("link").and_then(scalar_string),
            cover: get("cover").and_then(cover_reference),
        }))
    }

    /// Check the properties the publish flow requires
    pub fn validate(&self) -> std::result::Result<(), PreconditionError> {
        if !self.tags.iter().any(|t| t == PUBLISH_TAG) {
            return Err(PreconditionError::MissingTag(PUBLISH_TAG));
        }
        if self.topics.is_empty() {
            return Err(PreconditionError::MissingTopics);
        }
        if let Some(cover) = &self.cover {
            cover_image_name(cover)?;
        }
        Ok(())
    }

    /// Title to send, defaulting to `untitled`
    pub fn title_or_default(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TITLE)
    }

    /// Publish status derived from `link`
    pub fn status(&self) -> PublishStatus {
        PublishStatus::from_link(self.link.as_deref())
    }
}

/// Image name inside a `[[name]]` cover reference
pub fn cover_image_name(cover: &str) -> std::result::Result<String, PreconditionError> {
    WIKI_LINK
        .captures(cover)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| PreconditionError::InvalidCoverReference(cover.to_string()))
}

fn scalar_string(value: &Yaml) -> Option<String> {
    let s = match value {
        Yaml::String(s) => s.clone(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        _ => return None,
    };
    let s = s.trim().to_string();
    (!s.is_empty()).then_some(s)
}

fn string_list(value: &Yaml) -> Vec<String> {
    match value {
        Yaml::Sequence(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}

// `cover: [[name]]` without quotes parses as a nested sequence
fn cover_reference(value: &Yaml) -> Option<String> {
    match value {
        Yaml::Sequence(outer) => match outer.as_slice() {
            [Yaml::Sequence(inner)] => match inner.as_slice() {
                [name] => scalar_string(name).map(|n| format!("[[{n}]]")),
                _ => None,
            },
            _ => None,
        },
        other => scalar_string(other),
    }
}

/// Initial text of a new article for the given draft link
pub fn scaffold(draft_link: &str) -> String {
    let mut content = String::new();
    content = add_frontmatter(&content, "tags", PUBLISH_TAG);
    content = add_frontmatter(&content, "title", DEFAULT_TITLE);
    content = add_frontmatter(&content, "topics", "");
    add_frontmatter(&content, "link", draft_link)
}

/// First free `untitled.md` / `untitled N.md` path in `dir`
pub fn next_untitled_path(dir: &Path) -> PathBuf {
    let mut candidate = dir.join(format!("{DEFAULT_TITLE}.md"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{DEFAULT_TITLE} {counter}.md"));
        counter += 1;
    }
    candidate
}
