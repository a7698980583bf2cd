//! Read-only feeds (hot list, followed activity)

use super::ZhihuClient;
use crate::error::{Error, Result};
use crate::request::{Action, cookie_set};
use crate::types::Step;
use reqwest::header::HeaderName;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// API version the feed endpoints are served under
const API_VERSION_HEADER: HeaderName = HeaderName::from_static("x-api-version");
const API_VERSION: &str = "3.0.53";

/// Hot list item type
const HOT_LIST_ITEM: &str = "hot_list_feed";
/// Advert item type in the follow feed
const ADVERT_ITEM: &str = "feed_advert";

/// Question an answer belongs to
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRef {
    /// Question id
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    /// Question title
    #[serde(default)]
    pub title: String,
}

/// Content a feed item points at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedTarget {
    /// Column article
    Article {
        /// Article id
        #[serde(default, deserialize_with = "id_string")]
        id: String,
        /// Title
        #[serde(default)]
        title: String,
        /// Plain-text excerpt
        #[serde(default)]
        excerpt: String,
        /// Newer excerpt format, preferred when present
        #[serde(default)]
        excerpt_new: Option<String>,
        /// Full HTML body
        #[serde(default)]
        content: Option<String>,
        /// Link
        #[serde(default)]
        url: Option<String>,
    },
    /// Answer to a question
    Answer {
        /// Answer id
        #[serde(default, deserialize_with = "id_string")]
        id: String,
        /// The question answered
        #[serde(default)]
        question: QuestionRef,
        /// Plain-text excerpt
        #[serde(default)]
        excerpt: String,
        /// Newer excerpt format, preferred when present
        #[serde(default)]
        excerpt_new: Option<String>,
        /// Full HTML body
        #[serde(default)]
        content: Option<String>,
        /// Link
        #[serde(default)]
        url: Option<String>,
    },
    /// Question
    Question {
        /// Question id
        #[serde(default, deserialize_with = "id_string")]
        id: String,
        /// Title
        #[serde(default)]
        title: String,
        /// Plain-text excerpt
        #[serde(default)]
        excerpt: String,
        /// Link
        #[serde(default)]
        url: Option<String>,
    },
    /// Short post
    Pin {
        /// Pin id
        #[serde(default, deserialize_with = "id_string")]
        id: String,
        /// Plain-text excerpt
        #[serde(default)]
        excerpt_title: String,
        /// Link
        #[serde(default)]
        url: Option<String>,
    },
    /// Any other target type
    #[serde(other)]
    Unknown,
}

impl FeedTarget {
    /// Id of the target, if it has one
    pub fn id(&self) -> Option<&str> {
        match self {
            FeedTarget::Article { id, .. }
            | FeedTarget::Answer { id, .. }
            | FeedTarget::Question { id, .. }
            | FeedTarget::Pin { id, .. } => Some(id),
            FeedTarget::Unknown => None,
        }
    }

    /// Display title (an answer shows its question's title)
    pub fn title(&self) -> Option<&str> {
        match self {
            FeedTarget::Article { title, .. } | FeedTarget::Question { title, .. } => Some(title),
            FeedTarget::Answer { question, .. } => Some(&question.title),
            FeedTarget::Pin { excerpt_title, .. } => Some(excerpt_title),
            FeedTarget::Unknown => None,
        }
    }

    /// Short text preview
    pub fn excerpt(&self) -> Option<&str> {
        match self {
            FeedTarget::Article {
                excerpt,
                excerpt_new,
                ..
            }
            | FeedTarget::Answer {
                excerpt,
                excerpt_new,
                ..
            } => Some(
                excerpt_new
                    .as_deref()
                    .filter(|e| !e.is_empty())
                    .unwrap_or(excerpt),
            ),
            FeedTarget::Question { excerpt, .. } => Some(excerpt),
            FeedTarget::Pin { .. } | FeedTarget::Unknown => None,
        }
    }

    /// Link to the target
    pub fn url(&self) -> Option<&str> {
        match self {
            FeedTarget::Article { url, .. }
            | FeedTarget::Answer { url, .. }
            | FeedTarget::Question { url, .. }
            | FeedTarget::Pin { url, .. } => url.as_deref(),
            FeedTarget::Unknown => None,
        }
    }
}

/// One feed entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// What happened (`"赞同了回答"` and the like), follow feed only
    pub action_text: Option<String>,
    /// Heat summary, hot list only
    pub detail_text: Option<String>,
    /// The content
    pub target: FeedTarget,
}

/// One page of the follow feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedPage {
    /// Items, adverts removed
    pub items: Vec<FeedItem>,
    /// URL of the next page
    pub next: String,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    target: Value,
    #[serde(default)]
    action_text: Option<String>,
    #[serde(default)]
    detail_text: Option<String>,
}

fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Keep items accepted by `keep` whose target is a non-empty object
fn parse_items(body: &Value, keep: impl Fn(&str) -> bool) -> Result<Vec<FeedItem>> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::parse(Step::Feed, "missing data list"))?;

    let mut items = Vec::with_capacity(data.len());
    for raw in data {
        let raw: RawItem = match serde_json::from_value(raw.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed feed item");
                continue;
            }
        };
        let non_empty = raw.target.as_object().is_some_and(|t| !t.is_empty());
        if !keep(&raw.kind) || !non_empty {
            continue;
        }
        match serde_json::from_value::<FeedTarget>(raw.target) {
            Ok(target) => items.push(FeedItem {
                action_text: raw.action_text,
                detail_text: raw.detail_text,
                target,
            }),
            Err(e) => tracing::debug!(error = %e, kind = %raw.kind, "skipping feed item with unreadable target"),
        }
    }
    Ok(items)
}

impl ZhihuClient {
    /// Current hot list
    pub async fn hot_list(&self) -> Result<Vec<FeedItem>> {
        self.step(Step::Feed, async {
            let body = self
                .feed_request(self.www("/api/v3/feed/topstory/hot-lists/total?limit=50&desktop=true"))
                .await?;
            if let Some(fresh) = body.get("fresh_text").and_then(Value::as_str) {
                tracing::info!(fresh = %fresh, "hot list loaded");
            }
            parse_items(&body, |kind| kind == HOT_LIST_ITEM)
        })
        .await
    }

    /// First page of activity from followed people
    pub async fn follow_feed(&self) -> Result<FeedPage> {
        self.follow_feed_at(self.www("/api/v3/moments?limit=10&desktop=true"))
            .await
    }

    /// Follow feed page at `url` (a previous page's [`FeedPage::next`])
    pub async fn follow_feed_at(&self, url: impl Into<String>) -> Result<FeedPage> {
        let url = url.into();
        self.step(Step::Feed, async {
            let body = self.feed_request(url).await?;
            let next = body
                .pointer("/paging/next")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::parse(Step::Feed, "missing paging.next"))?
                .to_string();
            let items = parse_items(&body, |kind| kind != ADVERT_ITEM)?;
            Ok(FeedPage { items, next })
        })
        .await
    }

    async fn feed_request(&self, url: String) -> Result<Value> {
        self.execute(
            Action::get(Step::Feed, url)
                .cookies(cookie_set::SESSION)
                .referer(self.www("/follow"))
                .header(API_VERSION_HEADER, API_VERSION),
        )
        .await?
        .json_value()
    }
}
