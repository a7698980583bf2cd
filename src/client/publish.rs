//! Draft and publish pipeline
//!
//! [`ZhihuClient::publish_document`] validates the document before any
//! network call, then resolves or creates the draft, uploads the cover,
//! patches the rendered body, attaches topics, publishes, and finally
//! records the canonical link in the document.

use super::ZhihuClient;
use crate::document::{
    ArticleMeta, DEFAULT_TITLE, cover_image_name, next_untitled_path, remove_frontmatter,
    scaffold, update_frontmatter,
};
use crate::error::{Error, PreconditionError, Result};
use crate::request::{Action, cookie_set};
use crate::types::{
    ArticleDraft, ArticleId, Event, PublishReport, PublishStatus, Step, article_id_from_link,
};
use chrono::Utc;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Frontmatter key holding the article link
const LINK_KEY: &str = "link";

/// Fresh publish trace id: `<epoch millis>,<uuid v4>`
pub fn trace_id() -> String {
    format!("{},{}", Utc::now().timestamp_millis(), Uuid::new_v4())
}

/// Body of the publish action
///
/// `is_published` marks an in-place update of an already published article.
pub fn publish_payload(id: &ArticleId, toc: bool, is_published: bool, trace_id: &str) -> Value {
    let business_params = json!({
        "column": null,
        "commentPermission": "anyone",
        "disclaimer_type": "none",
        "disclaimer_status": "close",
        "table_of_contents_enabled": toc,
        "commercial_report_info": { "commercial_types": [] },
        "commercial_zhitask_bind_info": null,
        "canReward": false,
    });

    json!({
        "action": "article",
        "data": {
            "publish": { "traceId": trace_id },
            "extra_info": {
                "publisher": "pc",
                "pc_business_params": business_params.to_string(),
            },
            "draft": {
                "disabled": 1,
                "id": id.as_str(),
                "isPublished": is_published,
            },
            "commentsPermission": { "comment_permission": "anyone" },
            "creationStatement": {
                "disclaimer_type": "none",
                "disclaimer_status": "close",
            },
            "contentsTables": { "table_of_contents_enabled": toc },
            "commercialReportInfo": { "isReport": 0 },
            "appreciate": { "can_reward": false, "tagline": "" },
            "hybridInfo": {},
        }
    })
}

/// Canonical URL from a publish response
fn published_url(body: &Value) -> Result<String> {
    let message = body.get("message").and_then(Value::as_str).unwrap_or("");
    if message != "success" {
        return Err(Error::parse(
            Step::Publish,
            format!("publish was not accepted (message: {message:?})"),
        ));
    }
    let result = body
        .pointer("/data/result")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::parse(Step::Publish, "missing data.result"))?;
    let result: Value = serde_json::from_str(result)
        .map_err(|e| Error::parse(Step::Publish, format!("data.result is not JSON: {e}")))?;
    result
        .pointer("/publish/url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::parse(Step::Publish, "missing publish.url"))
}

fn draft_id(body: &Value) -> Result<ArticleId> {
    match body.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(ArticleId::new(id.clone())),
        Some(Value::Number(id)) => Ok(ArticleId::new(id.to_string())),
        _ => Err(Error::parse(Step::NewDraft, "response has no draft id")),
    }
}

impl ZhihuClient {
    /// Publish (or update) the document at `path`
    ///
    /// Relative paths are resolved against the vault directory. Missing
    /// metadata is reported before any request is made. A topic that cannot
    /// be matched or attached is skipped; every other failure aborts.
    pub async fn publish_document(&self, path: impl AsRef<Path>) -> Result<PublishReport> {
        let path = self.config.vault_dir.join(path.as_ref());
        let content = tokio::fs::read_to_string(&path).await?;

        let meta = ArticleMeta::parse(&content)?.ok_or(PreconditionError::MissingFrontmatter)?;
        meta.validate()?;
        let status = meta.status();
        let title = meta.title_or_default().to_string();

        let id = match (status, meta.link.as_deref()) {
            (PublishStatus::Unpublished, _) => self.new_draft(&title).await?,
            (PublishStatus::Published | PublishStatus::DraftCreated, Some(link)) => {
                article_id_from_link(link).ok_or_else(|| Error::InvalidLink(link.to_string()))?
            }
            (_, link) => return Err(Error::InvalidLink(link.unwrap_or_default().to_string())),
        };
        let draft = ArticleDraft { id, title, status };
        tracing::info!(id = %draft.id, status = ?draft.status, path = %path.display(), "publishing document");

        if let Some(cover) = &meta.cover {
            self.step(Step::Cover, self.patch_cover(&draft.id, cover))
                .await?;
        }

        let body = self
            .resolve_embedded_images(&remove_frontmatter(&content))
            .await?;
        let html = self.renderer.render(&body);
        self.patch_draft(
            &draft.id,
            json!({
                "title": draft.title,
                "content": html,
                "table_of_contents": false,
                "delta_time": 30,
                "can_reward": false,
            }),
        )
        .await?;

        let (attached_topics, skipped_topics) = self.attach_topics(&draft.id, &meta.topics).await?;

        let updated = draft.status == PublishStatus::Published;
        let url = self.publish_draft(&draft.id, false, updated).await?;

        if !updated {
            let rewritten = update_frontmatter(&content, LINK_KEY, &url);
            self.step(Step::LinkUpdate, async {
                tokio::fs::write(&path, rewritten).await.map_err(Error::from)
            })
            .await?;
        }

        tracing::info!(url = %url, updated, "article published");
        self.emit_event(Event::Published {
            url: url.clone(),
            updated,
        });

        Ok(PublishReport {
            article_id: draft.id,
            url,
            previous_status: draft.status,
            attached_topics,
            skipped_topics,
        })
    }

    /// Create a new article document in the vault
    ///
    /// A draft is created first; its editor link is stored in the scaffold's
    /// frontmatter. Returns the path of the new file (`untitled.md`, or
    /// `untitled N.md` when taken).
    pub async fn create_article(&self) -> Result<PathBuf> {
        let id = self.new_draft(DEFAULT_TITLE).await?;
        let content = scaffold(&id.edit_link());

        tokio::fs::create_dir_all(&self.config.vault_dir).await?;
        let path = next_untitled_path(&self.config.vault_dir);
        tokio::fs::write(&path, content).await?;

        tracing::info!(id = %id, path = %path.display(), "article scaffold created");
        Ok(path)
    }

    /// Create an empty draft and return its id
    pub async fn new_draft(&self, title: &str) -> Result<ArticleId> {
        self.step(Step::NewDraft, async {
            let response = self
                .execute(
                    Action::post(Step::NewDraft, self.zhuanlan("/api/articles/drafts"))
                        .cookies(cookie_set::AUTHENTICATED)
                        .csrf()
                        .referer(self.zhuanlan("/write"))
                        .origin(self.config.endpoints.zhuanlan.trim_end_matches('/'))
                        .json(json!({ "title": title, "delta_time": 0, "can_reward": false })),
                )
                .await?;
            draft_id(&response.json_value()?)
        })
        .await
    }

    /// Patch draft fields (`title`, `content`, `titleImage`, ...)
    pub async fn patch_draft(&self, id: &ArticleId, patch: Value) -> Result<()> {
        self.step(Step::PatchDraft, self.send_draft_patch(Step::PatchDraft, id, patch))
            .await
    }

    async fn send_draft_patch(&self, step: Step, id: &ArticleId, patch: Value) -> Result<()> {
        self.execute(
            Action::patch(step, self.zhuanlan(&format!("/api/articles/{id}/draft")))
                .cookies(cookie_set::AUTHENTICATED)
                .csrf()
                .referer(self.editor_url(id))
                .origin(self.config.endpoints.zhuanlan.trim_end_matches('/'))
                .json(patch),
        )
        .await?;
        Ok(())
    }

    async fn patch_cover(&self, id: &ArticleId, cover: &str) -> Result<()> {
        let name = cover_image_name(cover)?;
        let path = self.find_in_vault(&name).await?;
        let url = self.upload_image_file(&path).await?;
        self.send_draft_patch(
            Step::Cover,
            id,
            json!({
                "titleImage": url,
                "isTitleImageFullScreen": false,
                "delta_time": 30,
            }),
        )
        .await
    }

    /// Topic autocomplete matches for `topic`, in platform order
    pub async fn lookup_topics(&self, id: &ArticleId, topic: &str) -> Result<Vec<Value>> {
        let response = self
            .execute(
                Action::get(
                    Step::TopicLookup,
                    self.zhuanlan(&format!(
                        "/api/autocomplete/topics?token={}&max_matches=5&use_similar=0&topic_filter=1",
                        urlencoding::encode(topic)
                    )),
                )
                .cookies(cookie_set::AUTHENTICATED)
                .referer(self.editor_url(id)),
            )
            .await?;
        match response.json_value()? {
            Value::Array(matches) => Ok(matches),
            _ => Err(Error::parse(Step::TopicLookup, "autocomplete result is not a list")),
        }
    }

    /// Attach one autocomplete match to the draft
    pub async fn attach_topic(&self, id: &ArticleId, topic: Value) -> Result<()> {
        self.execute(
            Action::post(Step::TopicAttach, self.zhuanlan(&format!("/api/articles/{id}/topics")))
                .cookies(cookie_set::AUTHENTICATED)
                .csrf()
                .referer(self.editor_url(id))
                .origin(self.config.endpoints.zhuanlan.trim_end_matches('/'))
                .json(topic),
        )
        .await?;
        Ok(())
    }

    async fn attach_topics(
        &self,
        id: &ArticleId,
        topics: &[String],
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut attached = Vec::new();
        let mut skipped = Vec::new();

        for topic in topics {
            let reason = match self.attach_first_match(id, topic).await {
                Ok(true) => {
                    attached.push(topic.clone());
                    continue;
                }
                Ok(false) => "no matching topic".to_string(),
                Err(e) if e.is_programmer_error() => return Err(e),
                Err(e) => e.to_string(),
            };
            tracing::warn!(topic = %topic, reason = %reason, "topic skipped");
            self.emit_event(Event::TopicSkipped {
                topic: topic.clone(),
                reason,
            });
            skipped.push(topic.clone());
        }

        Ok((attached, skipped))
    }

    async fn attach_first_match(&self, id: &ArticleId, topic: &str) -> Result<bool> {
        let matches = self
            .step(Step::TopicLookup, self.lookup_topics(id, topic))
            .await?;
        let Some(first) = matches.into_iter().next() else {
            return Ok(false);
        };
        self.step(Step::TopicAttach, self.attach_topic(id, first))
            .await?;
        Ok(true)
    }

    /// Publish a draft and return the canonical article URL
    pub async fn publish_draft(&self, id: &ArticleId, toc: bool, is_published: bool) -> Result<String> {
        self.step(Step::Publish, async {
            let response = self
                .execute(
                    Action::post(Step::Publish, self.www("/api/v4/content/publish"))
                        .cookies(cookie_set::SESSION)
                        .csrf()
                        .json(publish_payload(id, toc, is_published, &trace_id())),
                )
                .await?;
            published_url(&response.json_value()?)
        })
        .await
    }

    fn editor_url(&self, id: &ArticleId) -> String {
        self.zhuanlan(&format!("/p/{id}/edit"))
    }
}
