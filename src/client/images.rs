//! Content-addressed image upload
//!
//! Images are keyed by the MD5 of their bytes. A hash recorded in the store's
//! upload cache resolves to its CDN URL without any network call; otherwise a
//! ticket is requested and, when the platform does not hold the bytes yet,
//! they are PUT to the object store with a signed request. The hash is only
//! recorded once the platform holds the bytes.

use super::ZhihuClient;
use crate::error::{Error, Result};
use crate::oss;
use crate::request::{Action, cookie_set};
use crate::types::{Event, Step, UploadState, UploadTicket};
use chrono::Utc;
use regex::Regex;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderName, USER_AGENT};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

#[allow(clippy::expect_used)] // literal pattern
static EMBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[\[([^|\]]+)(?:\|([^\]]+))?\]\]").expect("image embed pattern")
});

/// Answer to an upload ticket request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageTicket {
    /// Platform image id (usable with [`ZhihuClient::image_status`])
    pub image_id: Option<String>,
    /// Whether the bytes still have to be PUT
    pub state: UploadState,
    /// Object store credentials, present when an upload is needed
    pub credentials: Option<UploadTicket>,
}

impl ImageTicket {
    pub(crate) fn from_response(body: &Value) -> Result<Self> {
        let upload_file = body
            .get("upload_file")
            .ok_or_else(|| Error::parse(Step::UploadTicket, "missing upload_file"))?;
        let state = upload_file
            .get("state")
            .and_then(Value::as_i64)
            .map(UploadState::from_code)
            .ok_or_else(|| Error::parse(Step::UploadTicket, "missing upload_file.state"))?;
        let image_id = upload_file.get("image_id").and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        let credentials = match body.get("upload_token") {
            Some(token) if token.is_object() => Some(
                serde_json::from_value(token.clone())
                    .map_err(|e| Error::parse(Step::UploadTicket, format!("bad upload_token: {e}")))?,
            ),
            _ => None,
        };
        Ok(Self {
            image_id,
            state,
            credentials,
        })
    }
}

/// Platform `<img>` markup for an uploaded image
pub(crate) fn image_tag(url: &str, caption: &str) -> String {
    let caption = caption.replace('"', "&quot;");
    format!(
        r#"<img src={url} data-caption="{caption}" data-size="normal" data-watermark="watermark" data-original-src={url} data-watermark-src="" data-private-watermark-src=""/>"#
    )
}

impl ZhihuClient {
    /// Upload an image file and return its canonical CDN URL
    ///
    /// Relative paths are resolved against the vault directory.
    pub async fn upload_image(&self, path: impl AsRef<Path>) -> Result<String> {
        self.upload_image_file(&self.config.vault_dir.join(path.as_ref()))
            .await
    }

    /// Ask the platform whether it holds the bytes for `hash`
    pub async fn request_upload_ticket(&self, hash: &str) -> Result<ImageTicket> {
        let response = self
            .execute(
                Action::post(Step::UploadTicket, self.api("/images"))
                    .cookies(cookie_set::AUTHENTICATED)
                    .json(json!({ "image_hash": hash, "source": "article" })),
            )
            .await?;
        ImageTicket::from_response(&response.json_value()?)
    }

    /// Processing status of an uploaded image
    pub async fn image_status(&self, image_id: &str) -> Result<Value> {
        self.step(Step::ImageStatus, async {
            self.execute(
                Action::get(Step::ImageStatus, self.api(&format!("/images/{image_id}")))
                    .cookies(cookie_set::AUTHENTICATED),
            )
            .await?
            .json_value()
        })
        .await
    }

    /// Replace every `![[name]]` / `![[name|caption]]` with an uploaded `<img>` tag
    ///
    /// The first missing or unreadable image aborts the whole rewrite.
    pub async fn resolve_embedded_images(&self, markdown: &str) -> Result<String> {
        let mut out = String::with_capacity(markdown.len());
        let mut last = 0;

        for caps in EMBED.captures_iter(markdown) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str().trim();
            let caption = caps
                .get(2)
                .map(|c| c.as_str().trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| {
                    Path::new(name)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| name.to_string())
                });

            let path = self.find_in_vault(name).await?;
            let url = self.upload_image_file(&path).await?;

            out.push_str(&markdown[last..whole.start()]);
            out.push_str(&image_tag(&url, &caption));
            last = whole.end();
        }

        out.push_str(&markdown[last..]);
        Ok(out)
    }

    /// Locate an image by vault-relative path or, failing that, by file name
    pub(crate) async fn find_in_vault(&self, name: &str) -> Result<PathBuf> {
        let vault = self.config.vault_dir.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let direct = vault.join(&name);
            if direct.is_file() {
                return Ok(direct);
            }
            let wanted = Path::new(&name);
            let Some(file_name) = wanted.file_name() else {
                return Err(Error::ImageNotFound(direct));
            };
            walkdir::WalkDir::new(&vault)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .find(|entry| {
                    entry.file_type().is_file()
                        && entry.file_name() == file_name
                        && entry.path().ends_with(wanted)
                })
                .map(|entry| entry.into_path())
                .ok_or(Error::ImageNotFound(direct))
        })
        .await
        .map_err(|e| Error::Other(format!("vault lookup task failed: {e}")))?
    }

    pub(crate) async fn upload_image_file(&self, path: &Path) -> Result<String> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ImageNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        self.upload_image_bytes(path, bytes).await
    }

    async fn upload_image_bytes(&self, path: &Path, bytes: Vec<u8>) -> Result<String> {
        let kind = infer::get(&bytes)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .ok_or_else(|| Error::UnsupportedImageType(path.to_path_buf()))?;
        let hash = format!("{:x}", md5::compute(&bytes));
        let url = self.image_base(&format!("{}.{}", oss::object_key(&hash), kind.extension()));

        // Serializes check-upload-record so equal bytes are never PUT twice
        let _upload = self.upload_lock.lock().await;

        if self.store.is_cached(&hash).await? {
            tracing::debug!(hash = %hash, path = %path.display(), "image already uploaded");
            self.emit_event(Event::ImageUploaded {
                hash,
                url: url.clone(),
                transferred: false,
            });
            return Ok(url);
        }

        let ticket = self
            .step(Step::UploadTicket, self.request_upload_ticket(&hash))
            .await?;

        let transferred = match (ticket.state, ticket.credentials) {
            (UploadState::Stored, _) => false,
            (UploadState::NeedsUpload, Some(credentials)) => {
                self.step(
                    Step::ImageUpload,
                    self.put_object(&hash, kind.mime_type(), bytes, &credentials),
                )
                .await?;
                true
            }
            (UploadState::NeedsUpload, None) => {
                return Err(Error::parse(
                    Step::UploadTicket,
                    "upload required but no upload_token was issued",
                ));
            }
        };

        self.store.record_uploaded_hash(&hash).await?;
        tracing::info!(hash = %hash, transferred, "image available at {url}");
        self.emit_event(Event::ImageUploaded {
            hash,
            url: url.clone(),
            transferred,
        });
        Ok(url)
    }

    async fn put_object(
        &self,
        hash: &str,
        mime: &str,
        bytes: Vec<u8>,
        credentials: &UploadTicket,
    ) -> Result<()> {
        let key = oss::object_key(hash);
        let date = oss::http_date(Utc::now());
        let signed = oss::signed_headers(
            credentials,
            mime,
            &date,
            &self.config.http.oss_user_agent,
            &self.config.endpoints.bucket,
            &key,
        )?;

        let mut action = Action::put(Step::ImageUpload, self.upload(&key))
            .bare()
            .bytes(mime, bytes)
            .header(USER_AGENT, self.browser_user_agent().await?)
            .header(ACCEPT_LANGUAGE, self.config.http.accept_language.clone());
        for (name, value) in signed {
            action = action.header(HeaderName::from_static(name), value);
        }

        self.execute(action).await?;
        Ok(())
    }

    /// User agent for requests that carry no browser fingerprint
    pub(crate) async fn browser_user_agent(&self) -> Result<String> {
        Ok(self
            .store
            .user_agent()
            .await?
            .unwrap_or_else(|| self.config.http.user_agent.clone()))
    }
}
