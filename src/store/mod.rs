//! Credential store for zhihu-publish
//!
//! The whole client state lives in one JSON document:
//!
//! | key        | contents                                        |
//! |------------|-------------------------------------------------|
//! | `cookies`  | cookie name → value                             |
//! | `login`    | the current QR challenge descriptor             |
//! | `bearer`   | terminal payload of a confirmed login           |
//! | `userInfo` | profile of the logged-in user                   |
//! | `cache`    | content hashes of images already uploaded       |
//! | `settings` | user settings such as `user_agent`              |
//!
//! Every write is a deep-merge patch ([`crate::merge::deep_merge`]) applied
//! under a mutex and persisted with a temp-file rename, so concurrent merges
//! never lose each other's keys and a crash never leaves a torn file.

use crate::error::Result;
use crate::merge::deep_merge;
use crate::types::{LoginChallenge, UserProfile};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub mod cookies;

/// Top-level key holding the cookie map
pub const COOKIES: &str = "cookies";
/// Top-level key holding the current login challenge
pub const LOGIN: &str = "login";
/// Top-level key holding the confirmed-login payload
pub const BEARER: &str = "bearer";
/// Top-level key holding the user profile
pub const USER_INFO: &str = "userInfo";
/// Top-level key holding uploaded image hashes
pub const CACHE: &str = "cache";
/// Top-level key holding user settings
pub const SETTINGS: &str = "settings";

/// File-backed session document
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CredentialStore {
    /// Open a store at `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document; a store that was never written reads as `{}`
    pub async fn load(&self) -> Result<Value> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    /// Deep-merge `patch` into the document and persist it
    pub async fn merge(&self, patch: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        deep_merge(&mut doc, patch);
        self.write(&doc).await
    }

    /// Merge cookies into the `cookies` map
    pub async fn merge_cookies(&self, pairs: Vec<(String, String)>) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = pairs.iter().map(|(n, _)| n.as_str()).collect();
        tracing::debug!(cookies = ?names, "merging response cookies");

        let map: Map<String, Value> = pairs
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        self.merge(json!({ COOKIES: map })).await
    }

    /// Cookies named in `keys`, in the order given; missing keys are skipped
    pub async fn select(&self, keys: &[&str]) -> Result<Vec<(String, String)>> {
        let all = self.cookies().await?;
        Ok(keys
            .iter()
            .filter_map(|key| all.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    /// The full cookie map
    pub async fn cookies(&self) -> Result<BTreeMap<String, String>> {
        let doc = self.load().await?;
        Ok(doc
            .get(COOKIES)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Remove a top-level key; returns whether it was present
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let removed = doc
            .as_object_mut()
            .map(|map| map.remove(key).is_some())
            .unwrap_or(false);
        if removed {
            self.write(&doc).await?;
        }
        Ok(removed)
    }

    /// Hashes of images already uploaded
    pub async fn cached_hashes(&self) -> Result<HashSet<String>> {
        let doc = self.load().await?;
        Ok(doc
            .get(CACHE)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Whether `hash` was recorded as uploaded
    pub async fn is_cached(&self, hash: &str) -> Result<bool> {
        Ok(self.cached_hashes().await?.contains(hash))
    }

    /// Append `hash` to the upload cache
    ///
    /// Arrays are replaced wholesale by a merge, so the append happens on the
    /// current array under the lock rather than through a patch.
    pub async fn record_uploaded_hash(&self, hash: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let Some(root) = doc.as_object_mut() else {
            return Err(crate::Error::Other(
                "session document root is not an object".to_string(),
            ));
        };
        let cache = root
            .entry(CACHE)
            .or_insert_with(|| Value::Array(Vec::new()));
        if !cache.is_array() {
            *cache = Value::Array(Vec::new());
        }
        if let Value::Array(items) = cache {
            if items.iter().any(|v| v.as_str() == Some(hash)) {
                return Ok(());
            }
            items.push(Value::String(hash.to_string()));
        }
        self.write(&doc).await
    }

    /// User agent stored under `settings.user_agent`, if any
    pub async fn user_agent(&self) -> Result<Option<String>> {
        let doc = self.load().await?;
        Ok(doc
            .get(SETTINGS)
            .and_then(|s| s.get("user_agent"))
            .and_then(Value::as_str)
            .filter(|ua| !ua.trim().is_empty())
            .map(str::to_string))
    }

    /// Store a user agent override
    pub async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.merge(json!({ SETTINGS: { "user_agent": user_agent } }))
            .await
    }

    /// Stored profile of the logged-in user
    pub async fn user_profile(&self) -> Result<Option<UserProfile>> {
        let doc = self.load().await?;
        match doc.get(USER_INFO) {
            Some(value) if value.is_object() => Ok(Some(serde_json::from_value(value.clone())?)),
            _ => Ok(None),
        }
    }

    /// Stored login challenge, if a QR login was started
    pub async fn login_challenge(&self) -> Result<Option<LoginChallenge>> {
        let doc = self.load().await?;
        match doc.get(LOGIN) {
            Some(value) if value.get("token").is_some() => {
                Ok(Some(serde_json::from_value(value.clone())?))
            }
            _ => Ok(None),
        }
    }

    async fn read(&self) -> Result<Value> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(json!({})),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(json!({})),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, doc: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(doc)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
