//! Configuration types for zhihu-publish

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Base URLs of the platform services
///
/// Every endpoint the client talks to is derived from one of these bases, so
/// pointing them at a local server is enough to run the full choreography
/// against a mock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Main site: pages, login, profile, publish, feeds (default: "https://www.zhihu.com")
    #[serde(default = "default_www")]
    pub www: String,

    /// Column service: drafts, topics (default: "https://zhuanlan.zhihu.com")
    #[serde(default = "default_zhuanlan")]
    pub zhuanlan: String,

    /// API host: image tickets and status (default: "https://api.zhihu.com")
    #[serde(default = "default_api")]
    pub api: String,

    /// Object store upload host (default: "https://zhihu-pics-upload.zhimg.com")
    #[serde(default = "default_upload")]
    pub upload: String,

    /// Image CDN host used in canonical image URLs (default: "https://picx.zhimg.com")
    #[serde(default = "default_image_base")]
    pub image_base: String,

    /// Object store bucket name that appears in the string to sign (default: "zhihu-pics")
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            www: default_www(),
            zhuanlan: default_zhuanlan(),
            api: default_api(),
            upload: default_upload(),
            image_base: default_image_base(),
            bucket: default_bucket(),
        }
    }
}

impl EndpointConfig {
    /// Point every service at the same base URL (used with a single mock server)
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            www: base.clone(),
            zhuanlan: base.clone(),
            api: base.clone(),
            upload: base.clone(),
            image_base: base,
            bucket: default_bucket(),
        }
    }
}

/// Browser fingerprint and transport settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with platform requests unless `settings.user_agent` is stored
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// SDK user agent sent to the object store and included in the signature
    #[serde(default = "default_oss_user_agent")]
    pub oss_user_agent: String,

    /// Accept-Language header value
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            oss_user_agent: default_oss_user_agent(),
            accept_language: default_accept_language(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// QR login polling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Delay between status polls, serialized in milliseconds (default: 2000)
    #[serde(default = "default_poll_interval", with = "duration_millis_serde")]
    pub poll_interval: Duration,

    /// Total time to wait for confirmation before giving up (default: 300 seconds)
    #[serde(default = "default_poll_budget", with = "duration_serde")]
    pub poll_budget: Duration,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            poll_budget: default_poll_budget(),
        }
    }
}

/// Retry configuration for transient transport failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 10 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Main configuration for [`ZhihuClient`](crate::ZhihuClient)
///
/// Fields are organized into sub-configs:
/// - [`endpoints`](EndpointConfig): service base URLs and bucket
/// - [`http`](HttpConfig): browser fingerprint and timeouts
/// - [`login`](LoginConfig): QR polling cadence and budget
/// - [`retry`](RetryConfig): transport retry policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Service base URLs
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// QR login settings
    #[serde(default)]
    pub login: LoginConfig,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Path of the persisted session document (default: "zhihu-data.json")
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Directory in which documents and `![[image]]` references are resolved (default: ".")
    #[serde(default = "default_vault_dir")]
    pub vault_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: EndpointConfig::default(),
            http: HttpConfig::default(),
            login: LoginConfig::default(),
            retry: RetryConfig::default(),
            state_path: default_state_path(),
            vault_dir: default_vault_dir(),
        }
    }
}

impl Config {
    /// Check the configuration for values the client cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let bases = [
            ("endpoints.www", &self.endpoints.www),
            ("endpoints.zhuanlan", &self.endpoints.zhuanlan),
            ("endpoints.api", &self.endpoints.api),
            ("endpoints.upload", &self.endpoints.upload),
            ("endpoints.image_base", &self.endpoints.image_base),
        ];
        for (key, value) in bases {
            url::Url::parse(value).map_err(|e| crate::Error::Config {
                message: format!("{key} is not a valid URL ({value:?}): {e}"),
                key: Some(key.to_string()),
            })?;
        }

        if self.endpoints.bucket.trim().is_empty() {
            return Err(crate::Error::Config {
                message: "bucket name must not be empty".to_string(),
                key: Some("endpoints.bucket".to_string()),
            });
        }

        if self.login.poll_interval.is_zero() {
            return Err(crate::Error::Config {
                message: "poll interval must be greater than zero".to_string(),
                key: Some("login.poll_interval".to_string()),
            });
        }

        if self.http.request_timeout.is_zero() {
            return Err(crate::Error::Config {
                message: "request timeout must be greater than zero".to_string(),
                key: Some("http.request_timeout".to_string()),
            });
        }

        Ok(())
    }
}

fn default_www() -> String {
    "https://www.zhihu.com".to_string()
}

fn default_zhuanlan() -> String {
    "https://zhuanlan.zhihu.com".to_string()
}

fn default_api() -> String {
    "https://api.zhihu.com".to_string()
}

fn default_upload() -> String {
    "https://zhihu-pics-upload.zhimg.com".to_string()
}

fn default_image_base() -> String {
    "https://picx.zhimg.com".to_string()
}

fn default_bucket() -> String {
    "zhihu-pics".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:137.0) Gecko/20100101 Firefox/137.0"
        .to_string()
}

fn default_oss_user_agent() -> String {
    "aliyun-sdk-js/6.8.0 Firefox 137.0 on OS X 10.15".to_string()
}

fn default_accept_language() -> String {
    "zh-CN,zh;q=0.8,zh-TW;q=0.7,zh-HK;q=0.5,en-US;q=0.3,en;q=0.2".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_poll_budget() -> Duration {
    Duration::from_secs(300)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_state_path() -> PathBuf {
    PathBuf::from("zhihu-data.json")
}

fn default_vault_dir() -> PathBuf {
    PathBuf::from(".")
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
