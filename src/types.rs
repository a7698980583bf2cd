//! Core types and events for zhihu-publish

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Canonical prefix of every article and draft link on the platform
pub const ARTICLE_URL_PREFIX: &str = "https://zhuanlan.zhihu.com/p/";

#[allow(clippy::expect_used)] // literal pattern
static ARTICLE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://zhuanlan\.zhihu\.com/p/(\d+)$").expect("article link pattern")
});

#[allow(clippy::expect_used)] // literal pattern
static DRAFT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://zhuanlan\.zhihu\.com/p/(\d+)(/edit)?$").expect("draft link pattern")
});

/// Numeric identifier of an article or draft
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub String);

impl ArticleId {
    /// Create a new ArticleId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Draft editor link for this id (what a fresh scaffold persists)
    pub fn edit_link(&self) -> String {
        format!("{ARTICLE_URL_PREFIX}{}/edit", self.0)
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Publish status derived from a document's persisted `link` field
///
/// The integer encoding matches the values the platform's own tooling uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// No link yet
    Unpublished,
    /// Link is a canonical article URL
    Published,
    /// Link is a draft (editor) URL
    DraftCreated,
    /// Link has some other shape
    InvalidLink,
}

impl PublishStatus {
    /// Derive the status from a persisted link; checks run in order so a
    /// canonical article URL wins over the looser draft pattern
    pub fn from_link(link: Option<&str>) -> Self {
        match link.map(str::trim) {
            None | Some("") => PublishStatus::Unpublished,
            Some(link) if ARTICLE_LINK.is_match(link) => PublishStatus::Published,
            Some(link) if DRAFT_LINK.is_match(link) => PublishStatus::DraftCreated,
            Some(_) => PublishStatus::InvalidLink,
        }
    }

    /// Convert to the integer code
    pub fn to_i32(self) -> i32 {
        match self {
            PublishStatus::Unpublished => 0,
            PublishStatus::Published => 1,
            PublishStatus::DraftCreated => 2,
            PublishStatus::InvalidLink => 3,
        }
    }
}

/// Extract the numeric article id from an article or draft link
pub fn article_id_from_link(link: &str) -> Option<ArticleId> {
    DRAFT_LINK
        .captures(link.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| ArticleId::new(m.as_str()))
}

/// A draft as tracked by the publish pipeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    /// Draft id
    pub id: ArticleId,
    /// Title sent with the content patch
    pub title: String,
    /// Status derived from the document link when the draft was resolved
    pub status: PublishStatus,
}

/// One QR login attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginChallenge {
    /// Opaque token identifying the attempt
    pub token: String,
    /// Scan URL as issued by the platform
    #[serde(default, rename = "link")]
    pub scan_url: String,
}

impl LoginChallenge {
    /// URL that should be encoded into the scannable code
    pub fn qr_url(&self, www_base: &str) -> String {
        qr_url_for_token(www_base, &self.token)
    }
}

/// Build the scannable URL for a challenge token
pub fn qr_url_for_token(www_base: &str, token: &str) -> String {
    format!(
        "{}/account/scan/login/{}?/api/login/qrcode",
        www_base.trim_end_matches('/'),
        token
    )
}

/// Short-lived object storage credentials for one image upload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    /// Access key id
    pub access_id: String,
    /// Access key secret used as the HMAC key
    #[serde(rename = "access_key")]
    pub access_key_secret: String,
    /// Security token sent as `x-oss-security-token`
    #[serde(rename = "access_token")]
    pub security_token: String,
}

/// Upload state reported for a content hash
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadState {
    /// The object store already holds these bytes
    Stored,
    /// The bytes must be PUT to the object store
    NeedsUpload,
}

impl UploadState {
    /// Decode the platform's numeric upload state (2 means "not uploaded yet")
    pub fn from_code(code: i64) -> Self {
        if code == 2 {
            UploadState::NeedsUpload
        } else {
            UploadState::Stored
        }
    }
}

/// Profile of the logged-in user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Profile id
    #[serde(default)]
    pub id: String,
    /// URL token used in profile links
    #[serde(default)]
    pub url_token: Option<String>,
    /// Avatar image
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Short bio
    #[serde(default)]
    pub headline: Option<String>,
}

/// How a QR login ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The user confirmed on their phone and the session is complete
    Confirmed(UserProfile),
    /// The prompt was closed before confirmation
    Cancelled,
}

/// Result of a successful publish
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishReport {
    /// Article id
    pub article_id: ArticleId,
    /// Canonical article URL returned by the platform
    pub url: String,
    /// Status of the document before publishing
    pub previous_status: PublishStatus,
    /// Topics that were attached
    pub attached_topics: Vec<String>,
    /// Topics that could not be matched or attached
    pub skipped_topics: Vec<String>,
}

/// Independently failing steps of the login and publish flows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Home page visit that seeds anti-bot cookies
    InitCookies,
    /// Sign-in page visit
    SignInPage,
    /// Device id (`d_c0`) request
    DeviceId,
    /// Client telemetry beacon
    Telemetry,
    /// Login QR descriptor request
    QrDescriptor,
    /// Captcha session cookie request
    CaptchaSession,
    /// One QR status poll
    QrStatus,
    /// Home page revisit with the new session cookie
    HomeRevisit,
    /// Token refresh call
    TokenRefresh,
    /// Profile fetch
    Profile,
    /// Draft creation
    NewDraft,
    /// Draft patch
    PatchDraft,
    /// Image upload ticket request
    UploadTicket,
    /// Signed object storage PUT
    ImageUpload,
    /// Image processing status request
    ImageStatus,
    /// Cover upload and patch
    Cover,
    /// Topic autocomplete lookup
    TopicLookup,
    /// Topic attachment
    TopicAttach,
    /// Final publish action
    Publish,
    /// Document link rewrite
    LinkUpdate,
    /// Feed fetch
    Feed,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Step::InitCookies => "fetching initial cookies",
            Step::SignInPage => "opening the sign-in page",
            Step::DeviceId => "requesting a device id",
            Step::Telemetry => "sending the client init beacon",
            Step::QrDescriptor => "requesting a login QR code",
            Step::CaptchaSession => "requesting a captcha session",
            Step::QrStatus => "polling the QR scan status",
            Step::HomeRevisit => "revisiting the home page",
            Step::TokenRefresh => "refreshing the session token",
            Step::Profile => "fetching the user profile",
            Step::NewDraft => "creating a draft",
            Step::PatchDraft => "updating the draft",
            Step::UploadTicket => "requesting an image upload ticket",
            Step::ImageUpload => "uploading an image",
            Step::ImageStatus => "fetching image status",
            Step::Cover => "uploading the cover",
            Step::TopicLookup => "looking up a topic",
            Step::TopicAttach => "attaching a topic",
            Step::Publish => "publishing the article",
            Step::LinkUpdate => "writing the article link",
            Step::Feed => "fetching a feed",
        };
        f.write_str(text)
    }
}

/// Event emitted during login and publish
///
/// Every step that can fail independently reports its own outcome, so a
/// partially completed publish is diagnosable from the event stream alone.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A step completed
    StepSucceeded {
        /// The step
        step: Step,
    },

    /// A step failed
    StepFailed {
        /// The step
        step: Step,
        /// Error message
        error: String,
    },

    /// A scannable login code is ready
    QrCodeIssued {
        /// URL to encode into the code
        url: String,
    },

    /// The platform replaced an expired login code
    QrCodeRotated {
        /// URL to encode into the new code
        url: String,
    },

    /// The code was scanned and awaits confirmation on the phone
    QrCodeScanned,

    /// Login finished
    LoginConfirmed {
        /// Display name of the logged-in user
        name: String,
    },

    /// Login was cancelled before confirmation
    LoginCancelled,

    /// An image reference was resolved to a platform URL
    ImageUploaded {
        /// MD5 content hash
        hash: String,
        /// Canonical image URL
        url: String,
        /// Whether bytes were actually transferred in this call
        transferred: bool,
    },

    /// A topic could not be attached (the publish continues)
    TopicSkipped {
        /// Requested topic
        topic: String,
        /// Why it was skipped
        reason: String,
    },

    /// Article published or updated
    Published {
        /// Canonical article URL
        url: String,
        /// True when an already-published article was updated in place
        updated: bool,
    },
}
