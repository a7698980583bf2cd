//! Error types for zhihu-publish
//!
//! This module provides the error taxonomy for the login and publish flows:
//! - Precondition errors raised before any network call is made
//! - Remote and parse errors attributed to the [`Step`] that produced them
//! - State errors (invalid persisted link, unusable image files)
//! - Timeouts, kept distinct from other network failures
//! - Local invariant violations (a protected request without its CSRF cookie)

use crate::types::Step;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for zhihu-publish operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for zhihu-publish
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "endpoints.www")
        key: Option<String>,
    },

    /// Document metadata is missing something the publish flow requires
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// The platform answered with a non-success status
    #[error("{step} failed with HTTP {status}: {message}")]
    Remote {
        /// The step that issued the request
        step: Step,
        /// HTTP status code returned by the platform
        status: u16,
        /// Response body (truncated) or reason
        message: String,
    },

    /// The platform answered with a body of an unexpected shape
    #[error("{step} returned an unexpected response: {message}")]
    Parse {
        /// The step that issued the request
        step: Step,
        /// What was missing or malformed
        message: String,
    },

    /// The persisted article link has a shape that is neither an article nor a draft
    #[error("invalid article link: {0}")]
    InvalidLink(String),

    /// An image file's type could not be detected from its bytes
    #[error("unrecognized image type: {}", .0.display())]
    UnsupportedImageType(PathBuf),

    /// An image referenced from a document does not exist in the vault
    #[error("image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    /// A request or the QR polling budget ran out of time
    #[error("{step} timed out after {after:?}")]
    Timeout {
        /// The step that timed out
        step: Step,
        /// The budget that elapsed
        after: Duration,
    },

    /// A CSRF-protected request was built without the CSRF cookie in the session
    #[error("required cookie {0} is not present in the session")]
    MissingCookie(&'static str),

    /// Another login attempt is already running on this client
    #[error("a login attempt is already in progress")]
    LoginInProgress,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Frontmatter YAML error
    #[error("frontmatter error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Missing or malformed document metadata
///
/// Each variant carries a distinct user-facing reason so the caller can tell
/// the user exactly which field to fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// The document has no frontmatter block at all
    #[error("the document needs a frontmatter block with article properties")]
    MissingFrontmatter,

    /// `tags` does not contain the marker tag
    #[error("the document tags must include \"{0}\"")]
    MissingTag(&'static str),

    /// `topics` is empty or absent
    #[error("the document needs at least one topic")]
    MissingTopics,

    /// `cover` is present but not an `[[image]]` reference
    #[error("cover must reference an image as [[name]], got {0:?}")]
    InvalidCoverReference(String),
}

impl Error {
    /// Build a remote error for `step`, keeping at most 200 bytes of the body
    pub(crate) fn remote(step: Step, status: u16, body: &str) -> Self {
        let mut message = body.trim().to_string();
        if message.len() > 200 {
            let mut cut = 200;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
            message.push('…');
        }
        Error::Remote {
            step,
            status,
            message,
        }
    }

    /// Build a parse error for `step`
    pub(crate) fn parse(step: Step, message: impl Into<String>) -> Self {
        Error::Parse {
            step,
            message: message.into(),
        }
    }

    /// True for errors that were raised before any network call was made
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }

    /// True for local invariant violations (bugs in the calling code, not user or network errors)
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, Error::MissingCookie(_))
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Precondition(_) => "precondition_failed",
            Error::Remote { .. } => "remote_error",
            Error::Parse { .. } => "parse_error",
            Error::InvalidLink(_) => "invalid_link",
            Error::UnsupportedImageType(_) => "unsupported_image_type",
            Error::ImageNotFound(_) => "image_not_found",
            Error::Timeout { .. } => "timeout",
            Error::MissingCookie(_) => "missing_cookie",
            Error::LoginInProgress => "login_in_progress",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Yaml(_) => "frontmatter_error",
            Error::Other(_) => "internal_error",
        }
    }
}
