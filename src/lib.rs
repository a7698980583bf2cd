//! # zhihu-publish
//!
//! Client library for logging into Zhihu by QR code and publishing Markdown
//! notes from a local vault as Zhihu column articles.
//!
//! ## Design Philosophy
//!
//! zhihu-publish is designed to be:
//! - **Session-faithful** - Every call forwards exactly the cookies the web client would
//! - **Step-attributed** - Each failure names the step of the flow that produced it
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use zhihu_publish::{Config, Event, LoginOutcome, ZhihuClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         vault_dir: "/home/me/notes".into(),
//!         ..Default::default()
//!     };
//!     let client = ZhihuClient::new(config)?;
//!
//!     let login = client.start_qr_login().await?;
//!     println!("scan this: {}", login.url());
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let Event::QrCodeRotated { url } = event {
//!                 println!("code replaced, scan this instead: {url}");
//!             }
//!         }
//!     });
//!
//!     if let LoginOutcome::Confirmed(user) = login.wait().await? {
//!         println!("logged in as {}", user.name);
//!         let report = client.publish_document("drafts/ownership.md").await?;
//!         println!("published at {}", report.url);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Platform client (login, images, publishing, feeds)
pub mod client;
/// Configuration types
pub mod config;
/// Markdown documents and frontmatter editing
pub mod document;
/// Error types
pub mod error;
/// Deep merge of JSON documents
pub mod merge;
/// Object store request signing
pub mod oss;
/// Markdown to platform HTML
pub mod render;
/// Session-aware request construction
pub mod request;
/// Retry logic with exponential backoff
pub mod retry;
/// Persisted session and upload cache
pub mod store;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use client::{
    FeedItem, FeedPage, FeedTarget, ImageTicket, PollOutcome, QrLoginHandle, QuestionRef,
    ZhihuClient, publish_payload, trace_id,
};
pub use config::{Config, EndpointConfig, HttpConfig, LoginConfig, RetryConfig};
pub use document::ArticleMeta;
pub use error::{Error, PreconditionError, Result};
pub use render::{ContentRenderer, ZhihuHtmlRenderer};
pub use request::{Action, PreparedRequest};
pub use store::CredentialStore;
pub use types::{
    ArticleDraft, ArticleId, Event, LoginChallenge, LoginOutcome, PublishReport, PublishStatus,
    Step, UploadState, UploadTicket, UserProfile,
};
