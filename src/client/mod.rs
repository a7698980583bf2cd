//! Platform client split into focused submodules.
//!
//! The `ZhihuClient` struct and its methods are organized by flow:
//! - [`handshake`] - Anonymous cookie handshake that precedes a QR login
//! - [`qrcode`] - QR poll state machine and the post-login chain
//! - [`images`] - Content-addressed image upload
//! - [`publish`] - Draft and publish pipeline, article scaffolding
//! - [`feed`] - Read-only feeds

mod feed;
mod handshake;
mod images;
mod publish;
mod qrcode;

pub use feed::{FeedItem, FeedPage, FeedTarget, QuestionRef};
pub use images::ImageTicket;
pub use publish::{publish_payload, trace_id};
pub use qrcode::{PollOutcome, QrLoginHandle};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::render::{ContentRenderer, ZhihuHtmlRenderer};
use crate::request::{Action, PreparedRequest, SignedRequestBuilder};
use crate::retry::with_retry_if;
use crate::store::{self, CredentialStore, cookies};
use crate::types::{Event, Step, UserProfile};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Main client instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ZhihuClient {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Persisted session
    pub(crate) store: Arc<CredentialStore>,
    /// Builds session-aware requests from the store
    pub(crate) requests: SignedRequestBuilder,
    /// Shared HTTP connection pool
    pub(crate) http: reqwest::Client,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Held for the whole duration of a QR login
    pub(crate) login_guard: Arc<tokio::sync::Mutex<()>>,
    /// Held from cache check to cache record of one image
    pub(crate) upload_lock: Arc<tokio::sync::Mutex<()>>,
    /// Markdown to platform HTML
    pub(crate) renderer: Arc<dyn ContentRenderer>,
}

/// A successful platform answer, fully read
#[derive(Debug)]
pub(crate) struct RemoteResponse {
    pub(crate) step: Step,
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Vec<u8>,
}

impl RemoteResponse {
    /// Cookies set by this response
    pub(crate) fn cookies(&self) -> Vec<(String, String)> {
        cookies::from_headers(&self.headers)
    }

    /// Decode the body as `T`, attributing failures to the step
    pub(crate) fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::parse(
                self.step,
                format!("HTTP {} body is not the expected JSON: {e}", self.status),
            )
        })
    }

    /// Decode the body as a generic JSON value
    pub(crate) fn json_value(&self) -> Result<Value> {
        self.json()
    }
}

impl ZhihuClient {
    /// Create a new client
    ///
    /// No network call is made; the session document at `config.state_path`
    /// is read lazily on first use.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.http.request_timeout)
            .build()?;

        let store = Arc::new(CredentialStore::new(config.state_path.clone()));
        let requests = SignedRequestBuilder::new(store.clone(), config.http.clone());

        // Room for a full publish worth of step events per subscriber
        let (event_tx, _rx) = tokio::sync::broadcast::channel(256);

        Ok(Self {
            config: Arc::new(config),
            store,
            requests,
            http,
            event_tx,
            login_guard: Arc::new(tokio::sync::Mutex::new(())),
            upload_lock: Arc::new(tokio::sync::Mutex::new(())),
            renderer: Arc::new(ZhihuHtmlRenderer),
        })
    }

    /// Replace the content renderer
    pub fn with_renderer(mut self, renderer: impl ContentRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Subscribe to login and publish events
    ///
    /// Each subscriber receives every event emitted after it subscribed.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The persisted session
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Profile of the logged-in user, if any
    pub async fn current_user(&self) -> Result<Option<UserProfile>> {
        self.store.user_profile().await
    }

    /// Forget the logged-in user
    ///
    /// The profile and the confirmed-login payload are removed. Lower-level
    /// cookies stay so a new login can reuse the device identity.
    pub async fn logout(&self) -> Result<()> {
        let had_user = self.store.remove(store::USER_INFO).await?;
        self.store.remove(store::BEARER).await?;
        tracing::info!(had_user, "logged out");
        Ok(())
    }

    /// Persist a user agent that overrides the configured default
    pub async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.store.set_user_agent(user_agent).await
    }

    /// Assemble an action without sending it
    pub async fn prepare(&self, action: Action) -> Result<PreparedRequest> {
        self.requests.build(action).await
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    /// Run `fut` as `step`, reporting its outcome
    pub(crate) async fn step<T, F>(&self, step: Step, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match fut.await {
            Ok(value) => {
                tracing::info!(step = %step, "step completed");
                self.emit_event(Event::StepSucceeded { step });
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(step = %step, error = %e, "step failed");
                self.emit_event(Event::StepFailed {
                    step,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run a step whose failure does not stop the enclosing flow
    ///
    /// Local invariant violations still propagate.
    pub(crate) async fn soft_step<T, F>(&self, step: Step, fut: F) -> Result<Option<T>>
    where
        F: Future<Output = Result<T>>,
    {
        match self.step(step, fut).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_programmer_error() => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Send an action and read the whole response
    ///
    /// Transport failures are retried per [`RetryConfig`](crate::config::RetryConfig)
    /// (`POST` and `PATCH` only when the connection was never established);
    /// a non-success status becomes [`Error::Remote`] and an elapsed request
    /// timeout becomes [`Error::Timeout`].
    pub(crate) async fn execute(&self, action: Action) -> Result<RemoteResponse> {
        let prepared = self.requests.build(action).await?;
        let step = prepared.step;
        let timeout = self.config.http.request_timeout;
        let as_timeout = |e: Error| match e {
            Error::Network(ref err) if err.is_timeout() => Error::Timeout {
                step,
                after: timeout,
            },
            other => other,
        };

        let response = with_retry_if(
            &self.config.retry,
            |e: &Error| e.is_retryable_for(&prepared.method),
            || async {
                prepared
                    .to_reqwest(&self.http)
                    .send()
                    .await
                    .map_err(Error::from)
            },
        )
        .await
        .map_err(as_timeout)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| as_timeout(Error::from(e)))?
            .to_vec();

        tracing::debug!(step = %step, status = status.as_u16(), bytes = body.len(), "response received");

        if !status.is_success() {
            return Err(Error::remote(
                step,
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }

        Ok(RemoteResponse {
            step,
            status,
            headers,
            body,
        })
    }

    /// Send an action and merge the cookies it sets into the session
    pub(crate) async fn execute_and_merge(&self, action: Action) -> Result<RemoteResponse> {
        let response = self.execute(action).await?;
        self.store.merge_cookies(response.cookies()).await?;
        Ok(response)
    }

    pub(crate) fn www(&self, path: &str) -> String {
        join(&self.config.endpoints.www, path)
    }

    pub(crate) fn zhuanlan(&self, path: &str) -> String {
        join(&self.config.endpoints.zhuanlan, path)
    }

    pub(crate) fn api(&self, path: &str) -> String {
        join(&self.config.endpoints.api, path)
    }

    pub(crate) fn upload(&self, path: &str) -> String {
        join(&self.config.endpoints.upload, path)
    }

    pub(crate) fn image_base(&self, path: &str) -> String {
        join(&self.config.endpoints.image_base, path)
    }
}

fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
