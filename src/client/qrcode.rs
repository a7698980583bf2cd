//! QR login state machine
//!
//! `Issued → Polling → {Scanned, Rotated → Polling, Confirmed, Cancelled}`.
//!
//! The poll loop runs in its own task and stops at the first of: a terminal
//! status body, the caller cancelling through [`QrLoginHandle`], or the total
//! poll budget elapsing. Cancellation is checked before every tick and
//! raced against every in-flight poll, so no request is issued after
//! [`QrLoginHandle::cancel`] returns.

use super::{RemoteResponse, ZhihuClient};
use crate::error::{Error, Result};
use crate::request::{Action, ZSE_VERSION, ZSE_VERSION_HEADER, cookie_set};
use crate::store;
use crate::types::{Event, LoginOutcome, Step, UserProfile, qr_url_for_token};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Scan status: code scanned, waiting for confirmation on the phone
const STATUS_SCANNED: i64 = 1;
/// Scan status: code expired, a replacement token may be attached
const STATUS_EXPIRED: i64 = 5;

/// What a single status poll reported
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing happened yet
    Pending,
    /// The code was scanned and awaits confirmation
    Scanned,
    /// The code expired and the platform issued this replacement token
    Rotated(String),
    /// The body carries the terminal session payload
    Confirmed,
}

impl PollOutcome {
    /// Classify a status body
    ///
    /// A body without a `status` field is the confirmed-login payload: the
    /// endpoint switches shape on success.
    pub fn interpret(body: &Value) -> Self {
        let Some(status) = body.get("status") else {
            return PollOutcome::Confirmed;
        };
        match status.as_i64() {
            Some(STATUS_SCANNED) => PollOutcome::Scanned,
            Some(STATUS_EXPIRED) => match body.get("new_token").and_then(replacement_token) {
                Some(token) => PollOutcome::Rotated(token),
                None => PollOutcome::Pending,
            },
            _ => PollOutcome::Pending,
        }
    }
}

// The web client reads `new_token.Token`; a bare string is accepted too
fn replacement_token(value: &Value) -> Option<String> {
    let token = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map
            .get("Token")
            .or_else(|| map.get("token"))
            .and_then(Value::as_str),
        _ => None,
    };
    token.filter(|t| !t.is_empty()).map(str::to_string)
}

/// A running QR login
///
/// Dropping the handle cancels the login.
#[derive(Debug)]
pub struct QrLoginHandle {
    url: String,
    cancel: CancellationToken,
    guard: DropGuard,
    task: JoinHandle<Result<LoginOutcome>>,
}

impl QrLoginHandle {
    /// URL to encode into the scannable code
    ///
    /// Rotations are announced as [`Event::QrCodeRotated`].
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop polling
    ///
    /// No status request is sent after this returns; [`wait`](Self::wait)
    /// then yields [`LoginOutcome::Cancelled`] unless the login had already
    /// been confirmed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the login to finish
    pub async fn wait(self) -> Result<LoginOutcome> {
        let QrLoginHandle { task, guard, .. } = self;
        let outcome = task
            .await
            .map_err(|e| Error::Other(format!("login task failed: {e}")))?;
        guard.disarm();
        outcome
    }
}

impl ZhihuClient {
    /// Run the handshake and start polling for a scan
    ///
    /// Emits [`Event::QrCodeIssued`] with the scan URL before returning.
    /// Only one login may run per client at a time; a second call while one
    /// is in flight fails with [`Error::LoginInProgress`].
    pub async fn start_qr_login(&self) -> Result<QrLoginHandle> {
        let login_guard = self
            .login_guard
            .clone()
            .try_lock_owned()
            .map_err(|_| Error::LoginInProgress)?;

        let challenge = self.handshake().await?;
        let url = challenge.qr_url(&self.config.endpoints.www);
        self.emit_event(Event::QrCodeIssued { url: url.clone() });

        let cancel = CancellationToken::new();
        let client = self.clone();
        let poll_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let _login_guard = login_guard;
            let outcome = client.poll_login(challenge.token, poll_cancel).await;
            if let Err(e) = client.store.remove(store::LOGIN).await {
                tracing::warn!(error = %e, "failed to clear the login challenge");
            }
            outcome
        });

        Ok(QrLoginHandle {
            url,
            guard: cancel.clone().drop_guard(),
            cancel,
            task,
        })
    }

    /// Log in by QR code and wait for the outcome
    ///
    /// The scan URL is only available through [`Event::QrCodeIssued`], so
    /// subscribe before calling this.
    pub async fn login_with_qr(&self) -> Result<LoginOutcome> {
        self.start_qr_login().await?.wait().await
    }

    async fn poll_login(&self, mut token: String, cancel: CancellationToken) -> Result<LoginOutcome> {
        let interval = self.config.login.poll_interval;
        let budget = self.config.login.poll_budget;
        let deadline = Instant::now() + budget;

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut scanned = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.login_cancelled()),
                _ = tokio::time::sleep_until(deadline) => return Err(self.poll_budget_elapsed(budget)),
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.login_cancelled()),
                _ = tokio::time::sleep_until(deadline) => return Err(self.poll_budget_elapsed(budget)),
                polled = self.poll_status(&token) => polled,
            };

            let (response, body) = match polled {
                Ok(polled) => polled,
                Err(e) if e.is_programmer_error() => return Err(e),
                Err(e) => {
                    tracing::warn!(step = %Step::QrStatus, error = %e, "status poll failed, retrying on next tick");
                    self.emit_event(Event::StepFailed {
                        step: Step::QrStatus,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match PollOutcome::interpret(&body) {
                PollOutcome::Pending => {
                    tracing::debug!(token = %token, "qr code not scanned yet");
                }
                PollOutcome::Scanned => {
                    if !scanned {
                        scanned = true;
                        tracing::info!("qr code scanned, waiting for confirmation");
                        self.emit_event(Event::QrCodeScanned);
                    }
                }
                PollOutcome::Rotated(new_token) => {
                    let url = qr_url_for_token(&self.config.endpoints.www, &new_token);
                    tracing::info!(token = %new_token, "qr code expired and was reissued");
                    self.store
                        .merge(json!({ store::LOGIN: { "token": new_token, "link": url } }))
                        .await?;
                    token = new_token;
                    scanned = false;
                    self.emit_event(Event::QrCodeRotated { url });
                }
                PollOutcome::Confirmed => {
                    self.emit_event(Event::StepSucceeded { step: Step::QrStatus });
                    let profile = self.confirm_login(response, body).await?;
                    return Ok(LoginOutcome::Confirmed(profile));
                }
            }
        }
    }

    fn poll_budget_elapsed(&self, budget: Duration) -> Error {
        let err = Error::Timeout {
            step: Step::QrStatus,
            after: budget,
        };
        self.emit_event(Event::StepFailed {
            step: Step::QrStatus,
            error: err.to_string(),
        });
        err
    }

    async fn poll_status(&self, token: &str) -> Result<(RemoteResponse, Value)> {
        let response = self
            .execute(
                Action::get(
                    Step::QrStatus,
                    self.www(&format!("/api/v3/account/api/login/qrcode/{token}/scan_info")),
                )
                .cookies(cookie_set::POLLING)
                .referer(self.signin_page()),
            )
            .await?;
        let body = response.json_value()?;
        Ok((response, body))
    }

    fn login_cancelled(&self) -> LoginOutcome {
        tracing::info!("qr login cancelled");
        self.emit_event(Event::LoginCancelled);
        LoginOutcome::Cancelled
    }

    async fn confirm_login(&self, response: RemoteResponse, body: Value) -> Result<UserProfile> {
        self.store.merge_cookies(response.cookies()).await?;
        self.store.merge(json!({ store::BEARER: body })).await?;

        let profile = self.post_login().await?;
        tracing::info!(name = %profile.name, "login confirmed");
        self.emit_event(Event::LoginConfirmed {
            name: profile.name.clone(),
        });
        Ok(profile)
    }

    /// Home revisit, token refresh, profile fetch
    ///
    /// Token refresh cookies are single use and never stored; the cookies
    /// rotated by the profile call are the ones later requests forward.
    async fn post_login(&self) -> Result<UserProfile> {
        let www = self.config.endpoints.www.trim_end_matches('/').to_string();
        let home = format!("{www}/");

        self.soft_step(
            Step::HomeRevisit,
            self.execute_and_merge(
                Action::get(Step::HomeRevisit, www.clone())
                    .page()
                    .cookies(cookie_set::AUTHENTICATED)
                    .referer(self.signin_page()),
            ),
        )
        .await?;

        self.soft_step(
            Step::TokenRefresh,
            self.execute(
                Action::post(Step::TokenRefresh, self.www("/api/account/prod/token/refresh"))
                    .cookies(cookie_set::SESSION)
                    .referer(home.clone())
                    .origin(www.clone()),
            ),
        )
        .await?;

        self.step(Step::Profile, async {
            let response = self
                .execute(
                    Action::get(Step::Profile, self.www("/api/v4/me?include=is_realname"))
                        .cookies(cookie_set::SESSION)
                        .header(ZSE_VERSION_HEADER, ZSE_VERSION)
                        .referer(home),
                )
                .await?;
            let info = response.json_value()?;
            if !info.is_object() {
                return Err(Error::parse(Step::Profile, "profile is not an object"));
            }
            let profile: UserProfile = serde_json::from_value(info.clone())
                .map_err(|e| Error::parse(Step::Profile, e.to_string()))?;
            self.store.merge_cookies(response.cookies()).await?;
            self.store.merge(json!({ store::USER_INFO: info })).await?;
            Ok(profile)
        })
        .await
    }
}
