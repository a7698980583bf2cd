//! Anonymous cookie handshake
//!
//! Six strictly sequential calls, each contributing cookies the next one
//! forwards. The home page, sign-in page, device id and QR descriptor are
//! required; the telemetry beacon and captcha session are best effort.

use super::ZhihuClient;
use crate::error::{Error, Result};
use crate::request::{Action, ZSE_VERSION, ZSE_VERSION_HEADER, cookie_set};
use crate::store;
use crate::types::{LoginChallenge, Step};
use serde_json::json;

/// Telemetry beacon payload the web client sends on sign-in page load
const INIT_BEACON: &str = "production.heifetz.desktop.v1.za_helper.init.count";

impl ZhihuClient {
    /// Referer of every call made from the sign-in page
    pub(crate) fn signin_page(&self) -> String {
        self.www("/signin?next=%2F")
    }

    /// Run the handshake and return the issued login challenge
    ///
    /// Cookies gathered by completed steps stay in the store even when a
    /// later step fails.
    pub(crate) async fn handshake(&self) -> Result<LoginChallenge> {
        let www = self.config.endpoints.www.trim_end_matches('/').to_string();
        let signin = self.signin_page();

        self.step(
            Step::InitCookies,
            self.execute_and_merge(Action::get(Step::InitCookies, www.clone()).page()),
        )
        .await?;

        self.step(
            Step::SignInPage,
            self.execute_and_merge(
                Action::get(Step::SignInPage, signin.clone())
                    .page()
                    .cookies(cookie_set::HANDSHAKE),
            ),
        )
        .await?;

        self.step(
            Step::DeviceId,
            self.execute_and_merge(
                Action::post(Step::DeviceId, self.www("/udid"))
                    .cookies(cookie_set::HANDSHAKE)
                    .csrf()
                    .header(ZSE_VERSION_HEADER, ZSE_VERSION)
                    .referer(signin.clone())
                    .origin(www.clone()),
            ),
        )
        .await?;

        self.soft_step(
            Step::Telemetry,
            self.execute(
                Action::post(Step::Telemetry, self.www("/sc-profiler"))
                    .cookies(cookie_set::HANDSHAKE)
                    .referer(signin.clone())
                    .origin(www.clone())
                    .json(json!([["i", INIT_BEACON, 1, 1]])),
            ),
        )
        .await?;

        let challenge = self
            .step(Step::QrDescriptor, async {
                let response = self
                    .execute(
                        Action::post(Step::QrDescriptor, self.www("/api/v3/account/api/login/qrcode"))
                            .cookies(cookie_set::DEVICE)
                            .referer(signin.clone())
                            .origin(www.clone()),
                    )
                    .await?;
                let descriptor = response.json_value()?;
                let challenge: LoginChallenge = serde_json::from_value(descriptor.clone())
                    .map_err(|e| Error::parse(Step::QrDescriptor, format!("no login token: {e}")))?;
                self.store.merge(json!({ store::LOGIN: descriptor })).await?;
                Ok(challenge)
            })
            .await?;

        self.soft_step(
            Step::CaptchaSession,
            self.execute_and_merge(
                Action::get(
                    Step::CaptchaSession,
                    self.www("/api/v3/oauth/captcha/v2?type=captcha_sign_in"),
                )
                .cookies(cookie_set::DEVICE)
                .referer(signin),
            ),
        )
        .await?;

        tracing::info!(token = %challenge.token, "login challenge issued");
        Ok(challenge)
    }
}
