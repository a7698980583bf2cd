//! Session-aware request construction
//!
//! An [`Action`] names everything a call needs: the step it belongs to, the
//! method and URL, the exact cookie subset to forward, whether the CSRF header
//! is required, and the body. [`SignedRequestBuilder::build`] turns it into a
//! [`PreparedRequest`] carrying a browser fingerprint, the `Cookie` header
//! built from the current session, and the `x-xsrftoken` header when asked.
//!
//! Only the cookies an action lists are sent. Forwarding the whole jar makes
//! the platform reject several of the login endpoints.

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::store::{CredentialStore, cookies};
use crate::types::Step;
use reqwest::Method;
use reqwest::header::{
    ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, ORIGIN,
    REFERER, USER_AGENT,
};
use serde_json::Value;
use std::sync::Arc;

/// Cookie carrying the anti-forgery token
pub const CSRF_COOKIE: &str = "_xsrf";

/// Header the anti-forgery token is echoed in
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-xsrftoken");

/// Signature scheme version header expected by the device and profile endpoints
pub const ZSE_VERSION_HEADER: HeaderName = HeaderName::from_static("x-zse-93");

/// Value sent in [`ZSE_VERSION_HEADER`]
pub const ZSE_VERSION: &str = "101_3_3.0";

/// Cookie subsets forwarded at each stage of the session
pub mod cookie_set {
    /// Anonymous handshake cookies
    pub const HANDSHAKE: &[&str] = &["_zap", "_xsrf", "BEC"];
    /// Handshake plus the device cookie
    pub const DEVICE: &[&str] = &["_zap", "_xsrf", "BEC", "d_c0"];
    /// Device plus the captcha session, used while polling
    pub const POLLING: &[&str] = &["_zap", "_xsrf", "BEC", "d_c0", "captcha_session_v2"];
    /// Polling plus the primary session cookie
    pub const AUTHENTICATED: &[&str] = &[
        "_zap",
        "_xsrf",
        "BEC",
        "d_c0",
        "captcha_session_v2",
        "z_c0",
    ];
    /// Everything a completed login holds
    pub const SESSION: &[&str] = &[
        "_zap",
        "_xsrf",
        "BEC",
        "d_c0",
        "captcha_session_v2",
        "z_c0",
        "q_c1",
    ];
}

/// Which browser request shape to imitate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fingerprint {
    /// Top-level page navigation
    Page,
    /// Script-issued `fetch` call
    Fetch,
    /// No browser headers (direct object store upload)
    None,
}

/// Request body
#[derive(Clone, Debug)]
pub enum Body {
    /// JSON document
    Json(Value),
    /// Raw bytes with an explicit content type
    Bytes {
        /// Content type sent with the bytes
        content_type: String,
        /// Payload
        data: Vec<u8>,
    },
}

/// Description of one platform call
#[derive(Clone, Debug)]
pub struct Action {
    /// Step the call belongs to
    pub step: Step,
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Cookie names to forward, in header order
    pub cookies: &'static [&'static str],
    /// Whether the CSRF header must be sent
    pub csrf: bool,
    /// Browser request shape
    pub fingerprint: Fingerprint,
    /// Referer to send, if any
    pub referer: Option<String>,
    /// Origin to send, if any
    pub origin: Option<String>,
    /// Additional headers
    pub headers: Vec<(HeaderName, String)>,
    /// Request body
    pub body: Option<Body>,
}

impl Action {
    /// Start describing a call
    pub fn new(step: Step, method: Method, url: impl Into<String>) -> Self {
        Self {
            step,
            method,
            url: url.into(),
            cookies: &[],
            csrf: false,
            fingerprint: Fingerprint::Fetch,
            referer: None,
            origin: None,
            headers: Vec::new(),
            body: None,
        }
    }

    /// GET request
    pub fn get(step: Step, url: impl Into<String>) -> Self {
        Self::new(step, Method::GET, url)
    }

    /// POST request
    pub fn post(step: Step, url: impl Into<String>) -> Self {
        Self::new(step, Method::POST, url)
    }

    /// PATCH request
    pub fn patch(step: Step, url: impl Into<String>) -> Self {
        Self::new(step, Method::PATCH, url)
    }

    /// PUT request
    pub fn put(step: Step, url: impl Into<String>) -> Self {
        Self::new(step, Method::PUT, url)
    }

    /// Forward these cookies
    pub fn cookies(mut self, keys: &'static [&'static str]) -> Self {
        self.cookies = keys;
        self
    }

    /// Require the CSRF header
    pub fn csrf(mut self) -> Self {
        self.csrf = true;
        self
    }

    /// Imitate a page navigation instead of a fetch call
    pub fn page(mut self) -> Self {
        self.fingerprint = Fingerprint::Page;
        self
    }

    /// Send no browser fingerprint
    pub fn bare(mut self) -> Self {
        self.fingerprint = Fingerprint::None;
        self
    }

    /// Set the Referer header
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Set the Origin header
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Send a JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    /// Send raw bytes
    pub fn bytes(mut self, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.body = Some(Body::Bytes {
            content_type: content_type.into(),
            data,
        });
        self
    }
}

/// A fully assembled request, inspectable before it is sent
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    /// Step the call belongs to
    pub step: Step,
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Final header set
    pub headers: HeaderMap,
    /// Encoded body
    pub body: Option<Vec<u8>>,
}

impl PreparedRequest {
    /// Value of a header as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of the `Cookie` header
    pub fn cookie_header(&self) -> Option<&str> {
        self.header(COOKIE.as_str())
    }

    pub(crate) fn to_reqwest(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut builder = client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

/// Builds requests from the current session state
#[derive(Clone, Debug)]
pub struct SignedRequestBuilder {
    store: Arc<CredentialStore>,
    http: HttpConfig,
}

impl SignedRequestBuilder {
    /// Create a builder reading cookies from `store`
    pub fn new(store: Arc<CredentialStore>, http: HttpConfig) -> Self {
        Self { store, http }
    }

    /// Assemble `action` into a request
    ///
    /// Fails with [`Error::MissingCookie`] when the action needs the CSRF
    /// header and the session has no `_xsrf` cookie.
    pub async fn build(&self, action: Action) -> Result<PreparedRequest> {
        let mut headers = HeaderMap::new();

        if action.fingerprint != Fingerprint::None {
            let user_agent = self
                .store
                .user_agent()
                .await?
                .unwrap_or_else(|| self.http.user_agent.clone());
            headers.insert(USER_AGENT, header_value(USER_AGENT.as_str(), &user_agent)?);
            headers.insert(
                ACCEPT_LANGUAGE,
                header_value(ACCEPT_LANGUAGE.as_str(), &self.http.accept_language)?,
            );
            apply_fingerprint(&mut headers, action.fingerprint);
        }

        let needed: Vec<&str> = if action.csrf && !action.cookies.contains(&CSRF_COOKIE) {
            action
                .cookies
                .iter()
                .copied()
                .chain(std::iter::once(CSRF_COOKIE))
                .collect()
        } else {
            action.cookies.to_vec()
        };
        let session = if needed.is_empty() {
            Vec::new()
        } else {
            self.store.select(&needed).await?
        };

        if action.csrf {
            let token = session
                .iter()
                .find(|(name, _)| name == CSRF_COOKIE)
                .map(|(_, value)| value.as_str())
                .ok_or(Error::MissingCookie(CSRF_COOKIE))?;
            headers.insert(CSRF_HEADER, header_value(CSRF_HEADER.as_str(), token)?);
        }

        let forwarded = session
            .iter()
            .filter(|(name, _)| action.cookies.contains(&name.as_str()))
            .map(|(name, value)| (name.as_str(), value.as_str()));
        let cookie = cookies::header_value(forwarded);
        if !cookie.is_empty() {
            headers.insert(COOKIE, header_value(COOKIE.as_str(), &cookie)?);
        }

        if let Some(referer) = &action.referer {
            headers.insert(REFERER, header_value(REFERER.as_str(), referer)?);
        }
        if let Some(origin) = &action.origin {
            headers.insert(ORIGIN, header_value(ORIGIN.as_str(), origin)?);
        }

        let body = match action.body {
            Some(Body::Json(value)) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(serde_json::to_vec(&value)?)
            }
            Some(Body::Bytes { content_type, data }) => {
                headers.insert(
                    CONTENT_TYPE,
                    header_value(CONTENT_TYPE.as_str(), &content_type)?,
                );
                Some(data)
            }
            None => None,
        };

        for (name, value) in action.headers {
            let value = header_value(name.as_str(), &value)?;
            headers.insert(name, value);
        }

        tracing::debug!(
            step = %action.step,
            method = %action.method,
            url = %action.url,
            cookies = session.len(),
            "prepared request"
        );

        Ok(PreparedRequest {
            step: action.step,
            method: action.method,
            url: action.url,
            headers,
            body,
        })
    }
}

fn apply_fingerprint(headers: &mut HeaderMap, fingerprint: Fingerprint) {
    let fixed: &[(&'static str, &'static str)] = match fingerprint {
        Fingerprint::Page => &[
            (
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
            ("dnt", "1"),
            ("sec-gpc", "1"),
            ("upgrade-insecure-requests", "1"),
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "same-origin"),
            ("sec-fetch-user", "?1"),
            ("priority", "u=0, i"),
        ],
        Fingerprint::Fetch => &[
            ("accept", "*/*"),
            ("x-requested-with", "fetch"),
            ("dnt", "1"),
            ("sec-gpc", "1"),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-site", "same-origin"),
            ("priority", "u=4"),
        ],
        Fingerprint::None => &[],
    };
    for (name, value) in fixed {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
}

/// Convert a dynamic string into a header value
pub(crate) fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Other(format!("value for header {name} contains invalid characters")))
}
