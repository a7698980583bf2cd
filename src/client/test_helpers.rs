//! Shared test helpers for creating ZhihuClient instances against a mock platform.

use crate::client::ZhihuClient;
use crate::config::{Config, EndpointConfig, RetryConfig};
use crate::types::Event;
use serde_json::json;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Cookies a completed login leaves in the store
pub(crate) const SESSION_COOKIES: &[(&str, &str)] = &[
    ("_zap", "zap-1"),
    ("_xsrf", "xsrf-1"),
    ("BEC", "bec-1"),
    ("d_c0", "dc0-1"),
    ("captcha_session_v2", "captcha-1"),
    ("z_c0", "zc0-1"),
    ("q_c1", "qc1-1"),
];

/// Config pointing every service at `server`, with state and vault in `dir`
pub(crate) fn test_config(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config {
        endpoints: EndpointConfig::all_at(&server.uri()),
        retry: RetryConfig::disabled(),
        state_path: dir.path().join("zhihu-data.json"),
        vault_dir: dir.path().join("vault"),
        ..Default::default()
    };
    config.login.poll_interval = Duration::from_millis(20);
    config.login.poll_budget = Duration::from_secs(5);
    config.http.request_timeout = Duration::from_secs(5);
    std::fs::create_dir_all(&config.vault_dir).unwrap();
    config
}

/// Helper to create a test client with an empty session.
/// Returns the client and the tempdir (which must be kept alive).
pub(crate) async fn test_client(server: &MockServer) -> (ZhihuClient, TempDir) {
    let dir = tempdir().unwrap();
    let client = ZhihuClient::new(test_config(server, &dir)).unwrap();
    (client, dir)
}

/// Like [`test_client`] but with a completed login in the store
pub(crate) async fn logged_in_client(server: &MockServer) -> (ZhihuClient, TempDir) {
    let (client, dir) = test_client(server).await;
    client
        .store
        .merge_cookies(
            SESSION_COOKIES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
        .await
        .unwrap();
    client
        .store
        .merge(json!({ "userInfo": { "name": "Alice", "id": "u-1" } }))
        .await
        .unwrap();
    (client, dir)
}

/// Minimal PNG-signed bytes; `seed` makes the content hash distinct
pub(crate) fn png_bytes(seed: u8) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
    bytes.extend(std::iter::repeat_n(seed, 32));
    bytes
}

/// MD5 hex of `bytes`
pub(crate) fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Write a file into the client's vault and return its vault-relative name
pub(crate) fn write_vault_file(client: &ZhihuClient, name: &str, bytes: &[u8]) -> String {
    let path = client.config.vault_dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    name.to_string()
}

/// Requests received so far, in arrival order
pub(crate) async fn received(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

/// Requests received for `method` + `path`
pub(crate) async fn received_at(server: &MockServer, verb: &str, at: &str) -> Vec<Request> {
    received(server)
        .await
        .into_iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == at)
        .collect()
}

/// Header value of a recorded request
pub(crate) fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

/// JSON body of a recorded request
pub(crate) fn json_body(request: &Request) -> serde_json::Value {
    serde_json::from_slice(&request.body).unwrap()
}

/// Everything currently buffered on an event receiver
pub(crate) fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Mount the six anonymous handshake endpoints; the challenge token is `token`
pub(crate) async fn mount_handshake(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "_zap=zap-1; Path=/; Domain=zhihu.com")
                .append_header("set-cookie", "_xsrf=xsrf-1; Path=/")
                .append_header("set-cookie", "BEC=bec-1; Path=/")
                .set_body_string("<html></html>"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/udid"))
        .respond_with(
            ResponseTemplate::new(200).append_header("set-cookie", "d_c0=dc0-1; Path=/"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sc-profiler"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v3/account/api/login/qrcode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": token,
            "link": format!("https://www.zhihu.com/account/scan/login/{token}?/api/login/qrcode"),
            "expires_at": 1_700_000_000
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v3/oauth/captcha/v2"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "captcha_session_v2=captcha-1; Path=/")
                .set_body_json(json!({ "show_captcha": false })),
        )
        .mount(server)
        .await;
}

/// Mount the post-login chain
///
/// The token refresh sets `BEC=bec-refresh` and `refresh_only`; the profile
/// call rotates `BEC` to `bec-profile` and sets `profile_only`.
pub(crate) async fn mount_post_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/account/prod/token/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "BEC=bec-refresh; Path=/")
                .append_header("set-cookie", "refresh_only=r-1; Path=/")
                .set_body_json(json!({})),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v4/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "BEC=bec-profile; Path=/")
                .append_header("set-cookie", "profile_only=p-1; Path=/")
                .set_body_json(json!({
                    "id": "u-1",
                    "name": "Alice",
                    "url_token": "alice",
                    "headline": "writes things",
                    "is_realname": true
                })),
        )
        .mount(server)
        .await;
}
