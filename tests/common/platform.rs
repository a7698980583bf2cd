//! A scripted stand-in for the platform's HTTP services

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Mount the anonymous handshake; the QR token is `token`
pub async fn mount_handshake(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "_zap=zap; Path=/")
                .append_header("set-cookie", "_xsrf=xsrf; Path=/")
                .append_header("set-cookie", "BEC=bec; Path=/"),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/signin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/udid"))
        .respond_with(ResponseTemplate::new(200).append_header("set-cookie", "d_c0=dc0; Path=/"))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sc-profiler"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/account/api/login/qrcode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": token,
            "link": format!("https://www.zhihu.com/account/scan/login/{token}?/api/login/qrcode")
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/oauth/captcha/v2"))
        .respond_with(
            ResponseTemplate::new(200).append_header("set-cookie", "captcha_session_v2=cap; Path=/"),
        )
        .mount(server)
        .await;
}

/// Mount a scan that is pending `pending_polls` times, then confirmed
pub async fn mount_scan(server: &MockServer, token: &str, pending_polls: u64) {
    let scan = format!("/api/v3/account/api/login/qrcode/{token}/scan_info");
    if pending_polls > 0 {
        Mock::given(method("GET"))
            .and(path(scan.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 1 })))
            .up_to_n_times(pending_polls)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(scan))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "z_c0=session; Path=/; HttpOnly")
                .append_header("set-cookie", "q_c1=qc1; Path=/")
                .set_body_json(json!({ "access_token": "bearer", "user_id": 1 })),
        )
        .mount(server)
        .await;
}

/// Mount token refresh and profile
pub async fn mount_profile(server: &MockServer, name: &str) {
    Mock::given(method("POST"))
        .and(path("/api/account/prod/token/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u-1",
            "name": name,
            "url_token": "writer"
        })))
        .mount(server)
        .await;
}

/// Mount drafts, topics, images and publish for article `id`
pub async fn mount_publishing(server: &MockServer, id: u64) {
    Mock::given(method("POST"))
        .and(path("/api/articles/drafts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": id })))
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/api/articles/{id}/draft")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/autocomplete/topics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "19552832", "name": "Rust（编程语言）", "type": "topic" }
        ])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/api/articles/{id}/topics")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_file": { "state": 2, "image_id": "v2-img" },
            "upload_token": { "access_id": "AK", "access_key": "SK", "access_token": "STS" }
        })))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/v2-[0-9a-f]{32}$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    let result = json!({ "publish": { "url": format!("https://zhuanlan.zhihu.com/p/{id}") } });
    Mock::given(method("POST"))
        .and(path("/api/v4/content/publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "success",
            "data": { "result": result.to_string() }
        })))
        .mount(server)
        .await;
}

/// Requests for `verb` on `at`, in arrival order
pub async fn requests_to(server: &MockServer, verb: &str, at: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == at)
        .collect()
}

/// Number of object store PUTs received
pub async fn put_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .count()
}
