use super::*;
use crate::client::test_helpers::*;
use crate::config::RetryConfig;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


#[tokio::test]
async fn new_rejects_invalid_config() {
    let mut config = Config::default();
    config.endpoints.www = "not a url".to_string();
    assert!(matches!(ZhihuClient::new(config), Err(Error::Config { .. })));
}

#[tokio::test]
async fn non_success_status_becomes_remote_error_for_the_step() {
    let server = MockServer::start().await;
    let (client, _dir) = test_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = client
        .execute(Action::get(Step::InitCookies, client.www("/")).page())
        .await
        .unwrap_err();

    match err {
        Error::Remote {
            step,
            status,
            message,
        } => {
            assert_eq!(step, Step::InitCookies);
            assert_eq!(status, 403);
            assert_eq!(message, "forbidden");
        }
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_response_becomes_timeout_not_network_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server, &dir);
    config.http.request_timeout = Duration::from_millis(100);
    let client = ZhihuClient::new(config).unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = client
        .execute(Action::get(Step::InitCookies, client.www("/")))
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Timeout { step: Step::InitCookies, after } if after == Duration::from_millis(100)),
        "got {err:?}"
    );
}

fn retrying_config(server: &MockServer, dir: &tempfile::TempDir) -> Config {
    let mut config = test_config(server, dir);
    config.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config.http.request_timeout = Duration::from_millis(200);
    config
}

#[tokio::test]
async fn timed_out_post_is_not_replayed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = ZhihuClient::new(retrying_config(&server, &dir)).unwrap();
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

    Mock::given(method("POST"))
        .and(path("/api/articles/drafts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": 1 }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = client.new_draft("t").await.unwrap_err();
    assert!(
        matches!(err, Error::Timeout { step: Step::NewDraft, .. }),
        "got {err:?}"
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        received_at(&server, "POST", "/api/articles/drafts").await.len(),
        1,
        "a draft the server may have created must not be created again"
    );
}

#[tokio::test]
async fn timed_out_get_is_retried() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = ZhihuClient::new(retrying_config(&server, &dir)).unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let err = client
        .execute(Action::get(Step::InitCookies, client.www("/")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got {err:?}");
    assert_eq!(received_at(&server, "GET", "/").await.len(), 3);
}

#[tokio::test]
async fn execute_and_merge_stores_response_cookies() {
    let server = MockServer::start().await;
    let (client, _dir) = test_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "_xsrf=abc; Path=/; Domain=zhihu.com")
                .append_header("set-cookie", "BEC=def; Path=/"),
        )
        .mount(&server)
        .await;

    client
        .execute_and_merge(Action::get(Step::InitCookies, client.www("/")))
        .await
        .unwrap();

    let cookies = client.store.cookies().await.unwrap();
    assert_eq!(cookies.get("_xsrf").map(String::as_str), Some("abc"));
    assert_eq!(cookies.get("BEC").map(String::as_str), Some("def"));
}

#[tokio::test]
async fn step_reports_outcome_as_events() {
    let server = MockServer::start().await;
    let (client, _dir) = test_client(&server).await;
    let mut events = client.subscribe();

    client
        .step(Step::Feed, async { Ok(()) })
        .await
        .unwrap();
    let soft: Option<()> = client
        .soft_step(Step::Telemetry, async {
            Err(Error::Other("beacon rejected".into()))
        })
        .await
        .unwrap();
    assert!(soft.is_none());

    let events = drain_events(&mut events);
    assert!(matches!(events[0], Event::StepSucceeded { step: Step::Feed }));
    assert!(matches!(
        &events[1],
        Event::StepFailed { step: Step::Telemetry, error } if error.contains("beacon rejected")
    ));
}

#[tokio::test]
async fn soft_step_still_propagates_missing_csrf_cookie() {
    let server = MockServer::start().await;
    let (client, _dir) = test_client(&server).await;

    let err = client
        .soft_step(
            Step::Telemetry,
            client.execute(Action::post(Step::Telemetry, client.www("/sc-profiler")).csrf()),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingCookie("_xsrf")));
    assert!(received(&server).await.is_empty());
}

#[tokio::test]
async fn logout_forgets_user_but_keeps_device_cookies() {
    let server = MockServer::start().await;
    let (client, _dir) = logged_in_client(&server).await;
    client
        .store
        .merge(serde_json::json!({ store::BEARER: { "access_token": "t" } }))
        .await
        .unwrap();

    assert_eq!(client.current_user().await.unwrap().unwrap().name, "Alice");

    client.logout().await.unwrap();

    assert!(client.current_user().await.unwrap().is_none());
    let doc = client.store.load().await.unwrap();
    assert!(doc.get(store::BEARER).is_none());
    assert!(client.store.cookies().await.unwrap().contains_key("d_c0"));
}

#[tokio::test]
async fn prepare_exposes_the_assembled_request() {
    let server = MockServer::start().await;
    let (client, _dir) = logged_in_client(&server).await;

    let prepared = client
        .prepare(
            Action::post(Step::Publish, client.www("/api/v4/content/publish"))
                .cookies(crate::request::cookie_set::SESSION)
                .csrf(),
        )
        .await
        .unwrap();

    assert_eq!(prepared.header("x-xsrftoken"), Some("xsrf-1"));
    assert!(prepared.cookie_header().unwrap().contains("z_c0=zc0-1"));
    assert!(received(&server).await.is_empty());
}

#[test]
fn join_normalizes_slashes() {
    assert_eq!(join("https://a.test/", "/x"), "https://a.test/x");
    assert_eq!(join("https://a.test", "x?y=1"), "https://a.test/x?y=1");
}
