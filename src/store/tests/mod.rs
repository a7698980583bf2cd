use crate::store::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_load_of_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("zhihu-data.json"));

    assert_eq!(store.load().await.unwrap(), json!({}));
    assert!(store.cookies().await.unwrap().is_empty());
    assert!(store.cached_hashes().await.unwrap().is_empty());
    assert!(store.user_profile().await.unwrap().is_none());
}

#[tokio::test]
async fn test_load_of_empty_file_is_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("zhihu-data.json");
    std::fs::write(&path, "  \n").unwrap();

    let store = CredentialStore::new(&path);
    assert_eq!(store.load().await.unwrap(), json!({}));
}

#[tokio::test]
async fn test_merge_persists_and_keeps_unrelated_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");
    let store = CredentialStore::new(&path);

    store
        .merge(json!({"cookies": {"_xsrf": "x", "BEC": "b"}}))
        .await
        .unwrap();
    store
        .merge(json!({"cookies": {"d_c0": "d"}, "settings": {"user_agent": "UA"}}))
        .await
        .unwrap();

    // A fresh handle sees what the first one wrote
    let reopened = CredentialStore::new(&path);
    let cookies = reopened.cookies().await.unwrap();
    assert_eq!(cookies.len(), 3);
    assert_eq!(cookies["_xsrf"], "x");
    assert_eq!(cookies["d_c0"], "d");
    assert_eq!(reopened.user_agent().await.unwrap().as_deref(), Some("UA"));
    assert!(!dir.path().join("nested").join("state.json.tmp").exists());
}

#[tokio::test]
async fn test_select_returns_requested_subset_in_order() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("s.json"));
    store
        .merge_cookies(vec![
            ("BEC".into(), "b".into()),
            ("_zap".into(), "z".into()),
            ("_xsrf".into(), "x".into()),
            ("z_c0".into(), "secret".into()),
        ])
        .await
        .unwrap();

    let selected = store.select(&["_zap", "_xsrf", "BEC", "d_c0"]).await.unwrap();
    assert_eq!(
        selected,
        vec![
            ("_zap".to_string(), "z".to_string()),
            ("_xsrf".to_string(), "x".to_string()),
            ("BEC".to_string(), "b".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_remove_drops_key_but_keeps_cookies() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("s.json"));
    store
        .merge(json!({
            "cookies": {"z_c0": "token"},
            "userInfo": {"name": "someone", "id": "42"},
            "bearer": {"z_c0": "token"}
        }))
        .await
        .unwrap();

    assert_eq!(
        store.user_profile().await.unwrap().unwrap().name,
        "someone"
    );
    assert!(store.remove(USER_INFO).await.unwrap());
    assert!(!store.remove(USER_INFO).await.unwrap());
    assert!(store.user_profile().await.unwrap().is_none());
    assert_eq!(store.cookies().await.unwrap()["z_c0"], "token");
}

#[tokio::test]
async fn test_record_uploaded_hash_appends_without_duplicates() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("s.json"));

    store.record_uploaded_hash("aaa").await.unwrap();
    store.record_uploaded_hash("bbb").await.unwrap();
    store.record_uploaded_hash("aaa").await.unwrap();

    let doc = store.load().await.unwrap();
    assert_eq!(doc["cache"], json!(["aaa", "bbb"]));
    assert!(store.is_cached("bbb").await.unwrap());
    assert!(!store.is_cached("ccc").await.unwrap());
}

#[tokio::test]
async fn test_concurrent_merges_do_not_lose_keys() {
    let dir = tempdir().unwrap();
    let store = Arc::new(CredentialStore::new(dir.path().join("s.json")));

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .merge_cookies(vec![(format!("k{i}"), format!("v{i}"))])
                .await
                .unwrap();
            store.record_uploaded_hash(&format!("h{i}")).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.cookies().await.unwrap().len(), 16);
    assert_eq!(store.cached_hashes().await.unwrap().len(), 16);
}

#[tokio::test]
async fn test_blank_user_agent_is_ignored() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("s.json"));
    store.set_user_agent("  ").await.unwrap();
    assert_eq!(store.user_agent().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_challenge_reads_descriptor() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("s.json"));
    assert!(store.login_challenge().await.unwrap().is_none());

    store
        .merge(json!({"login": {"token": "T1", "link": "https://www.zhihu.com/x", "expires_at": 1}}))
        .await
        .unwrap();

    let challenge = store.login_challenge().await.unwrap().unwrap();
    assert_eq!(challenge.token, "T1");
    assert_eq!(challenge.scan_url, "https://www.zhihu.com/x");
}

#[tokio::test]
async fn test_corrupt_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("s.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = CredentialStore::new(&path);
    assert!(matches!(
        store.load().await,
        Err(crate::Error::Serialization(_))
    ));
}
