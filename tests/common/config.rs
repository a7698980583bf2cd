//! Test configuration helpers for creating clients against a mock platform

use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;
use zhihu_publish::{Config, EndpointConfig, RetryConfig, ZhihuClient};

/// Config with every service on `server` and state kept under `root`
pub fn mock_config(server: &MockServer, root: &Path) -> Config {
    let mut config = Config {
        endpoints: EndpointConfig::all_at(&server.uri()),
        retry: RetryConfig::disabled(),
        state_path: root.join("zhihu-data.json"),
        vault_dir: root.join("vault"),
        ..Default::default()
    };
    config.login.poll_interval = Duration::from_millis(25);
    config.login.poll_budget = Duration::from_secs(10);
    config.http.request_timeout = Duration::from_secs(5);
    config
}

/// Create a client for `server` with a fresh vault and session.
///
/// Returns the client and the tempdir (which must be kept alive).
pub fn create_test_client(server: &MockServer) -> (ZhihuClient, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::create_dir_all(temp_dir.path().join("vault")).expect("Failed to create vault");
    let client = ZhihuClient::new(mock_config(server, temp_dir.path()))
        .expect("Failed to create client");
    (client, temp_dir)
}

/// A second client sharing `root`'s session document and vault
pub fn reopen_client(server: &MockServer, root: &Path) -> ZhihuClient {
    ZhihuClient::new(mock_config(server, root)).expect("Failed to create client")
}
