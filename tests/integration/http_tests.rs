//! End-to-end harvests through the HTTP renderer
//!
//! These tests use wiremock to serve a small comment feed.

use crate::support::{comment_page, fingerprints, stored_records, test_config};
use comment_harvest::config::Config;
use comment_harvest::storage::{CheckpointStore, JsonCheckpointStore};
use comment_harvest::{HarvestOutcome, Harvester, UrlMode};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_config(dir: &Path, server: &MockServer) -> Config {
    let mut config = test_config(dir);
    config.feed.base_url = format!("{}/commentary", server.uri());
    config
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

fn start_after(config: &Config, page: u32) {
    JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path))
        .save(page, &Default::default())
        .unwrap();
}

#[tokio::test]
async fn test_http_harvest_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/commentary/2"))
        .respond_with(html(comment_page(&["second page", "more"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/commentary/3"))
        .respond_with(html(comment_page(&[])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/commentary"))
        .respond_with(html(comment_page(&["first page"])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = http_config(dir.path(), &server);

    let mut harvester = Harvester::from_config(config.clone()).unwrap();
    let outcome = harvester.run().await.unwrap();

    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 2 });
    let records = stored_records(&config);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].source_url, format!("{}/commentary", server.uri()));
    assert_eq!(records[1].source_url, format!("{}/commentary/2", server.uri()));
    assert_eq!(records[1].author, "user1000");
    assert_eq!(fingerprints(&records).len(), 3);

    // the profile lock is released when the session closes
    assert!(!config.session.profile_dir.join(".harvest.lock").exists());
}

#[tokio::test]
async fn test_http_missing_page_falls_back_to_query_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/commentary/2"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<html><body>gone</body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/commentary"))
        .and(query_param("page", "2"))
        .respond_with(html(comment_page(&["served by query"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/commentary/3"))
        .respond_with(html(comment_page(&[])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = http_config(dir.path(), &server);
    assert_eq!(config.feed.url_mode, UrlMode::Auto);
    start_after(&config, 1);

    let outcome = Harvester::from_config(config.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 2 });
    let records = stored_records(&config);
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].source_url,
        format!("{}/commentary?page=2", server.uri())
    );
}

#[tokio::test]
async fn test_http_server_errors_are_retried_then_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/commentary/2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/commentary/3"))
        .respond_with(html(comment_page(&["survivor"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/commentary/4"))
        .respond_with(html(comment_page(&[])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = http_config(dir.path(), &server);
    config.feed.url_mode = UrlMode::Path;
    start_after(&config, 1);

    let outcome = Harvester::from_config(config.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 3 });
    let records = stored_records(&config);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].page, 3);

    let checkpoint = JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path))
        .load()
        .unwrap();
    assert_eq!(checkpoint.last_page, 3);
    assert_eq!(checkpoint.seen_fingerprints.len(), 1);
}
