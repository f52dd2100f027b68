#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Crawl a mocked GitHub repository through the rate-limit wrapper into a memory store

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use docs_rag::Result;
use docs_rag::config::{DocsConfig, GithubConfig};
use docs_rag::crawler::DocsCrawler;
use docs_rag::database::{ChunkStore, MemoryStore};
use docs_rag::embeddings::Embedder;
use docs_rag::github::{GithubClient, RateLimitRetry};
use docs_rag::indexer::Reindexer;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct LengthEmbedder;

#[async_trait]
impl Embedder for LengthEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![text.len() as f32, 1.0])
    }
}

fn file_body(repo_path: &str, content: &str) -> serde_json::Value {
    json!({
        "name": repo_path.rsplit('/').next().unwrap_or(repo_path),
        "path": repo_path,
        "type": "file",
        "encoding": "base64",
        "content": STANDARD.encode(content)
    })
}

async fn mount_repository(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/aframevr/aframe/contents/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "core", "path": "docs/core", "type": "dir" },
            { "name": "README.md", "path": "docs/README.md", "type": "file" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/aframevr/aframe/contents/docs/core"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "scene.md", "path": "docs/core/scene.md", "type": "file" },
            { "name": "scene.png", "path": "docs/core/scene.png", "type": "file" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/aframevr/aframe/contents/docs/core/scene.md"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_body(
            "docs/core/scene.md",
            "---\ntitle: Scene\nsource_code: src/core/scene/a-scene.js\n---\n\n# Scene\nThe root.\n## Events\nloaded",
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/aframevr/aframe/contents/docs/README.md"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_body(
            "docs/README.md",
            "Documentation for A-Frame.",
        )))
        .mount(server)
        .await;
}

fn crawler_for(server: &MockServer, store: Arc<MemoryStore>) -> DocsCrawler {
    let github = GithubClient::new(&GithubConfig {
        api_url: server.uri(),
        timeout_seconds: 5,
        ..GithubConfig::default()
    })
    .expect("client should build")
    .with_token(None);

    let source = Arc::new(RateLimitRetry::new(github).with_min_wait(Duration::from_millis(10)));
    let reindexer = Reindexer::new(store, Arc::new(LengthEmbedder));
    DocsCrawler::new(source, reindexer, &DocsConfig::default()).with_progress(false)
}

#[tokio::test]
async fn crawls_repository_over_http() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    let store = Arc::new(MemoryStore::new());

    let stats = crawler_for(&server, store.clone())
        .reindex_docs()
        .await
        .expect("crawl should succeed");

    assert_eq!(stats.total_files, 2);
    assert!(stats.is_clean());
    assert_eq!(
        store
            .count_chunks(Some("https://aframe.io/docs/master/core/scene.md"))
            .await
            .expect("count"),
        2
    );
    assert_eq!(
        store
            .count_chunks(Some("https://aframe.io/docs/master/README.md"))
            .await
            .expect("count"),
        1
    );
}

#[tokio::test]
async fn rate_limited_listing_is_retried_transparently() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/aframevr/aframe/contents/docs"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("retry-after", "0"),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    mount_repository(&server).await;

    let store = Arc::new(MemoryStore::new());
    let stats = crawler_for(&server, store.clone())
        .reindex_docs()
        .await
        .expect("crawl should succeed after the quota resets");

    assert_eq!(stats.indexed_files, 2);
    assert_eq!(store.count_chunks(None).await.expect("count"), 3);
}

#[tokio::test]
async fn change_request_purges_removed_documents() {
    let server = MockServer::start().await;
    mount_repository(&server).await;

    Mock::given(method("GET"))
        .and(path("/repos/aframevr/aframe/pulls/12/files"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "filename": "docs/README.md", "status": "removed" },
            { "filename": "docs/core/scene.md", "status": "modified" },
            { "filename": "src/core/scene/a-scene.js", "status": "modified" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let crawler = crawler_for(&server, store.clone());
    crawler.reindex_docs().await.expect("initial crawl");

    let stats = crawler
        .reindex_change_request(12)
        .await
        .expect("change request should be processed");

    assert_eq!(stats.purged_files, 1);
    assert_eq!(stats.indexed_files, 1);
    assert_eq!(
        store
            .count_chunks(Some("https://aframe.io/docs/master/README.md"))
            .await
            .expect("count"),
        0
    );
    assert_eq!(store.count_chunks(None).await.expect("count"), 2);
}

#[tokio::test]
async fn unknown_entry_kind_stops_the_crawl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/aframevr/aframe/contents/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "vendor", "path": "docs/vendor", "type": "submodule" }
        ])))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let error = crawler_for(&server, store)
        .reindex_docs()
        .await
        .expect_err("submodule should fail the crawl");

    assert!(matches!(error, docs_rag::DocsError::PathNotFound(missing) if missing == "docs/vendor"));
}
