//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end through the HTTP pipeline.

use pagebinder::config::Config;
use pagebinder::crawler::{crawl, CrawlReport};
use pagebinder::pipeline::HttpPipeline;
use pagebinder::storage::{JsonStateStore, MemoryStateStore, StateStore};
use pagebinder::CrawlPhase;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling from `seed`, writing into `dir`
fn create_test_config(seed: &str, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler.seed_url = seed.to_string();
    config.crawler.max_depth = 2;
    config.crawler.max_concurrent = 4;
    config.crawler.grace_period_secs = 1;
    config.crawler.request_timeout_secs = 5;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.output.document_path = dir.path().join("site.md").display().to_string();
    config.output.state_path = dir.path().join("state.json").display().to_string();
    config
}

async fn run_crawl(config: Config, store: Box<dyn StateStore>) -> CrawlReport {
    let pipeline = HttpPipeline::new(&config, false)
        .await
        .expect("Failed to build pipeline");
    crawl(config, Arc::new(pipeline), store, CancellationToken::new())
        .await
        .expect("Crawl failed to start")
}

fn html_page(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ),
        "text/html",
    )
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page: &str, title: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html_page(title, body))
        .expect(1)
        .mount(server)
        .await;
}

/// Section headings written to the document, in order
fn document_sections(config: &Config) -> Vec<String> {
    let content =
        std::fs::read_to_string(&config.output.document_path).expect("Failed to read document");
    content
        .lines()
        .filter_map(|line| line.strip_prefix("## "))
        .map(|heading| heading.to_string())
        .collect()
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;

    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<p>Welcome</p><a href="/page1">Page 1</a><a href="page2">Page 2</a>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/page1",
        "Page 1",
        r#"<p>Content 1</p><a href="/">Home</a><a href="/page2">Page 2</a>"#,
    )
    .await;
    mount_page(&mock_server, "/page2", "Page 2", "<p>Content 2</p>").await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/", mock_server.uri()), &dir);
    let store = JsonStateStore::new(&config.output.state_path);

    let report = run_crawl(config.clone(), Box::new(store.clone())).await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.stats.pages_appended, 3);
    assert_eq!(report.state.visited_len(), 3);
    assert!(report.state.is_frontier_empty());

    let mut sections = document_sections(&config);
    sections.sort();
    assert_eq!(sections, vec!["Home", "Page 1", "Page 2"]);

    // A completed crawl leaves nothing to resume
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_robots_disallowed_path_is_never_fetched() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nDisallow: /private/").await;

    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<a href="/private/secret">Secret</a><a href="/public">Public</a>"#,
    )
    .await;
    mount_page(&mock_server, "/public", "Public", "<p>Open</p>").await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html_page("Secret", "<p>Hidden</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/", mock_server.uri()), &dir);

    let report = run_crawl(config.clone(), Box::new(MemoryStateStore::new())).await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.stats.robots_denied, 1);
    assert_eq!(report.stats.pages_appended, 2);
    assert!(!document_sections(&config).contains(&"Secret".to_string()));
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    mount_page(&mock_server, "/", "Home", r#"<a href="/private/page">P</a>"#).await;
    mount_page(&mock_server, "/private/page", "Private", "<p>Reachable</p>").await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/", mock_server.uri()), &dir);

    let report = run_crawl(config, Box::new(MemoryStateStore::new())).await;

    assert_eq!(report.stats.robots_denied, 0);
    assert_eq!(report.stats.pages_appended, 2);
}

#[tokio::test]
async fn test_depth_limit() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;

    mount_page(&mock_server, "/", "Home", r#"<a href="/level1">L1</a>"#).await;
    mount_page(&mock_server, "/level1", "Level 1", r#"<a href="/level2">L2</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/level2"))
        .respond_with(html_page("Level 2", "<p>Too deep</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(&format!("{}/", mock_server.uri()), &dir);
    config.crawler.max_depth = 1;

    let report = run_crawl(config.clone(), Box::new(MemoryStateStore::new())).await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(document_sections(&config), vec!["Home", "Level 1"]);
}

#[tokio::test]
async fn test_query_and_fragment_variants_are_one_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;

    mount_page(
        &mock_server,
        "/",
        "Home",
        &format!(
            r#"<a href="/a">A</a><a href="{}/a?x=1#frag">A again</a>"#,
            base_url
        ),
    )
    .await;
    mount_page(&mock_server, "/a", "A", "<p>Only once</p>").await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(&format!("{}/", base_url), &dir);
    config.crawler.max_depth = 1;
    let observer = MemoryStateStore::new();

    let report = run_crawl(config, Box::new(observer.clone())).await;
    assert_eq!(report.stats.links_discovered, 2);
    assert_eq!(report.stats.links_enqueued, 1);

    // The save after the seed page holds exactly one depth-1 entry
    let history = observer.history();
    let frontier: Vec<_> = history[0].frontier().collect();
    assert_eq!(frontier.len(), 1);
    assert_eq!(frontier[0].url.as_str(), format!("{}/a", base_url));
    assert_eq!(frontier[0].depth, 1);
}

#[tokio::test]
async fn test_external_links_not_followed() {
    let site = MockServer::start().await;
    let other = MockServer::start().await;
    mount_robots(&site, "User-agent: *\nAllow: /").await;

    mount_page(
        &site,
        "/",
        "Home",
        &format!(r#"<a href="{}/x">Elsewhere</a>"#, other.uri()),
    )
    .await;
    Mock::given(method("GET"))
        .respond_with(html_page("Other", "<p>External</p>"))
        .expect(0)
        .mount(&other)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/", site.uri()), &dir);

    let report = run_crawl(config, Box::new(MemoryStateStore::new())).await;

    assert_eq!(report.stats.out_of_scope_links, 1);
    assert_eq!(report.stats.pages_appended, 1);
}

#[tokio::test]
async fn test_external_links_followed_when_included() {
    let site = MockServer::start().await;
    let other = MockServer::start().await;
    mount_robots(&site, "User-agent: *\nAllow: /").await;
    mount_robots(&other, "User-agent: *\nAllow: /").await;

    mount_page(
        &site,
        "/",
        "Home",
        &format!(r#"<a href="{}/x">Elsewhere</a>"#, other.uri()),
    )
    .await;
    mount_page(&other, "/x", "Other", "<p>External</p>").await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(&format!("{}/", site.uri()), &dir);
    config.crawler.include_external = true;

    let report = run_crawl(config.clone(), Box::new(MemoryStateStore::new())).await;

    assert_eq!(report.stats.out_of_scope_links, 0);
    let mut sections = document_sections(&config);
    sections.sort();
    assert_eq!(sections, vec!["Home", "Other"]);
}

#[tokio::test]
async fn test_failed_page_is_not_retried() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;

    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<a href="/broken">Broken</a><a href="/ok">OK</a>"#,
    )
    .await;
    mount_page(&mock_server, "/ok", "OK", r#"<a href="/broken">Broken again</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/", mock_server.uri()), &dir);

    let report = run_crawl(config, Box::new(MemoryStateStore::new())).await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.stats.fetch_failures, 1);
    assert_eq!(report.stats.pages_appended, 2);
}

#[tokio::test]
async fn test_first_image_is_stored_with_page() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;

    mount_page(
        &mock_server,
        "/",
        "Home",
        r#"<img src="/logo.png"><img src="/second.png"><p>Pictured</p>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1, 2, 3], "image/png"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/", mock_server.uri()), &dir);

    let report = run_crawl(config.clone(), Box::new(MemoryStateStore::new())).await;

    assert_eq!(report.stats.images_stored, 1);
    let content = std::fs::read_to_string(&config.output.document_path).unwrap();
    assert!(content.contains("![Home](site_images/"));
    assert_eq!(
        std::fs::read_dir(dir.path().join("site_images"))
            .unwrap()
            .count(),
        1
    );
}

#[tokio::test]
async fn test_text_only_skips_images() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;

    mount_page(&mock_server, "/", "Home", r#"<img src="/logo.png"><p>Words</p>"#).await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1, 2, 3], "image/png"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(&format!("{}/", mock_server.uri()), &dir);
    config.content.text_only = true;

    let report = run_crawl(config.clone(), Box::new(MemoryStateStore::new())).await;

    assert_eq!(report.stats.images_stored, 0);
    assert_eq!(report.stats.image_failures, 0);
    let content = std::fs::read_to_string(&config.output.document_path).unwrap();
    assert!(content.contains("Words"));
    assert!(!content.contains("!["));
}
