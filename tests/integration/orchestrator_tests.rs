//! Integration tests for crawl orchestration
//!
//! These tests drive the coordinator with a scripted in-memory pipeline, so
//! concurrency, resume and interrupt behavior can be checked without a network.

use async_trait::async_trait;
use pagebinder::config::Config;
use pagebinder::crawler::{crawl, CrawlReport};
use pagebinder::pipeline::{PageContent, Pipeline};
use pagebinder::storage::MemoryStateStore;
use pagebinder::url::{normalize_absolute, QueryPolicy};
use pagebinder::{CrawlPhase, CrawlState, DocumentError, FetchError, ImageError, NormalizedUrl};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

const SITE: &str = "https://example.com";

fn u(path: &str) -> String {
    if path.starts_with("http") {
        path.to_string()
    } else {
        format!("{}{}", SITE, path)
    }
}

struct ScriptedPage {
    links: Vec<String>,
    delay: Duration,
}

/// A site whose pages, links and timings are fixed up front
///
/// Records every fetch and every document append, and tracks how many
/// fetches were running at once.
#[derive(Default)]
struct ScriptedSite {
    pages: HashMap<String, ScriptedPage>,
    redirects: HashMap<String, String>,
    robots: Option<String>,
    cancel_on: Option<(String, CancellationToken)>,
    panic_on: Option<String>,
    fetched: Mutex<Vec<String>>,
    appended: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSite {
    fn new() -> Self {
        Self::default()
    }

    fn page(self, path: &str, links: &[&str]) -> Self {
        self.slow_page(path, links, Duration::ZERO)
    }

    fn slow_page(mut self, path: &str, links: &[&str], delay: Duration) -> Self {
        self.pages.insert(
            u(path),
            ScriptedPage {
                links: links.iter().map(|l| l.to_string()).collect(),
                delay,
            },
        );
        self
    }

    /// Serves `to` whenever `from` is fetched
    fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(u(from), u(to));
        self
    }

    fn robots(mut self, body: &str) -> Self {
        self.robots = Some(body.to_string());
        self
    }

    /// Fires `token` as soon as `path` starts being fetched
    fn cancel_when_fetching(mut self, path: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((u(path), token));
        self
    }

    fn panic_when_fetching(mut self, path: &str) -> Self {
        self.panic_on = Some(u(path));
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    fn appended(&self) -> Vec<String> {
        self.appended.lock().unwrap().clone()
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pipeline for ScriptedSite {
    async fn fetch_robots(&self, url: &Url) -> Result<String, FetchError> {
        self.robots.clone().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }

    async fn fetch_and_extract(&self, url: &NormalizedUrl) -> Result<PageContent, FetchError> {
        let key = url.as_str().to_string();
        self.fetched.lock().unwrap().push(key.clone());

        if let Some((path, token)) = &self.cancel_on {
            if *path == key {
                token.cancel();
            }
        }
        if self.panic_on.as_deref() == Some(key.as_str()) {
            panic!("scripted panic for {}", key);
        }

        let landed = self.redirects.get(&key).cloned().unwrap_or_else(|| key.clone());
        let page = self.pages.get(&landed).ok_or_else(|| FetchError::Status {
            url: key.clone(),
            status: 404,
        })?;

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(page.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        Ok(PageContent {
            url: url.clone(),
            final_url: Url::parse(&landed).expect("scripted URLs are absolute"),
            title: Some(landed.clone()),
            text: format!("Text of {}", landed),
            image_ref: None,
            html: String::new(),
        })
    }

    fn discover_links(&self, page: &PageContent) -> Vec<String> {
        self.pages
            .get(page.final_url.as_str())
            .map(|p| p.links.clone())
            .unwrap_or_default()
    }

    async fn process_image(&self, image_ref: &Url) -> Result<PathBuf, ImageError> {
        Err(ImageError::InvalidReference(image_ref.to_string()))
    }

    async fn append_to_document(
        &self,
        url: &NormalizedUrl,
        _title: Option<&str>,
        _text: &str,
        _image: Option<&Path>,
    ) -> Result<(), DocumentError> {
        self.appended.lock().unwrap().push(url.as_str().to_string());
        Ok(())
    }
}

fn create_test_config(max_depth: u32, max_concurrent: u32) -> Config {
    let mut config = Config::default();
    config.crawler.seed_url = u("/");
    config.crawler.max_depth = max_depth;
    config.crawler.max_concurrent = max_concurrent;
    config.crawler.grace_period_secs = 0;
    config.user_agent.crawler_name = "TestBot".to_string();
    config
}

async fn run_scripted(
    config: Config,
    site: Arc<ScriptedSite>,
    store: MemoryStateStore,
    cancel: CancellationToken,
) -> CrawlReport {
    let run = crawl(config, site, Box::new(store), cancel);
    tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("Crawl did not finish in time")
        .expect("Crawl failed to start")
}

fn sorted(mut urls: Vec<String>) -> Vec<String> {
    urls.sort();
    urls
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let delay = Duration::from_millis(50);
    let site = Arc::new(
        ScriptedSite::new()
            .page("/", &["/a", "/b", "/c"])
            .slow_page("/a", &[], delay)
            .slow_page("/b", &[], delay)
            .slow_page("/c", &[], delay),
    );

    let report = run_scripted(
        create_test_config(3, 2),
        Arc::clone(&site),
        MemoryStateStore::new(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.stats.pages_appended, 4);
    // Three entries are ready at once, so the limit is reached but never passed
    assert_eq!(report.stats.peak_in_flight, 2);
    assert_eq!(site.peak(), 2);
}

#[tokio::test]
async fn test_no_url_is_dispatched_twice() {
    // Every page links to every page, in several spellings
    let links = [
        "/",
        "/a",
        "/b#top",
        "./c",
        "https://EXAMPLE.com/d",
        "/a?ref=nav",
        "https://example.com/b",
    ];
    let delay = Duration::from_millis(5);
    let site = Arc::new(
        ScriptedSite::new()
            .slow_page("/", &links, delay)
            .slow_page("/a", &links, delay)
            .slow_page("/b", &links, delay)
            .slow_page("/c", &links, delay)
            .slow_page("/d", &links, delay),
    );

    let report = run_scripted(
        create_test_config(5, 4),
        Arc::clone(&site),
        MemoryStateStore::new(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    let fetched = site.fetched();
    let unique: HashSet<_> = fetched.iter().cloned().collect();
    assert_eq!(unique.len(), fetched.len(), "duplicate fetch in {:?}", fetched);
    assert_eq!(
        sorted(fetched),
        vec![u("/"), u("/a"), u("/b"), u("/c"), u("/d")]
    );
    assert_eq!(site.appended().len(), 5);
}

#[tokio::test]
async fn test_depth_bound_holds_in_every_save() {
    let site = Arc::new(
        ScriptedSite::new()
            .page("/", &["/1"])
            .page("/1", &["/2"])
            .page("/2", &["/3"])
            .page("/3", &["/4"])
            .page("/4", &[]),
    );
    let observer = MemoryStateStore::new();

    let report = run_scripted(
        create_test_config(2, 1),
        Arc::clone(&site),
        observer.clone(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(site.fetched(), vec![u("/"), u("/1"), u("/2")]);

    for state in observer.history() {
        for entry in state.frontier() {
            assert!(entry.depth <= 2, "{} queued at depth {}", entry.url, entry.depth);
            let expected = format!("/{}", entry.depth);
            assert_eq!(entry.url.as_str(), u(&expected));
        }
    }
}

#[tokio::test]
async fn test_resume_from_earlier_save_skips_visited_pages() {
    let build = || {
        ScriptedSite::new()
            .page("/", &["/a", "/b"])
            .page("/a", &["/c"])
            .page("/b", &["/d"])
            .page("/c", &[])
            .page("/d", &[])
    };

    let first_site = Arc::new(build());
    let observer = MemoryStateStore::new();
    let first = run_scripted(
        create_test_config(3, 1),
        Arc::clone(&first_site),
        observer.clone(),
        CancellationToken::new(),
    )
    .await;
    assert_eq!(first.phase, CrawlPhase::Completed);
    assert_eq!(first_site.appended().len(), 5);
    assert_eq!(observer.clear_count(), 1);

    // Pretend the process died right after the second save
    let history = observer.history();
    assert!(history.len() >= 2);
    let snapshot = history[1].clone();
    let already_visited: HashSet<String> =
        snapshot.visited().map(|u| u.as_str().to_string()).collect();

    let second_site = Arc::new(build());
    let second = run_scripted(
        create_test_config(3, 1),
        Arc::clone(&second_site),
        MemoryStateStore::with_state(snapshot),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(second.phase, CrawlPhase::Completed);
    for url in second_site.appended() {
        assert!(!already_visited.contains(&url), "{} appended twice", url);
    }
    let resumed_visited: HashSet<String> =
        second.state.visited().map(|u| u.as_str().to_string()).collect();
    assert!(resumed_visited.is_superset(&already_visited));

    // Between the two runs every page made it into a document exactly once
    let mut all = first_site.appended()[..already_visited.len()].to_vec();
    all.extend(second_site.appended());
    assert_eq!(
        sorted(all),
        vec![u("/"), u("/a"), u("/b"), u("/c"), u("/d")]
    );
}

#[tokio::test]
async fn test_interrupt_requeues_in_flight_work() {
    let cancel = CancellationToken::new();
    let site = Arc::new(
        ScriptedSite::new()
            .page("/", &["/slow", "/other"])
            .slow_page("/slow", &[], Duration::from_secs(30))
            .page("/other", &[])
            .cancel_when_fetching("/slow", cancel.clone()),
    );
    let observer = MemoryStateStore::new();

    let report = run_scripted(
        create_test_config(3, 1),
        Arc::clone(&site),
        observer.clone(),
        cancel,
    )
    .await;

    assert_eq!(report.phase, CrawlPhase::Interrupted);
    assert_eq!(report.stats.requeued, 1);
    assert_eq!(site.appended(), vec![u("/")]);

    let frontier: Vec<_> = report.state.frontier().collect();
    assert_eq!(frontier.len(), 2);
    assert_eq!(frontier[0].url.as_str(), u("/slow"));
    assert_eq!(frontier[0].depth, 1);
    assert!(!report.state.is_visited(&frontier[0].url));

    // The requeued state is what a restart will load
    assert_eq!(observer.current(), Some(report.state.clone()));
    assert_eq!(observer.clear_count(), 0);
}

#[tokio::test]
async fn test_interrupt_lets_work_finish_within_grace_period() {
    let cancel = CancellationToken::new();
    let site = Arc::new(
        ScriptedSite::new()
            .page("/", &["/slowish"])
            .slow_page("/slowish", &["/next"], Duration::from_millis(100))
            .page("/next", &[])
            .cancel_when_fetching("/slowish", cancel.clone()),
    );
    let mut config = create_test_config(3, 1);
    config.crawler.grace_period_secs = 5;

    let report = run_scripted(config, Arc::clone(&site), MemoryStateStore::new(), cancel).await;

    assert_eq!(report.phase, CrawlPhase::Interrupted);
    assert_eq!(report.stats.requeued, 0);
    assert_eq!(site.appended(), vec![u("/"), u("/slowish")]);
    assert!(!site.fetched().contains(&u("/next")));

    // Links found during the grace period are kept for the next run
    let frontier: Vec<_> = report.state.frontier().collect();
    assert_eq!(frontier.len(), 1);
    assert_eq!(frontier[0].url.as_str(), u("/next"));
    assert_eq!(frontier[0].depth, 2);
}

#[tokio::test]
async fn test_failed_fetch_is_visited_and_not_appended() {
    let site = Arc::new(
        ScriptedSite::new()
            .page("/", &["/missing", "/a"])
            .page("/a", &["/missing"]),
    );

    let report = run_scripted(
        create_test_config(3, 2),
        Arc::clone(&site),
        MemoryStateStore::new(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.stats.fetch_failures, 1);
    assert_eq!(sorted(site.appended()), vec![u("/"), u("/a")]);
    let missing_fetches = site
        .fetched()
        .into_iter()
        .filter(|f| *f == u("/missing"))
        .count();
    assert_eq!(missing_fetches, 1);
}

#[tokio::test]
async fn test_robots_denied_page_is_not_fetched() {
    let site = Arc::new(
        ScriptedSite::new()
            .robots("User-agent: *\nDisallow: /private/")
            .page("/", &["/private/x", "/ok"])
            .page("/private/x", &[])
            .page("/ok", &[]),
    );

    let report = run_scripted(
        create_test_config(3, 2),
        Arc::clone(&site),
        MemoryStateStore::new(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.stats.robots_denied, 1);
    assert!(!site.fetched().contains(&u("/private/x")));
    assert_eq!(sorted(site.appended()), vec![u("/"), u("/ok")]);
}

#[tokio::test]
async fn test_robots_rules_for_other_agents_do_not_apply() {
    let site = Arc::new(
        ScriptedSite::new()
            .robots("User-agent: OtherBot\nDisallow: /\n\nUser-agent: *\nAllow: /")
            .page("/", &["/a"])
            .page("/a", &[]),
    );

    let report = run_scripted(
        create_test_config(3, 2),
        Arc::clone(&site),
        MemoryStateStore::new(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.stats.robots_denied, 0);
    assert_eq!(site.appended().len(), 2);
}

#[tokio::test]
async fn test_external_links_respect_scope_setting() {
    let build = || {
        Arc::new(
            ScriptedSite::new()
                .page("/", &["https://other.org/x", "/a"])
                .page("/a", &[]),
        )
    };

    let contained = build();
    let report = run_scripted(
        create_test_config(3, 2),
        Arc::clone(&contained),
        MemoryStateStore::new(),
        CancellationToken::new(),
    )
    .await;
    assert_eq!(report.stats.out_of_scope_links, 1);
    assert!(!contained
        .fetched()
        .contains(&"https://other.org/x".to_string()));

    let open = build();
    let mut config = create_test_config(3, 2);
    config.crawler.include_external = true;
    let report = run_scripted(
        config,
        Arc::clone(&open),
        MemoryStateStore::new(),
        CancellationToken::new(),
    )
    .await;
    assert_eq!(report.stats.out_of_scope_links, 0);
    assert!(open.fetched().contains(&"https://other.org/x".to_string()));
}

#[tokio::test]
async fn test_panicking_unit_counts_as_failure() {
    let site = Arc::new(
        ScriptedSite::new()
            .page("/", &["/boom", "/fine"])
            .page("/boom", &[])
            .page("/fine", &[])
            .panic_when_fetching("/boom"),
    );

    let report = run_scripted(
        create_test_config(3, 1),
        Arc::clone(&site),
        MemoryStateStore::new(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.stats.fetch_failures, 1);
    assert_eq!(sorted(site.appended()), vec![u("/"), u("/fine")]);
}

#[tokio::test]
async fn test_completion_clears_saved_state() {
    let site = Arc::new(ScriptedSite::new().page("/", &[]));
    let observer = MemoryStateStore::new();

    let report = run_scripted(
        create_test_config(3, 2),
        Arc::clone(&site),
        observer.clone(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(observer.save_count(), 1);
    assert_eq!(observer.clear_count(), 1);
    assert_eq!(observer.current(), None);
}

#[tokio::test]
async fn test_saved_state_for_other_site_is_not_resumed() {
    let old_seed = normalize_absolute(&u("/"), QueryPolicy::Strip).unwrap();
    let stale = MemoryStateStore::with_state(CrawlState::seeded(old_seed.clone()));

    let site = Arc::new(
        ScriptedSite::new()
            .page("/", &[])
            .page("https://new-site.org/", &["/about"])
            .page("https://new-site.org/about", &[]),
    );
    let mut config = create_test_config(3, 2);
    config.crawler.seed_url = "https://new-site.org/".to_string();

    let report = run_scripted(config, Arc::clone(&site), stale, CancellationToken::new()).await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(
        sorted(site.fetched()),
        vec![
            "https://new-site.org/".to_string(),
            "https://new-site.org/about".to_string()
        ]
    );
    assert!(!report.state.is_visited(&old_seed));
}

#[tokio::test]
async fn test_redirect_target_is_not_appended_twice() {
    let site = Arc::new(
        ScriptedSite::new()
            .page("/", &["/old", "/new"])
            .redirect("/old", "/new")
            .page("/new", &[]),
    );

    let report = run_scripted(
        create_test_config(3, 1),
        Arc::clone(&site),
        MemoryStateStore::new(),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(site.fetched(), vec![u("/"), u("/old")]);
    assert_eq!(site.appended().len(), 2);
    assert!(report.state.is_visited(&normalize_absolute(&u("/new"), QueryPolicy::Strip).unwrap()));
}
