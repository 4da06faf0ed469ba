//! Unit of work: one URL through robots check, pipeline and link discovery
//!
//! A unit of work never touches the crawl state. Everything it learns is
//! returned to the coordinator as a [`WorkOutcome`].

use crate::config::Config;
use crate::crawler::limiter::Permit;
use crate::pipeline::Pipeline;
use crate::robots::RobotsGate;
use crate::state::FrontierEntry;
use crate::FetchError;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Everything a unit of work needs, shared by all of them
pub struct CrawlContext {
    pub config: Config,
    pub robots: RobotsGate,
    pub pipeline: Arc<dyn Pipeline>,
}

impl CrawlContext {
    /// Builds a context whose robots gate matches rules for the configured crawler name
    pub fn new(config: Config, pipeline: Arc<dyn Pipeline>) -> Self {
        let robots = RobotsGate::new(config.user_agent.crawler_name.clone());
        Self {
            config,
            robots,
            pipeline,
        }
    }

    /// The User-Agent header value sent with every request
    pub fn user_agent(&self) -> String {
        self.config.user_agent.header_value()
    }
}

impl std::fmt::Debug for CrawlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlContext")
            .field("config", &self.config)
            .field("robots", &self.robots)
            .finish_non_exhaustive()
    }
}

/// What happened to one dispatched URL
#[derive(Debug)]
pub struct WorkOutcome {
    pub entry: FrontierEntry,
    pub kind: OutcomeKind,
}

#[derive(Debug)]
pub enum OutcomeKind {
    /// robots.txt disallows the URL; nothing was fetched
    Denied,

    /// The page could not be fetched; the URL stays visited
    FetchFailed(FetchError),

    /// The page was fetched and handed to the document
    Processed(ProcessedPage),
}

#[derive(Debug)]
pub struct ProcessedPage {
    /// URL the page was served from, for resolving relative links
    pub base: Url,

    /// Raw hrefs found on the page
    pub hrefs: Vec<String>,

    pub image: ImageOutcome,

    /// Whether the section made it into the document
    pub appended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    /// The page had no image, or images are switched off
    NotRequested,
    Stored,
    Failed,
}

/// Runs one unit of work under `permit`
///
/// The permit is released before the outcome is handed back.
pub async fn run_unit(ctx: Arc<CrawlContext>, entry: FrontierEntry, permit: Permit) -> WorkOutcome {
    let kind = process(&ctx, &entry).await;
    drop(permit);
    WorkOutcome { entry, kind }
}

async fn process(ctx: &CrawlContext, entry: &FrontierEntry) -> OutcomeKind {
    let url = &entry.url;
    let pipeline = ctx.pipeline.as_ref();

    ctx.robots.load(url.as_url(), pipeline).await;
    if !ctx.robots.can_fetch(url) {
        tracing::info!("URL {} disallowed by robots.txt", url);
        return OutcomeKind::Denied;
    }

    tracing::debug!("Fetching {} (depth {})", url, entry.depth);
    let page = match pipeline.fetch_and_extract(url).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!("Skipping {}: {}", url, e);
            return OutcomeKind::FetchFailed(e);
        }
    };

    let mut image = ImageOutcome::NotRequested;
    let mut image_path: Option<PathBuf> = None;
    if let Some(image_ref) = page
        .image_ref
        .as_ref()
        .filter(|_| ctx.config.content.wants_images())
    {
        match pipeline.process_image(image_ref).await {
            Ok(path) => {
                image = ImageOutcome::Stored;
                image_path = Some(path);
            }
            Err(e) => {
                tracing::warn!("Dropping image for {}: {}", url, e);
                image = ImageOutcome::Failed;
            }
        }
    }

    let appended = match pipeline
        .append_to_document(url, page.title.as_deref(), &page.text, image_path.as_deref())
        .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Failed to append {} to the document: {}", url, e);
            false
        }
    };

    let hrefs = pipeline.discover_links(&page);
    tracing::debug!("Found {} links on {}", hrefs.len(), url);

    OutcomeKind::Processed(ProcessedPage {
        base: page.final_url,
        hrefs,
        image,
        appended,
    })
}
