//! Pipeline module: the seam between the crawl engine and page processing
//!
//! The coordinator only ever talks to a [`Pipeline`]. Fetching, extraction,
//! image handling and document assembly all live behind it, so the engine can
//! be driven by [`HttpPipeline`] in production and by scripted pipelines in
//! tests.

mod document;
mod extract;
mod fetcher;
mod http;
mod images;
mod pdf;

pub use document::{format_section, MarkdownDocument, Section};
pub use extract::{extract_links, extract_page, ExtractedPage};
pub use fetcher::{build_http_client, fetch_bytes, fetch_html, fetch_text, is_html, FetchedPage};
pub use http::HttpPipeline;
pub use images::{kind_from_content_type, kind_from_path, ImageStore};
pub use pdf::{load_font_family, parse_journal, render_pdf, Journal, JournalSection, PdfSummary};

use crate::url::NormalizedUrl;
use crate::{DocumentError, FetchError, ImageError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use url::Url;

/// Content of one fetched page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// The URL that was dispatched
    pub url: NormalizedUrl,
    /// Where the page was actually served from, after redirects
    pub final_url: Url,
    pub title: Option<String>,
    pub text: String,
    /// First image on the page, if any
    pub image_ref: Option<Url>,
    /// Raw HTML, kept for link discovery
    pub html: String,
}

/// External collaborators used by a unit of work
///
/// Each method is one suspend point that can fail on its own. None of them
/// touch the crawl state.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Fetches the body of a robots.txt file
    async fn fetch_robots(&self, url: &Url) -> Result<String, FetchError>;

    /// Fetches a page and extracts its text and first image reference
    async fn fetch_and_extract(&self, url: &NormalizedUrl) -> Result<PageContent, FetchError>;

    /// Raw link targets on a page, unresolved
    fn discover_links(&self, page: &PageContent) -> Vec<String>;

    /// Downloads and stores an image, returning where it was written
    async fn process_image(&self, image_ref: &Url) -> Result<PathBuf, ImageError>;

    /// Appends one page's section to the output document
    async fn append_to_document(
        &self,
        url: &NormalizedUrl,
        title: Option<&str>,
        text: &str,
        image: Option<&Path>,
    ) -> Result<(), DocumentError>;
}
