//! Production pipeline over HTTP
//!
//! Pages are fetched with `reqwest`, parsed with `scraper`, images are stored
//! by an [`ImageStore`] and sections go to a [`MarkdownDocument`].

use crate::config::Config;
use crate::pipeline::document::{MarkdownDocument, Section};
use crate::pipeline::extract::{extract_links, extract_page};
use crate::pipeline::fetcher::{build_http_client, fetch_html, fetch_text};
use crate::pipeline::images::ImageStore;
use crate::pipeline::{PageContent, Pipeline};
use crate::url::NormalizedUrl;
use crate::{BinderError, DocumentError, FetchError, ImageError};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Pipeline that fetches real pages and writes a Markdown document
#[derive(Debug)]
pub struct HttpPipeline {
    client: Client,
    images: Option<ImageStore>,
    document: MarkdownDocument,
    /// Wait applied after each page load when dynamic rendering is on
    settle_delay: Option<Duration>,
}

impl HttpPipeline {
    /// Builds the pipeline from configuration
    ///
    /// With `resume` set the existing document is appended to; otherwise it
    /// is started over with a heading naming the seed.
    pub async fn new(config: &Config, resume: bool) -> Result<Self, BinderError> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;

        let document_path = PathBuf::from(&config.output.document_path);
        let document = if resume {
            MarkdownDocument::open_append(&document_path).await?
        } else {
            let title = format!("Content from {}", config.crawler.seed_url);
            MarkdownDocument::create(&document_path, &title).await?
        };

        let images = config.content.wants_images().then(|| {
            ImageStore::new(
                ImageStore::dir_for_document(&document_path),
                config.content.clone(),
            )
        });

        let settle_delay = config
            .render
            .dynamic
            .then(|| Duration::from_millis(config.render.settle_delay_ms));

        Ok(Self {
            client,
            images,
            document,
            settle_delay,
        })
    }

    pub fn document_path(&self) -> &Path {
        self.document.path()
    }

    pub fn sections_written(&self) -> usize {
        self.document.sections_written()
    }
}

#[async_trait]
impl Pipeline for HttpPipeline {
    async fn fetch_robots(&self, url: &Url) -> Result<String, FetchError> {
        fetch_text(&self.client, url).await
    }

    async fn fetch_and_extract(&self, url: &NormalizedUrl) -> Result<PageContent, FetchError> {
        let fetched = fetch_html(&self.client, url.as_url()).await?;

        if let Some(delay) = self.settle_delay {
            tokio::time::sleep(delay).await;
        }

        let extracted = extract_page(&fetched.body, &fetched.final_url);
        Ok(PageContent {
            url: url.clone(),
            final_url: fetched.final_url,
            title: extracted.title,
            text: extracted.text,
            image_ref: extracted.image_ref,
            html: fetched.body,
        })
    }

    fn discover_links(&self, page: &PageContent) -> Vec<String> {
        extract_links(&page.html)
    }

    async fn process_image(&self, image_ref: &Url) -> Result<PathBuf, ImageError> {
        match &self.images {
            Some(store) => store.store(&self.client, image_ref).await,
            None => Err(ImageError::TypeNotAllowed {
                url: image_ref.to_string(),
                kind: "any".to_string(),
            }),
        }
    }

    async fn append_to_document(
        &self,
        url: &NormalizedUrl,
        title: Option<&str>,
        text: &str,
        image: Option<&Path>,
    ) -> Result<(), DocumentError> {
        self.document
            .append(&Section {
                url: url.as_url(),
                title,
                text,
                image,
            })
            .await
    }
}
