use crate::url::QueryPolicy;
use serde::Deserialize;

/// Main configuration structure for pagebinder
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub content: ContentFilter,
    pub render: RenderConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// URL the crawl starts from (depth 0)
    pub seed_url: String,

    /// Maximum depth to crawl from the seed, inclusive
    pub max_depth: u32,

    /// Maximum number of pages fetched and processed at once
    pub max_concurrent: u32,

    /// Follow links to other authorities
    pub include_external: bool,

    /// Whether the query string is part of a page's identity
    pub query_policy: QueryPolicy,

    /// Seconds in-flight pages get to finish after an interrupt
    pub grace_period_secs: u64,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed_url: String::new(),
            max_depth: 3,
            max_concurrent: 10,
            include_external: false,
            query_policy: QueryPolicy::default(),
            grace_period_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler; also the token matched against robots.txt groups
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "pagebinder".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/pagebinder/pagebinder".to_string(),
            contact_email: None,
        }
    }
}

impl UserAgentConfig {
    /// Full header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        match &self.contact_email {
            Some(email) => format!(
                "{}/{} (+{}; {})",
                self.crawler_name, self.crawler_version, self.contact_url, email
            ),
            None => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, self.contact_url
            ),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path of the assembled document
    pub document_path: String,

    /// Path of the resumable crawl state file
    pub state_path: String,

    /// Typeset the document into this PDF once the crawl stops
    pub pdf_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            document_path: "web_content.md".to_string(),
            state_path: ".pagebinder-state.json".to_string(),
            pdf_path: None,
        }
    }
}

/// What gets pulled out of each page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ContentFilter {
    /// Skip images entirely
    pub text_only: bool,

    /// Lowercase file extensions accepted for images
    pub allowed_image_types: Vec<String>,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self {
            text_only: false,
            allowed_image_types: ContentFilter::KNOWN_IMAGE_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ContentFilter {
    /// Image extensions the pipeline knows how to store
    pub const KNOWN_IMAGE_TYPES: &'static [&'static str] =
        &["jpg", "jpeg", "png", "gif", "svg", "webp"];

    /// Returns true if images should be processed at all
    pub fn wants_images(&self) -> bool {
        !self.text_only && !self.allowed_image_types.is_empty()
    }

    /// Returns true if the given extension is accepted
    pub fn allows_image_type(&self, kind: &str) -> bool {
        let kind = kind.to_ascii_lowercase();
        self.wants_images() && self.allowed_image_types.iter().any(|t| *t == kind)
    }
}

/// Page rendering configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderConfig {
    /// Wait for dynamic content to settle after each page load
    pub dynamic: bool,

    /// Settle delay applied when `dynamic` is set (milliseconds)
    pub settle_delay_ms: u64,

    /// Directory holding the PDF fonts, checked at startup when set
    pub font_dir: Option<String>,

    /// Font files that must exist inside `font_dir`
    pub fonts: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dynamic: false,
            settle_delay_ms: 2000,
            font_dir: None,
            fonts: vec![
                "DejaVuSansCondensed.ttf".to_string(),
                "DejaVuSansCondensed-Bold.ttf".to_string(),
            ],
        }
    }
}
