//! pagebinder: crawl a website and bind its pages into one document
//!
//! This crate implements a depth-bounded, concurrency-limited crawler that
//! respects robots.txt, persists its frontier so an interrupted crawl can be
//! resumed, and feeds every visited page through a pipeline that extracts
//! text and images and appends them to an output document.

pub mod config;
pub mod crawler;
pub mod pipeline;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for pagebinder operations
#[derive(Debug, Error)]
pub enum BinderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Robots.txt error: {0}")]
    Robots(#[from] RobotsError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing required asset: {0}")]
    MissingAsset(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),

    #[error("Not a navigable reference: {0}")]
    NotNavigable(String),
}

/// Errors while obtaining a robots.txt policy
#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("Failed to fetch {url}: {source}")]
    Fetch { url: String, source: FetchError },

    #[error("Cannot derive robots.txt location from {0}")]
    Location(String),
}

/// Errors while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Unsupported content type {content_type} for {url}")]
    ContentType { url: String, content_type: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

/// Errors while downloading or storing an image
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Invalid image reference {0}")]
    InvalidReference(String),

    #[error("Image download failed for {url}: {message}")]
    Download { url: String, message: String },

    #[error("Image type {kind} not allowed for {url}")]
    TypeNotAllowed { url: String, kind: String },

    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while appending to the output document
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to write document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render PDF: {0}")]
    Render(String),
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport};
pub use state::{CrawlPhase, CrawlState, FrontierEntry};
pub use crate::url::{is_in_scope, normalize, NormalizedUrl};
