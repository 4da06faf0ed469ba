//! Configuration module for pagebinder
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every key has a default, so a crawl can be started from the
//! command line alone.
//!
//! # Example
//!
//! ```no_run
//! use pagebinder::config::{load_config, validate};
//! use std::path::Path;
//!
//! let mut config = load_config(Path::new("pagebinder.toml")).unwrap();
//! config.crawler.seed_url = "https://example.com/".to_string();
//! validate(&config).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ContentFilter, CrawlerConfig, OutputConfig, RenderConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, parse_config};
pub use validation::validate;
