use crate::config::types::{
    Config, ContentFilter, CrawlerConfig, OutputConfig, RenderConfig, UserAgentConfig,
};
use crate::ConfigError;
use std::path::Path;
use url::Url;

/// Validates the entire configuration
///
/// Every failure here is fatal: the crawl never starts with a configuration
/// that did not pass.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_content_filter(&config.content)?;
    validate_render_config(&config.render)?;
    validate_pdf_output(&config.output, &config.render)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.seed_url.trim().is_empty() {
        return Err(ConfigError::Validation("seed URL is required".to_string()));
    }

    let seed = Url::parse(config.seed_url.trim())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", config.seed_url, e)))?;

    if seed.scheme() != "http" && seed.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use http or https",
            config.seed_url
        )));
    }

    if seed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            config.seed_url
        )));
    }

    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    if let Some(email) = &config.contact_email {
        validate_email(email)?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.document_path.is_empty() {
        return Err(ConfigError::Validation(
            "document_path cannot be empty".to_string(),
        ));
    }

    if config.state_path.is_empty() {
        return Err(ConfigError::Validation(
            "state_path cannot be empty".to_string(),
        ));
    }

    if config.document_path == config.state_path {
        return Err(ConfigError::Validation(format!(
            "document_path and state_path must differ, both are '{}'",
            config.document_path
        )));
    }

    Ok(())
}

/// Validates the content filter
fn validate_content_filter(filter: &ContentFilter) -> Result<(), ConfigError> {
    for kind in &filter.allowed_image_types {
        let lowered = kind.to_ascii_lowercase();
        if !ContentFilter::KNOWN_IMAGE_TYPES.contains(&lowered.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown image type '{}', expected one of: {}",
                kind,
                ContentFilter::KNOWN_IMAGE_TYPES.join(", ")
            )));
        }
        if lowered != *kind {
            return Err(ConfigError::Validation(format!(
                "Image type '{}' must be lowercase",
                kind
            )));
        }
    }

    Ok(())
}

/// Validates rendering configuration and the presence of its assets
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.settle_delay_ms > 30_000 {
        return Err(ConfigError::Validation(format!(
            "settle_delay_ms must be <= 30000, got {}",
            config.settle_delay_ms
        )));
    }

    if let Some(dir) = &config.font_dir {
        let dir = Path::new(dir);
        if !dir.is_dir() {
            return Err(ConfigError::MissingAsset(format!(
                "font directory '{}' does not exist",
                dir.display()
            )));
        }

        for font in &config.fonts {
            let path = dir.join(font);
            if !path.is_file() {
                return Err(ConfigError::MissingAsset(format!(
                    "font '{}' not found",
                    path.display()
                )));
            }
        }
    }

    Ok(())
}

/// A PDF can only be typeset with fonts to typeset it in
fn validate_pdf_output(output: &OutputConfig, render: &RenderConfig) -> Result<(), ConfigError> {
    let Some(pdf_path) = &output.pdf_path else {
        return Ok(());
    };

    if pdf_path.is_empty() {
        return Err(ConfigError::Validation("pdf_path cannot be empty".to_string()));
    }

    if *pdf_path == output.document_path || *pdf_path == output.state_path {
        return Err(ConfigError::Validation(format!(
            "pdf_path '{}' must differ from document_path and state_path",
            pdf_path
        )));
    }

    if render.font_dir.is_none() {
        return Err(ConfigError::MissingAsset(
            "PDF output needs a font directory (render.font-dir)".to_string(),
        ));
    }

    if render.fonts.is_empty() {
        return Err(ConfigError::MissingAsset(
            "PDF output needs at least one font file (render.fonts)".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
