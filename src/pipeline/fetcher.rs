//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made by the pipeline:
//! - Building the HTTP client with the configured user agent string
//! - GET requests for pages, robots.txt files and images
//! - Content-Type checks for pages
//! - Error classification into [`FetchError`]

use crate::config::UserAgentConfig;
use crate::FetchError;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client, Response};
use std::time::Duration;
use url::Url;

/// Maximum number of redirects followed for one request
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// Page body content
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total per-request timeout
///
/// # Example
///
/// ```no_run
/// use pagebinder::config::UserAgentConfig;
/// use pagebinder::pipeline::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig::default();
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches an HTML page
///
/// Redirects are followed and the final URL is recorded. Non-success
/// statuses and non-HTML content types are errors.
pub async fn fetch_html(client: &Client, url: &Url) -> Result<FetchedPage, FetchError> {
    let response = send(client, url).await?;
    let final_url = response.url().clone();

    let content_type = content_type_of(&response).unwrap_or_default();
    if !is_html(&content_type) {
        return Err(FetchError::ContentType {
            url: url.to_string(),
            content_type,
        });
    }

    let body = response.text().await.map_err(|e| FetchError::Body {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    Ok(FetchedPage { final_url, body })
}

/// Fetches a plain text resource such as robots.txt
pub async fn fetch_text(client: &Client, url: &Url) -> Result<String, FetchError> {
    let response = send(client, url).await?;
    response.text().await.map_err(|e| FetchError::Body {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Fetches a binary resource, returning its Content-Type and bytes
pub async fn fetch_bytes(
    client: &Client,
    url: &Url,
) -> Result<(Option<String>, Vec<u8>), FetchError> {
    let response = send(client, url).await?;
    let content_type = content_type_of(&response);
    let bytes = response.bytes().await.map_err(|e| FetchError::Body {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    Ok((content_type, bytes.to_vec()))
}

/// Sends a GET request and rejects non-success statuses
async fn send(client: &Client, url: &Url) -> Result<Response, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| classify_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}

fn classify_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

fn content_type_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Returns true for `text/html` and `application/xhtml+xml`, parameters ignored
pub fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}
