//! HTML extraction for page content and links
//!
//! This module handles parsing HTML content to extract:
//! - The page title
//! - The visible text of the page body
//! - The first image reference
//! - Raw link targets to follow (from <a> tags and canonical links)

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose text never counts as page content
const NON_CONTENT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Content pulled out of one HTML page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Visible text, one space between text nodes
    pub text: String,

    /// The first `<img src>` on the page, resolved to an absolute URL
    pub image_ref: Option<Url>,
}

/// Parses HTML content and extracts title, text and first image
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the page was served from, for resolving the image
///
/// # Example
///
/// ```
/// use pagebinder::pipeline::extract_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><p>Hello</p></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let page = extract_page(html, &base_url);
/// assert_eq!(page.title, Some("Test".to_string()));
/// assert_eq!(page.text, "Hello");
/// ```
pub fn extract_page(html: &str, base_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);

    ExtractedPage {
        title: extract_title(&document),
        text: extract_text(&document),
        image_ref: extract_first_image(&document, base_url),
    }
}

/// Extracts raw link targets from an HTML page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - Empty hrefs
///
/// Hrefs are returned as written (trimmed); resolving and filtering them is
/// left to URL normalization.
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            push_href(&mut links, element);
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            push_href(&mut links, element);
        }
    }

    links
}

fn push_href(links: &mut Vec<String>, element: ElementRef<'_>) {
    if let Some(href) = element.value().attr("href") {
        let href = href.trim();
        if !href.is_empty() {
            links.push(href.to_string());
        }
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Collects visible text from the body (or the whole document without one)
fn extract_text(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut parts: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| NON_CONTENT_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }

        parts.extend(text.split_whitespace());
    }

    parts.join(" ")
}

fn extract_first_image(document: &Html, base_url: &Url) -> Option<Url> {
    let img_selector = Selector::parse("img[src]").ok()?;
    let src = document
        .select(&img_selector)
        .filter_map(|element| element.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())?;

    if src.starts_with("data:") {
        return None;
    }

    base_url
        .join(src)
        .ok()
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
}
