use url::Url;

/// Extracts the authority (scheme, host and port) of a URL
///
/// The host is lowercased and the port is only present when it differs from
/// the scheme's default. Returns `None` for URLs without a host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pagebinder::url::authority_of;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(authority_of(&url), Some("https://example.com".to_string()));
///
/// let url = Url::parse("http://localhost:8080/").unwrap();
/// assert_eq!(authority_of(&url), Some("http://localhost:8080".to_string()));
/// ```
pub fn authority_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}://{}:{}", url.scheme(), host, port)),
        None => Some(format!("{}://{}", url.scheme(), host)),
    }
}
