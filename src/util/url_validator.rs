use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    /// Feed URLs are fetched by the backend, so internal addresses are refused.
    #[error("Internal address not allowed for a feed: {0}")]
    InternalAddress(String),
}

fn parse_http(raw: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
    if url.host().is_none() {
        return Err(UrlValidationError::MissingHost);
    }
    Ok(url)
}

/// Validate the backend base URL.
///
/// Plain `http` is accepted (a local backend is the common setup) but logged
/// when the host is not a loopback address.
///
/// ```
/// use rss_digest::util::validate_api_base;
///
/// assert!(validate_api_base("http://localhost:8000").is_ok());
/// assert!(validate_api_base("ftp://example.com").is_err());
/// ```
pub fn validate_api_base(raw: &str) -> Result<Url, UrlValidationError> {
    let url = parse_http(raw)?;
    if url.scheme() == "http" && !is_loopback(&url) {
        tracing::warn!(api_base = %url, "Backend reached over plain HTTP");
    }
    Ok(url)
}

/// Validate a feed URL before submitting it as a subscription.
///
/// Rejects non-HTTP(S) schemes, loopback, private, link-local and
/// unspecified addresses.
pub fn validate_feed_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = parse_http(raw)?;
    if let Some(ip) = host_ip(&url) {
        if is_internal(&ip) {
            return Err(UrlValidationError::InternalAddress(ip.to_string()));
        }
    } else if url.host_str() == Some("localhost") {
        return Err(UrlValidationError::InternalAddress("localhost".to_string()));
    }
    Ok(url)
}

/// True for `localhost` and loopback IP hosts.
pub fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

fn host_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Ipv4(ip) => Some(IpAddr::V4(ip)),
        Host::Ipv6(ip) => Some(IpAddr::V6(ip)),
        Host::Domain(_) => None,
    }
}

fn is_internal(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link local
        }
    }
}
