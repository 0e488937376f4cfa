//! URL validation for user input
//!
//! Only absolute http(s) URLs with a host are handed to the extraction engine.
//! Which platforms are actually supported is the engine's business, not ours.

use thiserror::Error;
use url::Url;

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Not parseable as a URL at all
    #[error("Invalid URL: {0}")]
    Malformed(String),

    #[error("Unsupported URL scheme '{scheme}' in {url}")]
    Scheme { url: String, scheme: String },

    #[error("URL has no host: {0}")]
    NoHost(String),
}

/// Validates that `url` is an http(s) URL with a host.
///
/// # Examples
/// ```
/// use fitcore::core::validation::validate_url;
///
/// assert!(validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
/// assert!(validate_url("ftp://example.com/video").is_err());
/// assert!(validate_url("not a url").is_err());
/// ```
pub fn validate_url(url: &str) -> Result<Url, ValidationError> {
    let parsed = Url::parse(url.trim()).map_err(|_| ValidationError::Malformed(url.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ValidationError::Scheme {
            url: url.to_string(),
            scheme: parsed.scheme().to_string(),
        });
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(ValidationError::NoHost(url.to_string())),
    }
}

/// Convenience wrapper for message filters
pub fn is_valid_url(url: &str) -> bool {
    validate_url(url).is_ok()
}
