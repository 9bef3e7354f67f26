//! Base URL handling for the inference server
//!
//! Endpoints are joined onto a user-configured base URL, which may or may
//! not carry a trailing slash.

/// Strip surrounding whitespace and trailing slashes from a base URL.
///
/// # Examples
///
/// ```
/// use causette::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
/// assert_eq!(normalize_base_url(" http://localhost:11434// "), "http://localhost:11434");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join an endpoint path onto a base URL without doubling slashes.
///
/// # Examples
///
/// ```
/// use causette::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434/", "/api/generate"),
///     "http://localhost:11434/api/generate"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}

/// Validate a user-supplied base URL, returning its normalized form.
pub fn parse_base_url(value: &str) -> Result<String, String> {
    let normalized = normalize_base_url(value);
    let host = normalized
        .strip_prefix("http://")
        .or_else(|| normalized.strip_prefix("https://"));
    match host {
        Some(host) if !host.is_empty() => Ok(normalized),
        Some(_) => Err(format!("base-url is missing a host ({})", value.trim())),
        None => Err(format!(
            "base-url must start with http:// or https:// ({})",
            value.trim()
        )),
    }
}
