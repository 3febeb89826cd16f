//! Endpoint URL helpers.

/// Join a base URL and an endpoint path with exactly one slash between them.
///
/// ```
/// use nexus::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://openrouter.ai/api/v1/", "/chat/completions"),
///     "https://openrouter.ai/api/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}

/// Host part of a provider URL, used to key stored credentials.
/// Falls back to the trimmed input when it does not parse as a URL.
pub fn provider_host(base_url: &str) -> String {
    reqwest::Url::parse(base_url.trim())
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| base_url.trim().trim_end_matches('/').to_string())
}
