//! Header helpers for upstream completion requests.

/// Attribution headers OpenRouter-style providers use to identify the caller.
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    pub app_title: String,
    pub referer: Option<String>,
}

/// Add bearer authentication plus the `X-Title` / `HTTP-Referer` attribution.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    api_key: &str,
    attribution: &Attribution,
) -> reqwest::RequestBuilder {
    let mut request = request.header("Authorization", format!("Bearer {api_key}"));
    if !attribution.app_title.trim().is_empty() {
        request = request.header("X-Title", attribution.app_title.as_str());
    }
    if let Some(referer) = attribution.referer.as_deref() {
        request = request.header("HTTP-Referer", referer);
    }
    request
}
