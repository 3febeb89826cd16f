use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::http::{HttpRequest, HttpResponse};
use crate::api::{ChatRequest, RelayChatRequest, RelayReply};
use crate::core::config::defaults::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::core::gateway::{ChatTransport, CompletionError, CompletionOptions, TransportFailureKind};

pub const DEFAULT_RELAY_MODEL: &str = "deepseek/deepseek-chat";
const CHAT_ROUTES: [&str; 2] = ["/chat", "/api/chat"];
/// How long a client may take to send a complete request.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared, read-only relay state. `transport` is `None` when the server
/// holds no provider key.
pub struct RelayState {
    transport: Option<Arc<dyn ChatTransport>>,
    read_timeout: Duration,
}

impl RelayState {
    pub fn new(transport: Option<Arc<dyn ChatTransport>>) -> Self {
        Self {
            transport,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }
}

pub async fn handle(state: &RelayState, request: &HttpRequest) -> HttpResponse {
    let path = request.path.as_str();
    if path == "/health" {
        return match request.method.as_str() {
            "GET" | "HEAD" => HttpResponse::json(200, &json!({"status": "ok"})),
            _ => method_not_allowed("GET"),
        };
    }
    if CHAT_ROUTES.contains(&path) {
        return match request.method.as_str() {
            "POST" => chat(state, request).await,
            _ => method_not_allowed("POST"),
        };
    }
    HttpResponse::json(404, &RelayReply::error(format!("No route for {path}")))
}

fn method_not_allowed(allow: &'static str) -> HttpResponse {
    HttpResponse::json(405, &RelayReply::error("Method not allowed")).with_header("Allow", allow)
}

fn bad_request(detail: impl Into<String>) -> HttpResponse {
    HttpResponse::json(400, &RelayReply::error(detail))
}

async fn chat(state: &RelayState, request: &HttpRequest) -> HttpResponse {
    let Some(transport) = state.transport.as_ref() else {
        return error_response(&CompletionError::Unconfigured);
    };

    let body: RelayChatRequest = match serde_json::from_slice(&request.body) {
        Ok(body) => body,
        Err(err) => return bad_request(format!("Invalid JSON body: {err}")),
    };
    if body.messages.is_empty() {
        return bad_request("messages must not be empty");
    }
    let options = match CompletionOptions::new(
        body.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        body.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    ) {
        Ok(options) => options,
        Err(err) => return bad_request(err.to_string()),
    };
    let model = body
        .model
        .filter(|model| !model.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_RELAY_MODEL.to_string());

    info!(model = %model, turns = body.messages.len(), "relaying chat request");
    let upstream = ChatRequest::new(
        model,
        body.messages,
        options.temperature(),
        options.max_tokens(),
    )
    .with_neutral_sampling();

    match transport.send(&upstream, None).await {
        Ok(content) => HttpResponse::json(200, &RelayReply::content(content)),
        Err(err) => {
            warn!(error = %err, "upstream completion failed");
            error_response(&err)
        }
    }
}

/// Status and error body for a failed completion.
pub fn error_response(err: &CompletionError) -> HttpResponse {
    let (status, message) = match err {
        CompletionError::Unconfigured => (500, "API key not configured".to_string()),
        CompletionError::TransportFailure { kind, detail } => match kind {
            TransportFailureKind::Timeout => (504, "Request timeout".to_string()),
            TransportFailureKind::Connect => (503, "Connection error".to_string()),
            TransportFailureKind::Malformed => (500, "Invalid API response".to_string()),
            TransportFailureKind::Other => (500, format!("Request failed: {detail}")),
        },
        CompletionError::ProviderError { status, .. } => {
            let status = if (400..=599).contains(status) { *status } else { 502 };
            (status, err.to_string())
        }
    };
    HttpResponse::json(status, &RelayReply::error(message))
}
