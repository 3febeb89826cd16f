//! Completion gateway
//!
//! One call shape, `complete(history, model, options)`, over three backends:
//! a direct OpenAI-compatible client, a relay reached over plain HTTP, or no
//! network at all. Transports report failures as [`CompletionError`]; the
//! gateway decides, in one visible place, to answer from the offline
//! responder instead.

pub mod openai;
pub mod relay;
pub mod sse;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatRequest, ContentPart, ImageUrl, WireContent, WireMessage};
use crate::core::config::{BackendKind, Config, ConfigError};
use crate::core::fallback::FallbackResponder;
use crate::core::message::Message;
use crate::core::models::ModelRef;
use crate::utils::auth::Attribution;

pub use openai::OpenAiTransport;
pub use relay::RelayTransport;

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (1, 4000);

/// Incremental delivery of a reply. Chunks arrive in concatenation order and
/// `End` is always the last message of a turn.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    /// The live backend failed; the text that follows comes from the offline
    /// responder.
    Error(String),
    End,
}

/// Input rejected before any side effect.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptySubmission,
    TemperatureOutOfRange(f32),
    MaxTokensOutOfRange(u32),
    UnknownModel(String),
    UnsupportedAttachment(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptySubmission => write!(f, "Message is empty"),
            ValidationError::TemperatureOutOfRange(value) => write!(
                f,
                "Temperature {value} is outside {}..={}",
                TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1
            ),
            ValidationError::MaxTokensOutOfRange(value) => write!(
                f,
                "Max tokens {value} is outside {}..={}",
                MAX_TOKENS_RANGE.0, MAX_TOKENS_RANGE.1
            ),
            ValidationError::UnknownModel(name) => write!(f, "Unknown model: {name}"),
            ValidationError::UnsupportedAttachment(detail) => {
                write!(f, "Unsupported attachment: {detail}")
            }
        }
    }
}

impl StdError for ValidationError {}

/// Sampling options, valid by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    temperature: f32,
    max_tokens: u32,
}

impl CompletionOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Result<Self, ValidationError> {
        if !(TEMPERATURE_RANGE.0..=TEMPERATURE_RANGE.1).contains(&temperature) {
            return Err(ValidationError::TemperatureOutOfRange(temperature));
        }
        if !(MAX_TOKENS_RANGE.0..=MAX_TOKENS_RANGE.1).contains(&max_tokens) {
            return Err(ValidationError::MaxTokensOutOfRange(max_tokens));
        }
        Ok(Self {
            temperature,
            max_tokens,
        })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn with_temperature(self, temperature: f32) -> Result<Self, ValidationError> {
        Self::new(temperature, self.max_tokens)
    }

    pub fn with_max_tokens(self, max_tokens: u32) -> Result<Self, ValidationError> {
        Self::new(self.temperature, max_tokens)
    }
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: crate::core::config::defaults::DEFAULT_TEMPERATURE,
            max_tokens: crate::core::config::defaults::DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    Timeout,
    Connect,
    /// The upstream answered 2xx but the body was not a usable completion.
    Malformed,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionError {
    /// No credential or no live backend configured.
    Unconfigured,
    TransportFailure {
        kind: TransportFailureKind,
        detail: String,
    },
    /// The provider answered with a well-formed error.
    ProviderError { status: u16, detail: String },
}

impl CompletionError {
    pub fn transport(kind: TransportFailureKind, detail: impl Into<String>) -> Self {
        CompletionError::TransportFailure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::transport(TransportFailureKind::Malformed, detail)
    }
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::Unconfigured => write!(f, "No completion backend is configured"),
            CompletionError::TransportFailure { kind, detail } => {
                let label = match kind {
                    TransportFailureKind::Timeout => "Request timeout",
                    TransportFailureKind::Connect => "Connection error",
                    TransportFailureKind::Malformed => "Invalid API response",
                    TransportFailureKind::Other => "Request failed",
                };
                if detail.is_empty() {
                    write!(f, "{label}")
                } else {
                    write!(f, "{label}: {detail}")
                }
            }
            CompletionError::ProviderError { status, detail } => {
                write!(f, "API Error ({status}): {detail}")
            }
        }
    }
}

impl StdError for CompletionError {}

/// Map a reqwest failure onto the transport taxonomy.
pub fn classify_reqwest_error(err: reqwest::Error) -> CompletionError {
    let kind = if err.is_timeout() {
        TransportFailureKind::Timeout
    } else if err.is_connect() {
        TransportFailureKind::Connect
    } else if err.is_decode() || err.is_body() {
        TransportFailureKind::Malformed
    } else {
        TransportFailureKind::Other
    };
    CompletionError::transport(kind, err.to_string())
}

/// A backend able to turn one wire request into reply text. When `sink` is
/// given the transport may forward `Chunk`s as they arrive; it never sends
/// `End`.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(
        &self,
        request: &ChatRequest,
        sink: Option<&mpsc::UnboundedSender<StreamMessage>>,
    ) -> Result<String, CompletionError>;
}

/// HTTP client shared by the transports, bounded by the configured timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
}

/// Pick the transport for `config`. `None` means every turn is answered
/// offline (simulated backend, or native without a credential).
pub fn build_transport(
    config: &Config,
    credential: Option<String>,
) -> Result<Option<Arc<dyn ChatTransport>>, ConfigError> {
    let client = || {
        http_client(config.timeout()).map_err(|err| ConfigError::Invalid {
            key: "timeout_secs",
            reason: err.to_string(),
        })
    };

    match config.backend() {
        BackendKind::Simulated => Ok(None),
        BackendKind::Native => match credential {
            Some(api_key) => {
                let attribution = Attribution {
                    app_title: config.app_title().to_string(),
                    referer: config.referer().map(str::to_string),
                };
                let transport =
                    OpenAiTransport::new(client()?, config.base_url(), api_key, attribution);
                Ok(Some(Arc::new(transport)))
            }
            None => {
                debug!("no provider credential; replies will come from the offline responder");
                Ok(None)
            }
        },
        BackendKind::Http => {
            let url = config
                .relay_url
                .as_deref()
                .ok_or_else(|| ConfigError::Invalid {
                    key: "relay_url",
                    reason: "required by the http backend".to_string(),
                })?;
            Ok(Some(Arc::new(RelayTransport::new(client()?, url))))
        }
    }
}

/// Translate history into wire turns. Only the most recent user turn carries
/// its image, and only for a vision-capable model.
pub fn build_wire_messages(history: &[Message], model: &ModelRef) -> Vec<WireMessage> {
    let latest_user = history.iter().rposition(Message::is_user);

    history
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let attachment = message
                .attachment
                .as_ref()
                .filter(|_| model.supports_image_input && Some(index) == latest_user);
            let content = match attachment {
                Some(attachment) => WireContent::Parts(vec![
                    ContentPart::Text {
                        text: message.content.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: attachment.data_url(),
                        },
                    },
                ]),
                None => WireContent::Text(message.content.clone()),
            };
            WireMessage {
                role: message.role.as_str().to_string(),
                content,
            }
        })
        .collect()
}

/// Result of one gateway call. `fallback` records why the live backend was
/// bypassed, if it was.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub fallback: Option<CompletionError>,
}

impl Completion {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

pub struct CompletionGateway {
    transport: Option<Arc<dyn ChatTransport>>,
    fallback: FallbackResponder,
    timeout: Duration,
}

impl CompletionGateway {
    pub fn new(
        transport: Option<Arc<dyn ChatTransport>>,
        fallback: FallbackResponder,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            fallback,
            timeout,
        }
    }

    pub fn is_live(&self) -> bool {
        self.transport.is_some()
    }

    /// Try the live backend once, bounded by the gateway timeout.
    pub async fn attempt(
        &self,
        history: &[Message],
        model: &ModelRef,
        options: CompletionOptions,
        sink: Option<&mpsc::UnboundedSender<StreamMessage>>,
    ) -> Result<String, CompletionError> {
        let transport = self.transport.as_ref().ok_or(CompletionError::Unconfigured)?;
        let request = ChatRequest::new(
            model.provider_id.clone(),
            build_wire_messages(history, model),
            options.temperature(),
            options.max_tokens(),
        );
        debug!(model = %model.provider_id, turns = request.messages.len(), "sending completion request");

        let text = tokio::time::timeout(self.timeout, transport.send(&request, sink))
            .await
            .map_err(|_| {
                CompletionError::transport(
                    TransportFailureKind::Timeout,
                    format!("no reply within {}s", self.timeout.as_secs()),
                )
            })??;

        if text.trim().is_empty() {
            return Err(CompletionError::malformed("empty completion"));
        }
        Ok(text)
    }

    /// Always produces non-empty text: the live reply when there is one,
    /// otherwise the offline responder's.
    pub async fn complete(
        &self,
        history: &[Message],
        model: &ModelRef,
        options: CompletionOptions,
        sink: Option<&mpsc::UnboundedSender<StreamMessage>>,
    ) -> Completion {
        let completion = match self.attempt(history, model, options, sink).await {
            Ok(text) => Completion {
                text,
                fallback: None,
            },
            Err(err) => {
                match &err {
                    CompletionError::Unconfigured => {
                        debug!(model = %model.display_name, "answering offline")
                    }
                    CompletionError::ProviderError { status, detail } => {
                        warn!(model = %model.display_name, status, detail = %detail, "provider returned an error; answering offline")
                    }
                    CompletionError::TransportFailure { kind, detail } => {
                        warn!(model = %model.display_name, kind = ?kind, detail = %detail, "completion transport failed; answering offline")
                    }
                }
                let latest = history
                    .iter()
                    .rev()
                    .find(|message| message.is_user())
                    .map(|message| message.content.as_str())
                    .unwrap_or_default();
                let text = self.fallback.respond(model, latest);
                if let Some(tx) = sink {
                    if !matches!(err, CompletionError::Unconfigured) {
                        let _ = tx.send(StreamMessage::Error(err.to_string()));
                    }
                    let _ = tx.send(StreamMessage::Chunk(text.clone()));
                }
                Completion {
                    text,
                    fallback: Some(err),
                }
            }
        };

        if let Some(tx) = sink {
            let _ = tx.send(StreamMessage::End);
        }
        completion
    }
}
