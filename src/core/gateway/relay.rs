use async_trait::async_trait;
use tokio::sync::mpsc;

use super::sse::summarize_error_body;
use super::{classify_reqwest_error, ChatTransport, CompletionError, StreamMessage};
use crate::api::{ChatRequest, RelayChatRequest, RelayReply};

/// Generic HTTP POST to a relay that holds the provider key. The caller
/// never sends credentials of its own.
pub struct RelayTransport {
    client: reqwest::Client,
    url: String,
}

impl RelayTransport {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ChatTransport for RelayTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        sink: Option<&mpsc::UnboundedSender<StreamMessage>>,
    ) -> Result<String, CompletionError> {
        let body = RelayChatRequest {
            model: Some(request.model.clone()),
            messages: request.messages.clone(),
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_reqwest_error)?;

        let reply = match serde_json::from_str::<RelayReply>(&text) {
            Ok(reply) => reply,
            Err(err) if status.is_success() => {
                return Err(CompletionError::malformed(err.to_string()))
            }
            Err(_) => {
                return Err(CompletionError::ProviderError {
                    status: status.as_u16(),
                    detail: summarize_error_body(&text),
                })
            }
        };

        match reply {
            RelayReply {
                success: true,
                content: Some(content),
                ..
            } => {
                if let Some(sink) = sink {
                    let _ = sink.send(StreamMessage::Chunk(content.clone()));
                }
                Ok(content)
            }
            RelayReply {
                success: true,
                content: None,
                ..
            } => Err(CompletionError::malformed("relay reply has no content")),
            RelayReply { error, .. } => Err(CompletionError::ProviderError {
                status: status.as_u16(),
                detail: error.unwrap_or_else(|| "relay reported a failure".to_string()),
            }),
        }
    }
}
