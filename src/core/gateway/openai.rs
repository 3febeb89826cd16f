use async_trait::async_trait;
use tokio::sync::mpsc;

use super::sse::{collect_stream, summarize_error_body};
use super::{classify_reqwest_error, ChatTransport, CompletionError, StreamMessage};
use crate::api::{ChatCompletion, ChatRequest};
use crate::utils::auth::{add_auth_headers, Attribution};
use crate::utils::url::construct_api_url;

/// Direct client for an OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    attribution: Attribution,
}

impl OpenAiTransport {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        attribution: Attribution,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            attribution,
        }
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        sink: Option<&mpsc::UnboundedSender<StreamMessage>>,
    ) -> Result<String, CompletionError> {
        let mut body = request.clone();
        body.stream = sink.is_some();

        let url = construct_api_url(&self.base_url, "chat/completions");
        let http_request = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        let http_request = add_auth_headers(http_request, &self.api_key, &self.attribution);

        let response = http_request
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(CompletionError::ProviderError {
                status: status.as_u16(),
                detail: summarize_error_body(&error_text),
            });
        }

        if let Some(sink) = sink {
            return collect_stream(response, status.as_u16(), sink).await;
        }

        let text = response.text().await.map_err(classify_reqwest_error)?;
        let completion: ChatCompletion = serde_json::from_str(&text)
            .map_err(|err| CompletionError::malformed(err.to_string()))?;
        completion
            .first_content()
            .map(str::to_owned)
            .ok_or_else(|| CompletionError::malformed("response has no choices"))
    }
}
