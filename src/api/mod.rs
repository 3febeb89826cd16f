//! Wire payloads for the OpenAI-compatible completions API and the relay.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WireMessage {
    pub role: String,
    pub content: WireContent,
}

/// Plain text for most turns; typed parts when an image rides along.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl WireContent {
    /// Text portion of the content, ignoring image parts.
    pub fn text(&self) -> String {
        match self {
            WireContent::Text(text) => text.clone(),
            WireContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: String, messages: Vec<WireMessage>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model,
            messages,
            temperature,
            max_tokens,
            stream: false,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
        }
    }

    /// Neutral sampling parameters the relay pins on every upstream call.
    pub fn with_neutral_sampling(mut self) -> Self {
        self.top_p = Some(1.0);
        self.frequency_penalty = Some(0.0);
        self.presence_penalty = Some(0.0);
        self
    }
}

#[derive(Deserialize)]
pub struct ChatResponseDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
}

/// One `data:` event of a streamed completion.
#[derive(Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
}

#[derive(Deserialize)]
pub struct CompletionMessage {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

/// Body of a non-streamed completion.
#[derive(Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

impl ChatCompletion {
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }
}

/// Request accepted by the relay's chat route. Absent fields take relay defaults.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RelayChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RelayReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayReply {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: Some(content.into()),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_content_serializes_as_plain_string() {
        let message = WireMessage {
            role: "user".to_string(),
            content: WireContent::Text("bonjour".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"role": "user", "content": "bonjour"})
        );
    }

    #[test]
    fn image_parts_use_openai_shape() {
        let content = WireContent::Parts(vec![
            ContentPart::Text {
                text: "Que vois-tu ?".to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,AAAA".to_string(),
                },
            },
        ]);
        assert_eq!(
            serde_json::to_value(&content).unwrap(),
            json!([
                {"type": "text", "text": "Que vois-tu ?"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
            ])
        );
        assert_eq!(content.text(), "Que vois-tu ?");
    }

    #[test]
    fn neutral_sampling_only_appears_when_requested() {
        let plain = ChatRequest::new("m".to_string(), Vec::new(), 0.7, 2000);
        let value = serde_json::to_value(&plain).unwrap();
        assert!(value.get("top_p").is_none());

        let pinned = serde_json::to_value(plain.with_neutral_sampling()).unwrap();
        assert_eq!(pinned["top_p"], json!(1.0));
        assert_eq!(pinned["frequency_penalty"], json!(0.0));
        assert_eq!(pinned["presence_penalty"], json!(0.0));
    }

    #[test]
    fn relay_request_fields_are_optional() {
        let request: RelayChatRequest = serde_json::from_str(r#"{"messages": []}"#).unwrap();
        assert!(request.model.is_none());
        assert!(request.temperature.is_none());

        let request: RelayChatRequest = serde_json::from_value(json!({
            "model": "deepseek/deepseek-chat",
            "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}],
            "max_tokens": 12
        }))
        .unwrap();
        assert_eq!(request.messages[0].content.text(), "hi");
        assert_eq!(request.max_tokens, Some(12));
    }

    #[test]
    fn completion_without_choices_has_no_content() {
        let completion: ChatCompletion = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert!(completion.first_content().is_none());
    }
}
