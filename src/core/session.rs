//! Session controller
//!
//! Owns everything one interactive user touches: the store, the gateway, the
//! model table, the selected conversation and model, and sampling options.
//! A turn is `Idle -> AwaitingResponse -> Idle`; the user message is stored
//! before the gateway is called and the assistant message after it returns.

use std::error::Error as StdError;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::conversation::Conversation;
use crate::core::gateway::{
    CompletionError, CompletionGateway, CompletionOptions, StreamMessage, ValidationError,
};
use crate::core::message::{Attachment, Message};
use crate::core::models::{ModelCatalog, ModelRef};
use crate::core::store::{ConversationStore, StoreError};

#[derive(Debug)]
pub enum SessionError {
    Validation(ValidationError),
    Store(StoreError),
    UnknownConversation(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Validation(err) => write!(f, "{err}"),
            SessionError::Store(err) => write!(f, "{err}"),
            SessionError::UnknownConversation(id) => write!(f, "No conversation with id {id}"),
        }
    }
}

impl StdError for SessionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SessionError::Validation(err) => Some(err),
            SessionError::Store(err) => Some(err),
            SessionError::UnknownConversation(_) => None,
        }
    }
}

impl From<ValidationError> for SessionError {
    fn from(err: ValidationError) -> Self {
        SessionError::Validation(err)
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Store(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse,
}

/// What a completed turn produced. A save failure does not abort the turn:
/// both messages stay in memory and `save_error` reports the last failure.
#[derive(Debug)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub reply: Message,
    pub fallback: Option<CompletionError>,
    pub save_error: Option<StoreError>,
    pub dropped_attachment: bool,
}

pub struct ChatSession {
    store: ConversationStore,
    gateway: CompletionGateway,
    catalog: ModelCatalog,
    current: Option<String>,
    model: ModelRef,
    options: CompletionOptions,
    pending_attachment: Option<Attachment>,
    state: TurnState,
}

impl ChatSession {
    pub fn new(
        store: ConversationStore,
        gateway: CompletionGateway,
        catalog: ModelCatalog,
        model: ModelRef,
        options: CompletionOptions,
    ) -> Self {
        Self {
            store,
            gateway,
            catalog,
            current: None,
            model,
            options,
            pending_attachment: None,
            state: TurnState::Idle,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    pub fn options(&self) -> CompletionOptions {
        self.options
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.gateway.is_live()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<Conversation> {
        self.current.as_deref().and_then(|id| self.store.get(id))
    }

    pub fn has_pending_attachment(&self) -> bool {
        self.pending_attachment.is_some()
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), ValidationError> {
        self.options = self.options.with_temperature(temperature)?;
        Ok(())
    }

    pub fn set_max_tokens(&mut self, max_tokens: u32) -> Result<(), ValidationError> {
        self.options = self.options.with_max_tokens(max_tokens)?;
        Ok(())
    }

    /// Start a fresh conversation with the current model and select it.
    pub fn new_conversation(&mut self) -> Result<String, SessionError> {
        let (id, saved) = self.start_conversation();
        saved?;
        Ok(id)
    }

    /// Create and select a conversation. It stays selected in memory even
    /// when the save fails.
    fn start_conversation(&mut self) -> (String, Result<(), StoreError>) {
        let id = self.store.create_unsaved(&self.model);
        debug!(id = %id, model = %self.model.display_name, "conversation created");
        self.current = Some(id.clone());
        let saved = self.store.flush();
        (id, saved)
    }

    /// Select an existing conversation and adopt its model.
    pub fn open(&mut self, id: &str) -> Result<Conversation, SessionError> {
        let conversation = self
            .store
            .get(id)
            .ok_or_else(|| SessionError::UnknownConversation(id.to_string()))?;
        match self.catalog.find(&conversation.model) {
            Some(model) => self.model = model.clone(),
            None => warn!(
                model = %conversation.model,
                "conversation uses a model missing from the table; keeping {}",
                self.model.display_name
            ),
        }
        self.current = Some(conversation.id.clone());
        Ok(conversation)
    }

    /// Delete a conversation; deselects it if it was current. A missing id
    /// is a no-op.
    pub fn delete(&mut self, id: &str) -> Result<bool, SessionError> {
        let removed = self.store.delete(id)?;
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        Ok(removed)
    }

    pub fn rename_current(&mut self, title: &str) -> Result<(), SessionError> {
        if title.trim().is_empty() {
            return Err(ValidationError::EmptySubmission.into());
        }
        let id = self
            .current
            .clone()
            .ok_or_else(|| SessionError::UnknownConversation(String::new()))?;
        if self.store.rename(&id, title)? {
            Ok(())
        } else {
            Err(SessionError::UnknownConversation(id))
        }
    }

    /// Switch model. The current conversation's history is cleared when the
    /// model actually changes; returns how many messages were discarded.
    pub fn switch_model(&mut self, name: &str) -> Result<usize, SessionError> {
        let model = self
            .catalog
            .find(name)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownModel(name.to_string()))?;

        let cleared = match self.current.as_deref() {
            Some(id) => self.store.set_model(id, &model)?.unwrap_or(0),
            None => 0,
        };
        if cleared > 0 {
            warn!(cleared, model = %model.display_name, "model switch cleared conversation history");
        }
        self.model = model;
        Ok(cleared)
    }

    /// Queue an image for the next submission.
    pub fn attach_image(&mut self, bytes: Vec<u8>) -> Result<(), ValidationError> {
        let attachment = Attachment::from_bytes(bytes).ok_or_else(|| {
            ValidationError::UnsupportedAttachment("expected a PNG or JPEG image".to_string())
        })?;
        self.pending_attachment = Some(attachment);
        Ok(())
    }

    pub fn clear_attachment(&mut self) {
        self.pending_attachment = None;
    }

    /// Run one turn. Empty input is rejected before anything changes.
    pub async fn submit(
        &mut self,
        text: &str,
        sink: Option<&mpsc::UnboundedSender<StreamMessage>>,
    ) -> Result<TurnOutcome, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptySubmission.into());
        }

        let mut save_error = None;
        let id = match self.current.clone() {
            Some(id) if self.store.contains(&id) => id,
            _ => {
                let (id, saved) = self.start_conversation();
                if let Err(err) = saved {
                    warn!(error = %err, "failed to persist new conversation");
                    save_error = Some(err);
                }
                id
            }
        };

        let mut attachment = self.pending_attachment.take();
        let dropped_attachment = attachment.is_some() && !self.model.supports_image_input;
        if dropped_attachment {
            warn!(model = %self.model.display_name, "model does not accept images; attachment dropped");
            attachment = None;
        }

        let user_message = Message::user(text).with_attachment(attachment);
        match self.store.append_message(&id, user_message) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(SessionError::UnknownConversation(id)),
            Err(err) => {
                warn!(error = %err, "failed to persist user message");
                save_error = Some(err);
            }
        }

        let history = self
            .store
            .get(&id)
            .map(|conversation| conversation.messages)
            .unwrap_or_default();

        self.state = TurnState::AwaitingResponse;
        let completion = self
            .gateway
            .complete(&history, &self.model, self.options, sink)
            .await;
        self.state = TurnState::Idle;

        let reply = Message::assistant(completion.text);
        if let Err(err) = self.store.append_message(&id, reply.clone()) {
            warn!(error = %err, "failed to persist assistant message");
            save_error = Some(err);
        }

        Ok(TurnOutcome {
            conversation_id: id,
            reply,
            fallback: completion.fallback,
            save_error,
            dropped_attachment,
        })
    }
}
