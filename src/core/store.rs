//! Durable conversation store.
//!
//! The whole mapping is one JSON object written atomically (temp file in the
//! same directory, then rename) after every mutation. Mutations run under a
//! single writer lock and reload the file first when it changed on disk, so
//! several handles sharing one file inside a process do not lose updates.

use chrono::Local;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::core::config::path_display;
use crate::core::conversation::{title_from_message, Conversation};
use crate::core::message::Message;
use crate::core::models::ModelRef;

pub type ConversationMap = BTreeMap<String, Conversation>;

/// Errors raised while persisting the store. Reads never fail: unreadable or
/// malformed files load as an empty store.
#[derive(Debug)]
pub enum StoreError {
    /// Could not create the parent directory or write the temporary file.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The mapping could not be serialized.
    Serialize { source: serde_json::Error },

    /// The temporary file could not replace the store file.
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "Failed to write conversations to {}: {}", path_display(path), source)
            }
            StoreError::Serialize { source } => {
                write!(f, "Failed to serialize conversations: {source}")
            }
            StoreError::Persist { path, source } => {
                write!(f, "Failed to replace {}: {}", path_display(path), source.error)
            }
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Serialize { source } => Some(source),
            StoreError::Persist { source, .. } => Some(source),
        }
    }
}

/// Read the store file. Missing, unreadable, or malformed files yield an
/// empty mapping.
pub fn load(path: &Path) -> ConversationMap {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return ConversationMap::new(),
        Err(err) => {
            warn!(path = %path_display(path), error = %err, "conversation store unreadable; starting empty");
            return ConversationMap::new();
        }
    };

    match serde_json::from_str::<ConversationMap>(&contents) {
        Ok(mut conversations) => {
            for (id, conversation) in conversations.iter_mut() {
                if conversation.id != *id {
                    conversation.id = id.clone();
                }
            }
            conversations
        }
        Err(err) => {
            warn!(path = %path_display(path), error = %err, "conversation store malformed; starting empty");
            ConversationMap::new()
        }
    }
}

/// Serialize the whole mapping and atomically replace the store file.
pub fn save(path: &Path, conversations: &ConversationMap) -> Result<(), StoreError> {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());

    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let contents = serde_json::to_string_pretty(conversations)
        .map_err(|source| StoreError::Serialize { source })?;

    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new_in("."),
    }
    .map_err(io_error)?;

    temp_file.write_all(contents.as_bytes()).map_err(io_error)?;
    temp_file.as_file_mut().sync_all().map_err(io_error)?;
    temp_file.persist(path).map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path_display(path), count = conversations.len(), "conversations saved");
    Ok(())
}

#[derive(Default)]
struct StoreState {
    conversations: ConversationMap,
    modified: Option<SystemTime>,
}

pub struct ConversationStore {
    path: PathBuf,
    state: Mutex<StoreState>,
    created: AtomicU64,
}

impl ConversationStore {
    /// Open the store at `path`, loading whatever is there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = StoreState {
            conversations: load(&path),
            modified: Self::modified_time(&path),
        };
        Self {
            path,
            state: Mutex::new(state),
            created: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<Conversation> {
        self.lock().conversations.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().conversations.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every conversation.
    pub fn snapshot(&self) -> ConversationMap {
        self.lock().conversations.clone()
    }

    /// All conversations, newest first.
    pub fn list(&self) -> Vec<Conversation> {
        let mut conversations: Vec<Conversation> =
            self.lock().conversations.values().cloned().collect();
        conversations.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        conversations
    }

    /// Start an empty conversation bound to `model`, save, and return its id.
    pub fn create(&self, model: &ModelRef) -> Result<String, StoreError> {
        let id = self.create_unsaved(model);
        self.flush()?;
        Ok(id)
    }

    /// Insert an empty conversation bound to `model` in memory only. The
    /// caller owns persisting it with [`flush`](Self::flush).
    pub fn create_unsaved(&self, model: &ModelRef) -> String {
        let now = Local::now();
        let mut state = self.lock();
        let conversations = self.refresh(&mut state);
        let id = loop {
            let sequence = self.created.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{}-{sequence}", now.format("%Y%m%d%H%M%S%3f"));
            if !conversations.contains_key(&candidate) {
                break candidate;
            }
        };
        conversations.insert(
            id.clone(),
            Conversation::new(id.clone(), model.display_name.clone(), now),
        );
        id
    }

    /// Remove a conversation. Returns whether anything was removed; a missing
    /// id is not an error and leaves the file untouched.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|conversations| conversations.remove(id).map(|_| true))
            .map(|removed| removed.unwrap_or(false))
    }

    /// Returns `false` when the conversation does not exist.
    pub fn rename(&self, id: &str, title: &str) -> Result<bool, StoreError> {
        let title = title.trim().to_string();
        self.mutate(|conversations| {
            let conversation = conversations.get_mut(id)?;
            conversation.title = title;
            Some(true)
        })
        .map(|renamed| renamed.unwrap_or(false))
    }

    /// Append `message`, titling the conversation after its first user
    /// message. Returns the new message count, or `None` for an unknown id.
    pub fn append_message(&self, id: &str, message: Message) -> Result<Option<usize>, StoreError> {
        self.mutate(|conversations| {
            let conversation = conversations.get_mut(id)?;
            if message.is_user()
                && conversation.has_default_title()
                && !conversation.messages.iter().any(Message::is_user)
            {
                conversation.title = title_from_message(&message.content);
            }
            conversation.messages.push(message);
            Some(conversation.messages.len())
        })
    }

    /// Rebind a conversation to `model`, discarding its history. Returns the
    /// number of messages cleared, or `None` for an unknown id. Selecting the
    /// model the conversation already uses changes nothing.
    pub fn set_model(&self, id: &str, model: &ModelRef) -> Result<Option<usize>, StoreError> {
        let mut state = self.lock();
        let Some(conversation) = self.refresh(&mut state).get_mut(id) else {
            return Ok(None);
        };
        if conversation.model == model.display_name {
            return Ok(Some(0));
        }
        let cleared = conversation.messages.len();
        conversation.messages.clear();
        conversation.model = model.display_name.clone();
        self.persist(&mut state)?;
        Ok(Some(cleared))
    }

    /// Write the current in-memory state back to disk, e.g. after a failed
    /// save.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        self.persist(&mut state)
    }

    /// Run `mutator` against the freshest mapping under the writer lock and
    /// persist if it reports a change (`Some`). The in-memory change is kept
    /// even when the save fails.
    fn mutate<F, T>(&self, mutator: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&mut ConversationMap) -> Option<T>,
    {
        let mut state = self.lock();
        let Some(result) = mutator(self.refresh(&mut state)) else {
            return Ok(None);
        };
        self.persist(&mut state)?;
        Ok(Some(result))
    }

    /// Reload the mapping if the file changed on disk since we last saw it.
    fn refresh<'a>(&self, state: &'a mut StoreState) -> &'a mut ConversationMap {
        let disk_modified = Self::modified_time(&self.path);
        if disk_modified.is_some() && state.modified != disk_modified {
            debug!(path = %path_display(&self.path), "store changed on disk; reloading");
            state.conversations = load(&self.path);
            state.modified = disk_modified;
        }
        &mut state.conversations
    }

    fn persist(&self, state: &mut StoreState) -> Result<(), StoreError> {
        save(&self.path, &state.conversations)?;
        state.modified = Self::modified_time(&self.path);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn modified_time(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).ok()?.modified().ok()
    }
}

#[cfg(test)]
mod tests;
