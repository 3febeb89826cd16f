//! Transcript export.

use chrono::{DateTime, Local};
use std::error::Error as StdError;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::config::path_display;
use crate::core::conversation::Conversation;
use crate::core::message::Role;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ATTACHMENT_NOTE: &str = "(image jointe)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Plain,
    Markdown,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Plain => "txt",
            ExportFormat::Markdown => "md",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" | "txt" | "text" => Ok(ExportFormat::Plain),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            other => Err(format!("unknown export format '{other}' (expected plain or markdown)")),
        }
    }
}

#[derive(Debug)]
pub enum ExportError {
    Empty,
    AlreadyExists(PathBuf),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Empty => write!(f, "Nothing to export: the conversation has no messages"),
            ExportError::AlreadyExists(path) => write!(
                f,
                "File '{}' already exists; choose another name or force overwrite",
                path_display(path)
            ),
            ExportError::Io { path, source } => {
                write!(f, "Failed to write {}: {}", path_display(path), source)
            }
        }
    }
}

impl StdError for ExportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ExportError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Render a transcript. Pure: the same conversation always renders the
/// same text.
pub fn render(conversation: &Conversation, format: ExportFormat) -> String {
    let date = conversation.created_at.format(TIMESTAMP_FORMAT);
    let mut out = String::new();

    match format {
        ExportFormat::Plain => {
            out.push_str("CONVERSATION NEXUS AI\n");
            out.push_str(&format!("Titre: {}\n", conversation.title));
            out.push_str(&format!("Date: {date}\n"));
            out.push_str(&format!("Modèle: {}\n", conversation.model));
            out.push_str(&"=".repeat(50));
            out.push_str("\n\n");

            for message in &conversation.messages {
                let label = match message.role {
                    Role::User => "VOUS",
                    Role::Assistant => "ASSISTANT",
                };
                out.push_str(&format!("[{label}]\n{}\n", message.content));
                if message.attachment.is_some() {
                    out.push_str(ATTACHMENT_NOTE);
                    out.push('\n');
                }
                out.push('\n');
            }
        }
        ExportFormat::Markdown => {
            out.push_str(&format!("# {}\n\n", conversation.title));
            out.push_str(&format!("**Date:** {date}\n"));
            out.push_str(&format!("**Modèle:** {}\n\n", conversation.model));
            out.push_str("---\n\n");

            for message in &conversation.messages {
                let heading = match message.role {
                    Role::User => "Vous",
                    Role::Assistant => "Assistant",
                };
                out.push_str(&format!("## {heading}\n\n{}\n\n", message.content));
                if message.attachment.is_some() {
                    out.push_str(&format!("_{ATTACHMENT_NOTE}_\n\n"));
                }
            }
        }
    }

    out
}

/// `conversation_YYYYmmdd_HHMMSS.<ext>` for the given moment.
pub fn default_filename(format: ExportFormat, now: DateTime<Local>) -> String {
    format!(
        "conversation_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Write the rendered transcript to `path`. Refuses to replace an existing
/// file unless `overwrite` is set.
pub fn export_to_file(
    conversation: &Conversation,
    format: ExportFormat,
    path: &Path,
    overwrite: bool,
) -> Result<(), ExportError> {
    if conversation.messages.is_empty() {
        return Err(ExportError::Empty);
    }

    let io_error = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = if overwrite {
        File::create(path).map_err(io_error)?
    } else {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ExportError::AlreadyExists(path.to_path_buf()))
            }
            Err(err) => return Err(io_error(err)),
        }
    };

    let mut writer = BufWriter::new(file);
    writer
        .write_all(render(conversation, format).as_bytes())
        .map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    Ok(())
}
