mod registry;

pub use registry::{all_commands, CommandInvocation};

use chrono::Local;
use std::path::{Path, PathBuf};

use crate::core::config::path_display;
use crate::core::conversation::Conversation;
use crate::core::export::{default_filename, export_to_file, ExportFormat};
use crate::core::models::ModelRef;
use crate::core::session::ChatSession;

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Print this (possibly empty) text and keep going.
    Continue(String),
    ProcessAsMessage(String),
    Quit,
}

pub fn process_input(session: &mut ChatSession, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    if let Some(command) = registry::find_command(command_name) {
        let invocation = CommandInvocation {
            input: trimmed,
            args,
        };
        (command.handler)(session, invocation)
    } else {
        CommandResult::ProcessAsMessage(input.to_string())
    }
}

/// One-line summary used by `/list` and `nexus list`.
pub fn describe_conversation(conversation: &Conversation, current: bool) -> String {
    format!(
        "{} {}  {}  [{}]  {} message(s)  {}",
        if current { "*" } else { " " },
        conversation.id,
        conversation.created_at.format("%Y-%m-%d %H:%M"),
        conversation.model,
        conversation.messages.len(),
        conversation.title
    )
}

/// One-line summary used by `/model` and `nexus models`.
pub fn describe_model(model: &ModelRef, current: bool) -> String {
    let mut line = format!(
        "{} {} ({})",
        if current { "*" } else { " " },
        model.display_name,
        model.provider_id
    );
    if model.supports_image_input {
        line.push_str(" [vision]");
    }
    if let Some(description) = model.description.as_deref() {
        line.push_str(&format!(" - {description}"));
    }
    line
}

pub fn describe_stats(conversation: &Conversation) -> String {
    let stats = conversation.stats();
    format!(
        "{}\n  messages: {}\n  user: {}\n  assistant: {}\n  characters: {}",
        conversation.title,
        stats.messages,
        stats.user_messages,
        stats.assistant_messages,
        stats.characters
    )
}

fn message(text: impl Into<String>) -> CommandResult {
    CommandResult::Continue(text.into())
}

pub(super) fn handle_help(
    _session: &mut ChatSession,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    let mut help = String::from("Commands:");
    for command in all_commands() {
        help.push_str(&format!("\n  {:<34} {}", command.usage, command.help));
    }
    help.push_str("\nAnything else is sent to the model.");
    message(help)
}

pub(super) fn handle_new(
    session: &mut ChatSession,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    match session.new_conversation() {
        Ok(id) => message(format!("Started conversation {id} with {}", session.model().display_name)),
        Err(err) => message(format!("Error: {err}")),
    }
}

pub(super) fn handle_list(
    session: &mut ChatSession,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    let conversations = session.store().list();
    if conversations.is_empty() {
        return message("No saved conversations.");
    }
    let current = session.current_id().map(str::to_owned);
    let lines: Vec<String> = conversations
        .iter()
        .map(|conversation| {
            describe_conversation(conversation, current.as_deref() == Some(conversation.id.as_str()))
        })
        .collect();
    message(lines.join("\n"))
}

pub(super) fn handle_open(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    if invocation.args.is_empty() {
        return message("Usage: /open <id>");
    }
    match session.open(invocation.args) {
        Ok(conversation) => {
            let mut text = format!(
                "Opened \"{}\" ({}, {} message(s))",
                conversation.title,
                session.model().display_name,
                conversation.messages.len()
            );
            for entry in &conversation.messages {
                let label = if entry.is_user() { "you" } else { "assistant" };
                text.push_str(&format!("\n{label}> {}", entry.content));
            }
            message(text)
        }
        Err(err) => message(format!("Error: {err}")),
    }
}

pub(super) fn handle_delete(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    if invocation.args.is_empty() {
        return message("Usage: /delete <id>");
    }
    match session.delete(invocation.args) {
        Ok(true) => message(format!("Deleted {}", invocation.args)),
        Ok(false) => message(format!("No conversation with id {}", invocation.args)),
        Err(err) => message(format!("Error: {err}")),
    }
}

pub(super) fn handle_rename(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    if invocation.args.is_empty() {
        return message("Usage: /rename <title>");
    }
    if session.current_id().is_none() {
        return message("No conversation selected.");
    }
    match session.rename_current(invocation.args) {
        Ok(()) => message(format!("Renamed to \"{}\"", invocation.args)),
        Err(err) => message(format!("Error: {err}")),
    }
}

pub(super) fn handle_model(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    if invocation.args.is_empty() {
        let current = session.model().display_name.clone();
        let lines: Vec<String> = session
            .catalog()
            .models()
            .map(|model| describe_model(model, model.display_name == current))
            .collect();
        return message(lines.join("\n"));
    }

    match session.switch_model(invocation.args) {
        Ok(0) => message(format!("Model set to {}", session.model().display_name)),
        Ok(cleared) => message(format!(
            "Model set to {}; cleared {cleared} message(s) from this conversation",
            session.model().display_name
        )),
        Err(err) => message(format!("Error: {err}")),
    }
}

pub(super) fn handle_image(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    if invocation.args.is_empty() {
        session.clear_attachment();
        return message("Attachment cleared.");
    }

    let path = Path::new(invocation.args);
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => return message(format!("Error: cannot read {}: {err}", path_display(path))),
    };
    if let Err(err) = session.attach_image(bytes) {
        return message(format!("Error: {err}"));
    }

    if session.model().supports_image_input {
        message(format!("Attached {} to the next message", path_display(path)))
    } else {
        message(format!(
            "Attached {}; note that {} does not accept images, so it will be dropped",
            path_display(path),
            session.model().display_name
        ))
    }
}

/// Split `/export` arguments into a format and an optional file name. A
/// lone file name picks markdown for `.md` and plain text otherwise.
fn parse_export_args(args: &str) -> (ExportFormat, Option<PathBuf>) {
    let mut parts = args.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().map(str::trim).filter(|rest| !rest.is_empty());

    match first.parse::<ExportFormat>() {
        Ok(format) if !first.is_empty() => (format, rest.map(PathBuf::from)),
        _ if first.is_empty() => (ExportFormat::default(), None),
        _ => {
            let path = PathBuf::from(args.trim());
            let format = match path.extension().and_then(|ext| ext.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("md") => ExportFormat::Markdown,
                _ => ExportFormat::Plain,
            };
            (format, Some(path))
        }
    }
}

pub(super) fn handle_export(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    let Some(conversation) = session.current() else {
        return message("No conversation selected.");
    };
    let (format, path) = parse_export_args(invocation.args);
    let path = path.unwrap_or_else(|| PathBuf::from(default_filename(format, Local::now())));

    match export_to_file(&conversation, format, &path, false) {
        Ok(()) => message(format!("Exported to {}", path_display(&path))),
        Err(err) => message(format!("Error: {err}")),
    }
}

pub(super) fn handle_stats(
    session: &mut ChatSession,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    match session.current() {
        Some(conversation) => message(describe_stats(&conversation)),
        None => message("No conversation selected."),
    }
}

pub(super) fn handle_temperature(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    if invocation.args.is_empty() {
        return message(format!("Temperature: {}", session.options().temperature()));
    }
    let Ok(value) = invocation.args.parse::<f32>() else {
        return message(format!("Error: '{}' is not a number", invocation.args));
    };
    match session.set_temperature(value) {
        Ok(()) => message(format!("Temperature set to {value}")),
        Err(err) => message(format!("Error: {err}")),
    }
}

pub(super) fn handle_max_tokens(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    if invocation.args.is_empty() {
        return message(format!("Max tokens: {}", session.options().max_tokens()));
    }
    let Ok(value) = invocation.args.parse::<u32>() else {
        return message(format!("Error: '{}' is not a whole number", invocation.args));
    };
    match session.set_max_tokens(value) {
        Ok(()) => message(format!("Max tokens set to {value}")),
        Err(err) => message(format!("Error: {err}")),
    }
}

pub(super) fn handle_quit(
    _session: &mut ChatSession,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    CommandResult::Quit
}

#[cfg(test)]
mod tests;
