use super::*;
use crate::core::fallback::FallbackResponder;
use crate::core::gateway::{CompletionGateway, CompletionOptions};
use crate::core::models::ModelCatalog;
use crate::core::store::ConversationStore;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nrest";

fn create_test_session(temp_dir: &TempDir) -> ChatSession {
    let catalog = ModelCatalog::builtin();
    let model = catalog.find("Llama 2 70B").cloned().unwrap();
    ChatSession::new(
        ConversationStore::open(temp_dir.path().join("conversations.json")),
        CompletionGateway::new(None, FallbackResponder::new(HashMap::new()), Duration::from_secs(1)),
        catalog,
        model,
        CompletionOptions::default(),
    )
}

fn output(result: CommandResult) -> String {
    match result {
        CommandResult::Continue(text) => text,
        other => panic!("expected output, got {other:?}"),
    }
}

#[test]
fn plain_text_and_unknown_commands_become_messages() {
    let temp_dir = TempDir::new().unwrap();
    let mut session = create_test_session(&temp_dir);

    assert_eq!(
        process_input(&mut session, "bonjour"),
        CommandResult::ProcessAsMessage("bonjour".to_string())
    );
    assert_eq!(
        process_input(&mut session, "/unknown thing"),
        CommandResult::ProcessAsMessage("/unknown thing".to_string())
    );
    assert_eq!(
        process_input(&mut session, "/"),
        CommandResult::ProcessAsMessage("/".to_string())
    );
}

#[test]
fn command_names_are_case_insensitive() {
    let temp_dir = TempDir::new().unwrap();
    let mut session = create_test_session(&temp_dir);
    assert_eq!(process_input(&mut session, "/QUIT"), CommandResult::Quit);
    assert_eq!(process_input(&mut session, "  /quit  "), CommandResult::Quit);
}

#[test]
fn help_lists_every_command() {
    let temp_dir = TempDir::new().unwrap();
    let mut session = create_test_session(&temp_dir);
    let text = output(process_input(&mut session, "/help"));
    for command in all_commands() {
        assert!(text.contains(command.usage), "missing {}", command.usage);
    }
}

#[test]
fn new_list_and_open_track_the_current_conversation() {
    let temp_dir = TempDir::new().unwrap();
    let mut session = create_test_session(&temp_dir);

    assert_eq!(
        output(process_input(&mut session, "/list")),
        "No saved conversations."
    );

    output(process_input(&mut session, "/new"));
    let first = session.current_id().unwrap().to_string();
    output(process_input(&mut session, "/new"));
    let second = session.current_id().unwrap().to_string();

    let listing = output(process_input(&mut session, "/list"));
    assert_eq!(listing.lines().count(), 2);
    let current_line = listing.lines().find(|line| line.starts_with('*')).unwrap();
    assert!(current_line.contains(&second));

    let opened = output(process_input(&mut session, &format!("/open {first}")));
    assert!(opened.starts_with("Opened"));
    assert_eq!(session.current_id(), Some(first.as_str()));

    let missing = output(process_input(&mut session, "/open nope"));
    assert!(missing.starts_with("Error:"));
}

#[test]
fn delete_and_rename() {
    let temp_dir = TempDir::new().unwrap();
    let mut session = create_test_session(&temp_dir);

    assert_eq!(
        output(process_input(&mut session, "/rename Projet")),
        "No conversation selected."
    );

    output(process_input(&mut session, "/new"));
    let id = session.current_id().unwrap().to_string();
    output(process_input(&mut session, "/rename Projet Nexus"));
    assert_eq!(session.current().unwrap().title, "Projet Nexus");

    let deleted = output(process_input(&mut session, &format!("/delete {id}")));
    assert_eq!(deleted, format!("Deleted {id}"));
    assert!(session.current_id().is_none());
    assert!(session.store().is_empty());

    let again = output(process_input(&mut session, &format!("/delete {id}")));
    assert!(again.starts_with("No conversation"));
}

#[tokio::test]
async fn model_switch_reports_cleared_messages() {
    let temp_dir = TempDir::new().unwrap();
    let mut session = create_test_session(&temp_dir);

    let listing = output(process_input(&mut session, "/model"));
    assert!(listing.contains("* Llama 2 70B"));
    assert!(listing.contains("[vision]"));

    session.submit("bonjour", None).await.unwrap();
    let switched = output(process_input(&mut session, "/model Molmo 2 8B"));
    assert!(switched.contains("cleared 2 message(s)"));
    assert_eq!(session.model().display_name, "Molmo 2 8B");

    let unknown = output(process_input(&mut session, "/model GPT-5"));
    assert!(unknown.starts_with("Error:"));
    assert_eq!(session.model().display_name, "Molmo 2 8B");
}

#[test]
fn image_attach_and_clear() {
    let temp_dir = TempDir::new().unwrap();
    let mut session = create_test_session(&temp_dir);

    let image = temp_dir.path().join("photo.png");
    std::fs::write(&image, PNG).unwrap();
    let text = temp_dir.path().join("notes.txt");
    std::fs::write(&text, "pas une image").unwrap();

    let attached = output(process_input(
        &mut session,
        &format!("/image {}", image.display()),
    ));
    assert!(attached.contains("does not accept images"));
    assert!(session.has_pending_attachment());

    output(process_input(&mut session, "/image"));
    assert!(!session.has_pending_attachment());

    let rejected = output(process_input(&mut session, &format!("/image {}", text.display())));
    assert!(rejected.starts_with("Error:"));
    assert!(!session.has_pending_attachment());

    let missing = output(process_input(&mut session, "/image /definitely/not/here.png"));
    assert!(missing.starts_with("Error: cannot read"));
}

#[tokio::test]
async fn export_writes_once_and_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let mut session = create_test_session(&temp_dir);
    assert_eq!(
        output(process_input(&mut session, "/export")),
        "No conversation selected."
    );

    session.submit("bonjour", None).await.unwrap();
    let target = temp_dir.path().join("out.md");
    let exported = output(process_input(
        &mut session,
        &format!("/export {}", target.display()),
    ));
    assert!(exported.starts_with("Exported to"));
    let contents = std::fs::read_to_string(&target).unwrap();
    assert!(contents.starts_with("# bonjour"));

    let again = output(process_input(
        &mut session,
        &format!("/export plain {}", target.display()),
    ));
    assert!(again.starts_with("Error:"));
    assert_eq!(std::fs::read_to_string(&target).unwrap(), contents);
}

#[test]
fn export_args_pick_format() {
    assert_eq!(parse_export_args(""), (ExportFormat::Plain, None));
    assert_eq!(parse_export_args("markdown"), (ExportFormat::Markdown, None));
    assert_eq!(
        parse_export_args("md notes.txt"),
        (ExportFormat::Markdown, Some(PathBuf::from("notes.txt")))
    );
    assert_eq!(
        parse_export_args("notes.MD"),
        (ExportFormat::Markdown, Some(PathBuf::from("notes.MD")))
    );
    assert_eq!(
        parse_export_args("notes.log"),
        (ExportFormat::Plain, Some(PathBuf::from("notes.log")))
    );
}

#[tokio::test]
async fn stats_count_messages() {
    let temp_dir = TempDir::new().unwrap();
    let mut session = create_test_session(&temp_dir);
    session.submit("bonjour", None).await.unwrap();

    let stats = output(process_input(&mut session, "/stats"));
    assert!(stats.contains("messages: 2"));
    assert!(stats.contains("user: 1"));
    assert!(stats.contains("assistant: 1"));
}

#[test]
fn sampling_options_are_validated() {
    let temp_dir = TempDir::new().unwrap();
    let mut session = create_test_session(&temp_dir);

    output(process_input(&mut session, "/temperature 1.2"));
    assert_eq!(session.options().temperature(), 1.2);
    assert!(output(process_input(&mut session, "/temperature 9")).starts_with("Error:"));
    assert!(output(process_input(&mut session, "/temperature chaud")).starts_with("Error:"));
    assert_eq!(session.options().temperature(), 1.2);

    output(process_input(&mut session, "/max-tokens 512"));
    assert_eq!(session.options().max_tokens(), 512);
    assert!(output(process_input(&mut session, "/max-tokens 4001")).starts_with("Error:"));
    assert_eq!(
        output(process_input(&mut session, "/max-tokens")),
        "Max tokens: 512"
    );
}
