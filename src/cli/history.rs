//! Non-interactive conversation management: list, models, export, rename,
//! delete, stats.

use std::error::Error;
use std::path::PathBuf;

use chrono::Local;

use crate::commands::{describe_conversation, describe_model, describe_stats};
use crate::core::config::{path_display, Config};
use crate::core::conversation::Conversation;
use crate::core::export::{default_filename, export_to_file, ExportFormat};
use crate::core::models::ModelCatalog;
use crate::core::store::ConversationStore;

fn open_store(config: &Config) -> ConversationStore {
    ConversationStore::open(config.store_path())
}

fn find_conversation(store: &ConversationStore, id: &str) -> Result<Conversation, Box<dyn Error>> {
    store
        .get(id)
        .ok_or_else(|| format!("No conversation with id {id}").into())
}

pub fn list_conversations(config: &Config) -> Result<(), Box<dyn Error>> {
    let store = open_store(config);
    let conversations = store.list();
    if conversations.is_empty() {
        println!("No saved conversations in {}", path_display(store.path()));
        return Ok(());
    }
    for conversation in &conversations {
        println!("{}", describe_conversation(conversation, false));
    }
    Ok(())
}

pub fn list_models(config: &Config) -> Result<(), Box<dyn Error>> {
    let catalog = ModelCatalog::with_overrides(&config.models);
    let default = catalog.find(config.default_model()).cloned();
    println!("Available models:");
    for model in catalog.models() {
        let current = default
            .as_ref()
            .is_some_and(|default| default.display_name == model.display_name);
        println!("{}", describe_model(model, current));
    }
    Ok(())
}

/// Explicit format first, then the output file's extension, then plain.
pub fn resolve_export_format(format: Option<ExportFormat>, output: Option<&PathBuf>) -> ExportFormat {
    if let Some(format) = format {
        return format;
    }
    output
        .and_then(|path| path.extension())
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse().ok())
        .unwrap_or_default()
}

pub fn export_conversation(
    config: &Config,
    id: &str,
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
    force: bool,
) -> Result<(), Box<dyn Error>> {
    let store = open_store(config);
    let conversation = find_conversation(&store, id)?;
    let format = resolve_export_format(format, output.as_ref());
    let path = output.unwrap_or_else(|| PathBuf::from(default_filename(format, Local::now())));

    export_to_file(&conversation, format, &path, force)?;
    println!("✅ Exported \"{}\" to {}", conversation.title, path_display(&path));
    Ok(())
}

pub fn rename_conversation(config: &Config, id: &str, title: &str) -> Result<(), Box<dyn Error>> {
    if title.trim().is_empty() {
        return Err("Title cannot be empty".into());
    }
    let store = open_store(config);
    if !store.rename(id, title)? {
        return Err(format!("No conversation with id {id}").into());
    }
    println!("✅ Renamed {id} to \"{}\"", title.trim());
    Ok(())
}

pub fn delete_conversation(config: &Config, id: &str) -> Result<(), Box<dyn Error>> {
    let store = open_store(config);
    if store.delete(id)? {
        println!("✅ Deleted {id}");
    } else {
        println!("No conversation with id {id}; nothing deleted");
    }
    Ok(())
}

pub fn show_stats(config: &Config, id: &str) -> Result<(), Box<dyn Error>> {
    let store = open_store(config);
    let conversation = find_conversation(&store, id)?;
    println!("{}", describe_stats(&conversation));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use tempfile::TempDir;

    fn config_in(temp_dir: &TempDir) -> Config {
        Config {
            store_path: Some(temp_dir.path().join("conversations.json")),
            ..Default::default()
        }
    }

    fn seed(config: &Config) -> String {
        let store = ConversationStore::open(config.store_path());
        let catalog = ModelCatalog::builtin();
        let id = store.create(catalog.first().unwrap()).unwrap();
        store.append_message(&id, Message::user("bonjour")).unwrap();
        store
            .append_message(&id, Message::assistant("Salut !"))
            .unwrap();
        id
    }

    #[test]
    fn export_format_follows_flag_then_extension() {
        let md = PathBuf::from("notes.md");
        let txt = PathBuf::from("notes.txt");
        let other = PathBuf::from("notes.log");
        assert_eq!(
            resolve_export_format(Some(ExportFormat::Plain), Some(&md)),
            ExportFormat::Plain
        );
        assert_eq!(resolve_export_format(None, Some(&md)), ExportFormat::Markdown);
        assert_eq!(resolve_export_format(None, Some(&txt)), ExportFormat::Plain);
        assert_eq!(resolve_export_format(None, Some(&other)), ExportFormat::Plain);
        assert_eq!(resolve_export_format(None, None), ExportFormat::Plain);
    }

    #[test]
    fn export_requires_force_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        let id = seed(&config);
        let output = temp_dir.path().join("out.md");

        export_conversation(&config, &id, None, Some(output.clone()), false).unwrap();
        assert!(std::fs::read_to_string(&output)
            .unwrap()
            .starts_with("# bonjour"));

        assert!(export_conversation(&config, &id, None, Some(output.clone()), false).is_err());
        export_conversation(
            &config,
            &id,
            Some(ExportFormat::Plain),
            Some(output.clone()),
            true,
        )
        .unwrap();
        assert!(std::fs::read_to_string(&output)
            .unwrap()
            .starts_with("CONVERSATION NEXUS AI"));
    }

    #[test]
    fn unknown_ids_are_reported() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        assert!(show_stats(&config, "missing").is_err());
        assert!(rename_conversation(&config, "missing", "Titre").is_err());
        assert!(export_conversation(&config, "missing", None, None, false).is_err());
        delete_conversation(&config, "missing").unwrap();
    }

    #[test]
    fn rename_and_delete_persist() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        let id = seed(&config);

        assert!(rename_conversation(&config, &id, "   ").is_err());
        rename_conversation(&config, &id, "Projet Nexus").unwrap();
        let store = ConversationStore::open(config.store_path());
        assert_eq!(store.get(&id).unwrap().title, "Projet Nexus");

        delete_conversation(&config, &id).unwrap();
        let store = ConversationStore::open(config.store_path());
        assert!(store.is_empty());
    }
}
