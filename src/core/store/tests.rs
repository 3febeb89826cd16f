use super::*;
use crate::core::conversation::DEFAULT_TITLE;
use crate::core::message::{Attachment, ImageFormat};
use tempfile::TempDir;

fn molmo() -> ModelRef {
    ModelRef {
        display_name: "Molmo 2 8B".to_string(),
        provider_id: "allenai/molmo-2-8b:free".to_string(),
        supports_image_input: true,
        description: None,
    }
}

fn llama() -> ModelRef {
    ModelRef {
        display_name: "Llama 2 70B".to_string(),
        provider_id: "meta-llama/llama-2-70b-chat".to_string(),
        supports_image_input: false,
        description: None,
    }
}

fn store_in(dir: &TempDir) -> ConversationStore {
    ConversationStore::open(dir.path().join("conversations.json"))
}

#[test]
fn load_returns_empty_for_missing_and_malformed_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("conversations.json");
    assert!(load(&path).is_empty());

    fs::write(&path, "{ not json").unwrap();
    assert!(load(&path).is_empty());

    fs::write(&path, r#"["an", "array"]"#).unwrap();
    assert!(load(&path).is_empty());
}

#[test]
fn save_then_load_round_trips_and_is_stable_on_disk() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("nested").join("conversations.json");

    let mut conversation = Conversation::new("abc", "Molmo 2 8B", Local::now());
    conversation.messages.push(
        Message::user("décris l'image").with_attachment(Some(Attachment {
            format: ImageFormat::Png,
            data: vec![0x89, b'P', b'N', b'G'],
        })),
    );
    conversation.messages.push(Message::assistant("Un chat."));
    let mut conversations = ConversationMap::new();
    conversations.insert("abc".to_string(), conversation);

    save(&path, &conversations).expect("save failed");
    let loaded = load(&path);
    assert_eq!(loaded, conversations);

    let first_write = fs::read_to_string(&path).unwrap();
    save(&path, &loaded).expect("second save failed");
    assert_eq!(fs::read_to_string(&path).unwrap(), first_write);
}

#[test]
fn load_fills_ids_from_keys() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("conversations.json");
    fs::write(
        &path,
        r#"{"0": {"title": "Vieux", "model": "Llama 2 70B", "messages": [], "created_at": "2024-01-02T03:04:05"}}"#,
    )
    .unwrap();

    let loaded = load(&path);
    assert_eq!(loaded["0"].id, "0");
    assert_eq!(loaded["0"].title, "Vieux");
}

#[test]
fn create_generates_unique_ids_and_persists() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = store_in(&temp_dir);

    let ids: Vec<String> = (0..25)
        .map(|_| store.create(&molmo()).expect("create failed"))
        .collect();
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());

    let conversation = store.get(&ids[0]).expect("created conversation");
    assert_eq!(conversation.title, DEFAULT_TITLE);
    assert_eq!(conversation.model, "Molmo 2 8B");
    assert!(conversation.messages.is_empty());

    assert_eq!(load(store.path()).len(), 25);
}

#[test]
fn append_keeps_order_and_grows_by_one() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = store_in(&temp_dir);
    let id = store.create(&llama()).unwrap();

    let contents = ["un", "deux", "trois", "quatre"];
    for (index, content) in contents.iter().enumerate() {
        let message = if index % 2 == 0 {
            Message::user(*content)
        } else {
            Message::assistant(*content)
        };
        let len = store.append_message(&id, message).unwrap();
        assert_eq!(len, Some(index + 1));
    }

    let persisted = load(store.path());
    let seen: Vec<&str> = persisted[&id]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(seen, contents);
}

#[test]
fn first_user_message_titles_the_conversation_once() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = store_in(&temp_dir);
    let id = store.create(&llama()).unwrap();

    store
        .append_message(&id, Message::user("Comment fonctionne un compilateur ?"))
        .unwrap();
    store.append_message(&id, Message::user("Et un linker ?")).unwrap();
    assert_eq!(
        store.get(&id).unwrap().title,
        "Comment fonctionne un compilateur ?"
    );

    let renamed = store.create(&llama()).unwrap();
    store.rename(&renamed, "  Mon titre  ").unwrap();
    store.append_message(&renamed, Message::user("bonjour")).unwrap();
    assert_eq!(store.get(&renamed).unwrap().title, "Mon titre");
}

#[test]
fn unknown_ids_are_reported_without_writing() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = store_in(&temp_dir);
    store.create(&llama()).unwrap();
    let before = fs::read_to_string(store.path()).unwrap();

    assert!(!store.delete("missing").unwrap());
    assert!(!store.rename("missing", "x").unwrap());
    assert_eq!(store.append_message("missing", Message::user("x")).unwrap(), None);
    assert_eq!(store.set_model("missing", &molmo()).unwrap(), None);

    assert_eq!(store.len(), 1);
    assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
}

#[test]
fn delete_removes_and_persists() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = store_in(&temp_dir);
    let keep = store.create(&llama()).unwrap();
    let drop = store.create(&llama()).unwrap();

    assert!(store.delete(&drop).unwrap());
    assert!(!store.contains(&drop));
    let persisted = load(store.path());
    assert!(persisted.contains_key(&keep));
    assert!(!persisted.contains_key(&drop));
}

#[test]
fn set_model_clears_history() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = store_in(&temp_dir);
    let id = store.create(&llama()).unwrap();
    store.append_message(&id, Message::user("hi")).unwrap();
    store.append_message(&id, Message::assistant("hello")).unwrap();

    assert_eq!(store.set_model(&id, &molmo()).unwrap(), Some(2));
    let conversation = store.get(&id).unwrap();
    assert!(conversation.messages.is_empty());
    assert_eq!(conversation.model, "Molmo 2 8B");
}

#[test]
fn set_model_to_the_same_model_keeps_history() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = store_in(&temp_dir);
    let id = store.create(&llama()).unwrap();
    store.append_message(&id, Message::user("hi")).unwrap();
    store.append_message(&id, Message::assistant("hello")).unwrap();
    let before = fs::read_to_string(store.path()).unwrap();

    assert_eq!(store.set_model(&id, &llama()).unwrap(), Some(0));
    assert_eq!(store.get(&id).unwrap().messages.len(), 2);
    assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
}

#[test]
fn create_unsaved_stays_in_memory_until_flushed() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = store_in(&temp_dir);

    let id = store.create_unsaved(&llama());
    assert!(store.contains(&id));
    assert!(!store.path().exists());

    store.flush().unwrap();
    assert!(load(store.path()).contains_key(&id));
}

#[test]
fn list_is_newest_first() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("conversations.json");
    let older = Conversation::new(
        "older",
        "Llama 2 70B",
        Local::now() - chrono::Duration::days(2),
    );
    let newer = Conversation::new("newer", "Llama 2 70B", Local::now());
    let conversations = ConversationMap::from([
        ("older".to_string(), older),
        ("newer".to_string(), newer),
    ]);
    save(&path, &conversations).unwrap();

    let store = ConversationStore::open(&path);
    let ids: Vec<String> = store.list().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["newer".to_string(), "older".to_string()]);
}

#[test]
fn two_handles_on_one_file_do_not_lose_updates() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("conversations.json");
    let first = ConversationStore::open(&path);
    let id = first.create(&llama()).unwrap();

    // Make sure the second write lands on a distinct mtime tick.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let second = ConversationStore::open(&path);
    let other = second.create(&molmo()).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(1100));
    first.append_message(&id, Message::user("hi")).unwrap();

    let persisted = load(&path);
    assert!(persisted.contains_key(&other));
    assert_eq!(persisted[&id].messages.len(), 1);
}

#[cfg(unix)]
#[test]
fn failed_save_keeps_in_memory_state() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store_dir = temp_dir.path().join("locked");
    fs::create_dir_all(&store_dir).unwrap();
    let store = ConversationStore::open(store_dir.join("conversations.json"));
    let id = store.create(&llama()).unwrap();

    fs::set_permissions(&store_dir, fs::Permissions::from_mode(0o500)).unwrap();
    let marker = store_dir.join("writable");
    if fs::write(&marker, b"").is_ok() {
        // Running with privileges that ignore directory permissions.
        let _ = fs::remove_file(&marker);
        fs::set_permissions(&store_dir, fs::Permissions::from_mode(0o700)).unwrap();
        return;
    }

    let result = store.append_message(&id, Message::user("survit"));
    fs::set_permissions(&store_dir, fs::Permissions::from_mode(0o700)).unwrap();

    assert!(matches!(result, Err(StoreError::Io { .. })));
    assert_eq!(store.get(&id).unwrap().messages.len(), 1);

    store.flush().expect("flush after permissions restored");
    assert_eq!(load(store.path())[&id].messages.len(), 1);
}
