use super::*;
use clap::CommandFactory;
use std::path::Path;
use tempfile::TempDir;

fn parse(argv: &[&str]) -> Args {
    Args::try_parse_from(argv).unwrap()
}

#[test]
fn clap_definition_is_consistent() {
    Args::command().debug_assert();
}

#[test]
fn chat_is_the_default_command() {
    let args = parse(&["nexus"]);
    assert!(args.command.is_none());

    let args = parse(&["nexus", "chat", "--conversation", "20240101-0"]);
    match args.command {
        Some(Commands::Chat { conversation }) => {
            assert_eq!(conversation.as_deref(), Some("20240101-0"))
        }
        _ => panic!("expected chat"),
    }
}

#[test]
fn say_collects_the_prompt_words() {
    let args = parse(&["nexus", "say", "--image", "photo.png", "décris", "cette", "image"]);
    match &args.command {
        Some(Commands::Say { image, prompt }) => {
            assert_eq!(image.as_deref(), Some(Path::new("photo.png")));
            assert_eq!(prompt.join(" "), "décris cette image");
        }
        _ => panic!("expected say"),
    }
}

#[test]
fn global_flags_work_after_the_subcommand() {
    let args = parse(&["nexus", "list", "--backend", "offline", "-t", "1.5"]);
    assert!(matches!(args.command, Some(Commands::List)));
    assert_eq!(args.backend, Some(BackendKind::Simulated));
    assert_eq!(args.temperature, Some(1.5));
}

#[test]
fn say_requires_a_prompt() {
    assert!(Args::try_parse_from(["nexus", "say"]).is_err());
}

#[test]
fn bad_backend_is_rejected_by_the_parser() {
    assert!(Args::try_parse_from(["nexus", "--backend", "carrier-pigeon"]).is_err());
}

#[test]
fn export_flags_parse() {
    let args = parse(&[
        "nexus", "export", "abc", "--format", "md", "-o", "out.md", "--force",
    ]);
    match args.command {
        Some(Commands::Export {
            id,
            format,
            output,
            force,
        }) => {
            assert_eq!(id, "abc");
            assert_eq!(format, Some(ExportFormat::Markdown));
            assert_eq!(output, Some(PathBuf::from("out.md")));
            assert!(force);
        }
        _ => panic!("expected export"),
    }
}

#[test]
fn relay_port_flag_parses() {
    let args = parse(&["nexus", "relay", "--host", "127.0.0.1", "--port", "8081"]);
    match args.command {
        Some(Commands::Relay { host, port }) => {
            assert_eq!(host, "127.0.0.1");
            assert_eq!(port, 8081);
        }
        _ => panic!("expected relay"),
    }
}

#[test]
fn flags_override_the_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        "backend = \"native\"\ndefault_model = \"Molmo 2 8B\"\ntemperature = 0.3\n",
    )
    .unwrap();
    let store = temp_dir.path().join("history.json");

    let args = parse(&[
        "nexus",
        "--config",
        config_path.to_str().unwrap(),
        "--store",
        store.to_str().unwrap(),
        "--backend",
        "simulated",
        "-m",
        "Llama 2 70B",
        "--max-tokens",
        "100",
    ]);
    let config = load_config(&args).unwrap();
    assert_eq!(config.backend(), BackendKind::Simulated);
    assert_eq!(config.default_model(), "Llama 2 70B");
    assert_eq!(config.temperature(), 0.3);
    assert_eq!(config.max_tokens(), 100);
    assert_eq!(config.store_path(), store);
}

#[test]
fn out_of_range_flags_fail_validation() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("missing.toml");
    let args = parse(&[
        "nexus",
        "--config",
        config_path.to_str().unwrap(),
        "--temperature",
        "3",
    ]);
    assert!(load_config(&args).is_err());
}

#[tokio::test]
async fn simulated_session_answers_offline() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        backend: Some(BackendKind::Simulated),
        store_path: Some(temp_dir.path().join("conversations.json")),
        default_model: Some("Llama 2 70B".to_string()),
        ..Default::default()
    };

    let mut session = build_session(&config).unwrap();
    assert!(!session.is_live());
    assert_eq!(session.model().display_name, "Llama 2 70B");

    let outcome = session.submit("bonjour", None).await.unwrap();
    assert!(!outcome.reply.content.is_empty());
    assert!(outcome.fallback.is_some());
}

#[test]
fn unknown_default_model_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        backend: Some(BackendKind::Simulated),
        store_path: Some(temp_dir.path().join("conversations.json")),
        default_model: Some("GPT-5".to_string()),
        ..Default::default()
    };
    let err = build_session(&config).err().unwrap();
    assert_eq!(err.to_string(), "Unknown model: GPT-5");
}
