//! Command-line interface parsing and handling
//!
//! Parses arguments, loads configuration with flag overrides, and dispatches
//! to the REPL, one-shot, history, relay, credential, and settings commands.

pub mod auth;
pub mod chat;
pub mod history;
pub mod relay;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::core::config::{path_display, BackendKind, Config};
use crate::core::credentials::resolve_from_system;
use crate::core::export::ExportFormat;
use crate::core::fallback::FallbackResponder;
use crate::core::gateway::{build_transport, CompletionGateway, CompletionOptions, ValidationError};
use crate::core::models::ModelCatalog;
use crate::core::session::ChatSession;
use crate::core::store::ConversationStore;
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "nexus", version)]
#[command(about = "A terminal chat client with saved conversations and an offline fallback")]
#[command(
    long_about = "Nexus is a line-oriented chat client for OpenAI-compatible completion APIs \
(OpenRouter by default). Conversations are saved to a local JSON file and can be resumed, \
renamed, exported, or deleted. When no provider is reachable, replies come from per-model \
canned responses so a conversation never stalls.\n\n\
Backends:\n\
  native      Call the provider directly with your API key\n\
  http        Send turns to a relay (see 'nexus relay') that holds the key\n\
  simulated   Never touch the network\n\n\
Authentication:\n\
  Use 'nexus auth' to store an API key in the system keyring, or set\n\
  OPENROUTER_API_KEY (the variable name is configurable with api-key-env).\n\n\
Chat commands:\n\
  /help             List slash commands\n\
  /model [name]     Show or switch models\n\
  /image <path>     Attach an image to the next message\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Conversation store file
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Model to chat with (display name or provider id)
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Completion backend: native, http, or simulated
    #[arg(short = 'b', long, global = true, value_name = "BACKEND")]
    pub backend: Option<BackendKind>,

    /// Sampling temperature (0-2)
    #[arg(short = 't', long, global = true)]
    pub temperature: Option<f32>,

    /// Maximum reply length in tokens (1-4000)
    #[arg(long, global = true)]
    pub max_tokens: Option<u32>,

    /// Append logs to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "PATH")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat {
        /// Resume a saved conversation
        #[arg(short = 'c', long, value_name = "ID")]
        conversation: Option<String>,
    },
    /// Send one message and print the reply
    Say {
        /// Attach a PNG or JPEG image (vision models only)
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// The message to send
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List saved conversations, newest first
    List,
    /// List available models
    Models,
    /// Export a conversation to a text or markdown file
    Export {
        id: String,
        /// plain or markdown (default: from the output extension, else plain)
        #[arg(short = 'f', long)]
        format: Option<ExportFormat>,
        /// Output file (default: conversation_<timestamp>.<ext>)
        #[arg(short = 'o', long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Replace the output file if it exists
        #[arg(long)]
        force: bool,
    },
    /// Rename a conversation
    Rename {
        id: String,
        #[arg(required = true, trailing_var_arg = true)]
        title: Vec<String>,
    },
    /// Delete a conversation
    Delete { id: String },
    /// Show message and character counts for a conversation
    Stats { id: String },
    /// Serve the HTTP relay that forwards chat requests with the server's key
    Relay {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short = 'p', long, env = "PORT", default_value_t = 5000)]
        port: u16,
    },
    /// Store the provider API key in the system keyring (read from stdin)
    Auth,
    /// Remove the stored provider API key
    Deauth,
    /// Set a configuration value, or print the configuration
    Set {
        key: Option<String>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Clear a configuration value
    Unset { key: String },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let mut args = Args::parse();
    let command = args
        .command
        .take()
        .unwrap_or(Commands::Chat { conversation: None });

    let default_directive = match command {
        Commands::Relay { .. } => "nexus=info",
        _ => "nexus=warn",
    };
    init_tracing(default_directive, args.log.as_deref())?;

    match command {
        Commands::Chat { conversation } => {
            let session = build_session(&load_config(&args)?)?;
            chat::run_chat(session, conversation).await
        }
        Commands::Say { image, prompt } => {
            let session = build_session(&load_config(&args)?)?;
            chat::run_say(session, prompt.join(" "), image).await
        }
        Commands::List => history::list_conversations(&load_config(&args)?),
        Commands::Models => history::list_models(&load_config(&args)?),
        Commands::Export {
            id,
            format,
            output,
            force,
        } => history::export_conversation(&load_config(&args)?, &id, format, output, force),
        Commands::Rename { id, title } => {
            history::rename_conversation(&load_config(&args)?, &id, &title.join(" "))
        }
        Commands::Delete { id } => history::delete_conversation(&load_config(&args)?, &id),
        Commands::Stats { id } => history::show_stats(&load_config(&args)?, &id),
        Commands::Relay { host, port } => relay::run_relay(&load_config(&args)?, &host, port).await,
        Commands::Auth => auth::run_auth(&load_config(&args)?),
        Commands::Deauth => auth::run_deauth(&load_config(&args)?),
        // Settings edit the file itself, without command-line overrides.
        Commands::Set { key, value } => settings::run_set(&config_path(&args), key, value),
        Commands::Unset { key } => settings::run_unset(&config_path(&args), &key),
    }
}

fn config_path(args: &Args) -> PathBuf {
    args.config.clone().unwrap_or_else(Config::get_config_path)
}

/// Load the configuration file and layer command-line flags over it.
pub fn load_config(args: &Args) -> Result<Config, Box<dyn Error>> {
    let mut config = Config::load(args.config.as_deref())?;
    apply_overrides(&mut config, args);
    config.validate()?;
    debug!(
        backend = %config.backend(),
        store = %path_display(config.store_path()),
        "configuration loaded"
    );
    Ok(config)
}

pub fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(backend) = args.backend {
        config.backend = Some(backend);
    }
    if let Some(store) = &args.store {
        config.store_path = Some(store.clone());
    }
    if let Some(model) = &args.model {
        config.default_model = Some(model.clone());
    }
    if let Some(temperature) = args.temperature {
        config.temperature = Some(temperature);
    }
    if let Some(max_tokens) = args.max_tokens {
        config.max_tokens = Some(max_tokens);
    }
}

/// Wire the store, model table, transport, and offline responder into a
/// session.
pub fn build_session(config: &Config) -> Result<ChatSession, Box<dyn Error>> {
    let catalog = ModelCatalog::with_overrides(&config.models);
    let model = catalog
        .find(config.default_model())
        .cloned()
        .ok_or_else(|| ValidationError::UnknownModel(config.default_model().to_string()))?;

    let credential = match config.backend() {
        BackendKind::Native => resolve_from_system(config).map(|credential| credential.secret),
        BackendKind::Http | BackendKind::Simulated => None,
    };
    let transport = build_transport(config, credential)?;
    let fallback = FallbackResponder::new(catalog.fallback_tables());
    let gateway = CompletionGateway::new(transport, fallback, config.timeout());
    let options = CompletionOptions::new(config.temperature(), config.max_tokens())?;
    let store = ConversationStore::open(config.store_path());

    Ok(ChatSession::new(store, gateway, catalog, model, options))
}

#[cfg(test)]
mod tests;
