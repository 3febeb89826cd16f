//! Nexus is a line-oriented chatbot client for OpenAI-compatible completion
//! APIs, with a small HTTP relay that keeps the provider key server-side.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns conversations and their JSON store, the model table,
//!   the completion gateway with its offline fallback, the session
//!   controller, export, configuration, and credentials.
//! - [`commands`] implements the slash commands of the chat REPL.
//! - [`relay`] serves the stateless HTTP relay endpoint.
//! - [`api`] defines the chat payloads exchanged with providers and the relay.
//! - [`utils`] holds URL, header, and logging helpers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod relay;
pub mod utils;
