pub mod config;
pub mod conversation;
pub mod credentials;
pub mod export;
pub mod fallback;
pub mod gateway;
pub mod keyring;
pub mod message;
pub mod models;
pub mod session;
pub mod store;
