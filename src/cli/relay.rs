//! `nexus relay`: serve the HTTP relay until Ctrl-C.

use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::config::{BackendKind, Config, ConfigError};
use crate::core::credentials::resolve_from_system;
use crate::core::gateway::{build_transport, ChatTransport};
use crate::relay::{serve, RelayState};

/// The relay always talks to the provider directly, whatever backend the
/// local client is configured for.
pub fn upstream_transport(
    config: &Config,
    credential: Option<String>,
) -> Result<Option<Arc<dyn ChatTransport>>, ConfigError> {
    let mut upstream = config.clone();
    upstream.backend = Some(BackendKind::Native);
    build_transport(&upstream, credential)
}

pub async fn run_relay(config: &Config, host: &str, port: u16) -> Result<(), Box<dyn Error>> {
    let credential = resolve_from_system(config).map(|credential| credential.secret);
    let transport = upstream_transport(config, credential)?;
    if transport.is_none() {
        warn!(
            variable = config.api_key_env(),
            "no provider API key; chat requests will fail with 500"
        );
    }

    let listener = TcpListener::bind((host, port)).await?;
    eprintln!("🌐 Relay listening on http://{}", listener.local_addr()?);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal.cancel();
        }
    });

    serve(listener, Arc::new(RelayState::new(transport)), shutdown).await?;
    Ok(())
}
