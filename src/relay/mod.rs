//! Relay endpoint
//!
//! A stateless HTTP front for the completion transport. The server holds the
//! provider key; callers send plain JSON and never supply credentials.

pub mod handler;
pub mod http;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use handler::RelayState;
use http::{read_request, write_response, HttpError, HttpResponse};

use crate::api::RelayReply;

/// Accept connections until `shutdown` fires. Each connection carries one
/// request and is served on its own task.
pub async fn serve(
    listener: TcpListener,
    state: Arc<RelayState>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, configured = state.is_configured(), "relay listening");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, peer, &state).await {
                            warn!(peer = %peer, error = %err, "relay connection failed");
                        }
                    });
                }
                Err(err) => {
                    warn!(error = %err, "TCP accept error");
                }
            }
        }
    }

    info!("relay stopped");
    Ok(())
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: &RelayState,
) -> Result<(), HttpError> {
    let read = tokio::time::timeout(state.read_timeout(), read_request(&mut stream)).await;
    let Ok(read) = read else {
        debug!(peer = %peer, "relay client too slow; closing");
        let response = HttpResponse::json(408, &RelayReply::error("Request timed out"));
        write_response(&mut stream, &response).await?;
        return Ok(());
    };
    let response = match read {
        Ok(request) => {
            debug!(peer = %peer, method = %request.method, path = %request.path, "relay request");
            handler::handle(state, &request).await
        }
        Err(HttpError::TooLarge) => {
            HttpResponse::json(413, &RelayReply::error("Request too large"))
        }
        Err(HttpError::Malformed(detail)) => HttpResponse::json(400, &RelayReply::error(detail)),
        Err(err) => return Err(err),
    };
    write_response(&mut stream, &response).await?;
    Ok(())
}
