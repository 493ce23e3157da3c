use std::net::SocketAddr;

use anyhow::{Context, Result};
use futures::SinkExt;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::session;

const SPEEDTEST_PATH: &str = "/ws/speedtest";
const HEALTH_PATH: &str = "/ws/health";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Speedtest,
    Health,
}

fn route(path: &str) -> Option<Route> {
    // tolerate a trailing slash on either path
    match path.trim_end_matches('/') {
        SPEEDTEST_PATH => Some(Route::Speedtest),
        HEALTH_PATH => Some(Route::Health),
        _ => None,
    }
}

pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop: one detached task per connection. Accept and per-session
    /// errors are logged and never stop the server.
    pub async fn run(self) -> Result<()> {
        info!("listening on {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(socket).await {
                            debug!(%peer, "connection ended with error: {err}");
                        }
                    });
                }
                Err(err) => warn!("failed to accept connection: {err}"),
            }
        }
    }
}

async fn handle_connection(socket: TcpStream) -> Result<()> {
    let mut requested = None;
    let callback = |request: &Request, response: Response| match route(request.uri().path()) {
        Some(found) => {
            requested = Some(found);
            Ok(response)
        }
        None => {
            let mut not_found = ErrorResponse::new(None);
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Err(not_found)
        }
    };

    let socket = tokio_tungstenite::accept_hdr_async(socket, callback).await?;

    match requested {
        Some(Route::Speedtest) => session::run(socket).await,
        Some(Route::Health) => health(socket).await,
        // the callback rejected the handshake
        None => Ok(()),
    }
}

/// Liveness probe: say ok and hang up.
async fn health(mut socket: WebSocketStream<TcpStream>) -> Result<()> {
    socket
        .send(Message::Text(json!({"status": "ok"}).to_string()))
        .await?;
    socket.close(None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_paths_route() {
        assert_eq!(route("/ws/speedtest"), Some(Route::Speedtest));
        assert_eq!(route("/ws/speedtest/"), Some(Route::Speedtest));
        assert_eq!(route("/ws/health"), Some(Route::Health));
    }

    #[test]
    fn unknown_paths_do_not_route() {
        assert_eq!(route("/"), None);
        assert_eq!(route("/ws"), None);
        assert_eq!(route("/ws/speedtests"), None);
    }
}
