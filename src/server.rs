// shopwire/src/server.rs

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::command::{self, Parsed};
use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::handlers::{dispatch, error_response, Flow, ServerState};
use crate::protocol;

/// Accepts clients and serves each one on its own task until the peer
/// disconnects or sends EXIT. Unbounded fan-out; the accept loop never
/// blocks on per-client work.
pub struct ShoppingServer {
    listener: TcpListener,
    state: ServerState,
}

impl ShoppingServer {
    /// Bind with the built-in backends.
    pub async fn bind(config: &ServerConfig) -> AppResult<Self> {
        Self::bind_with_state(config.listen_addr, ServerState::new(config)).await
    }

    /// Bind with a prepared state (custom backends).
    pub async fn bind_with_state(addr: SocketAddr, state: ServerState) -> AppResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, state })
    }

    /// The actually bound address; useful when binding port 0.
    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Accept loop. One spawned task per connection; a connection's
    /// failure is logged and never takes the server down.
    pub async fn run(self) -> AppResult<()> {
        let addr = self.local_addr()?;
        info!(%addr, "shopping server listening");
        loop {
            let (socket, peer) = self.listener.accept().await?;
            info!(%peer, "client connected");
            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(socket, peer, state).await {
                    warn!(%peer, error = %e, "connection ended with error");
                }
                info!(%peer, "client disconnected");
            });
        }
    }
}

/// Per-connection command loop: read one frame, dispatch, write one
/// response frame, repeat. Exclusive owner of the socket; the only
/// state shared with other connections is inside `ServerState`.
async fn serve_connection(
    mut socket: TcpStream,
    peer: SocketAddr,
    state: ServerState,
) -> AppResult<()> {
    loop {
        let payload = match protocol::recv(&mut socket).await? {
            Some(payload) => payload,
            // Orderly closure by the peer.
            None => return Ok(()),
        };

        let parsed = match command::parse(&payload) {
            Ok(parsed) => parsed,
            Err(AppError::Decode(msg)) => {
                send_json(&mut socket, &error_response(&msg)).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        match parsed {
            Parsed::Empty => return Ok(()),
            Parsed::Unknown(word) => {
                info!(%peer, command = %word, "unknown command");
                send_json(&mut socket, &error_response(&format!("Unknown command: {word}"))).await?;
            }
            Parsed::Command(cmd) => {
                info!(%peer, command = cmd.keyword.as_str(), "command");
                let (response, flow) = dispatch(&state, &mut socket, &cmd, peer).await?;
                send_json(&mut socket, &response).await?;
                if flow == Flow::Close {
                    return Ok(());
                }
            }
        }
    }
}

/// Serialize a JSON value into one response frame. A response that
/// cannot fit the 4-digit frame format is replaced by a structured
/// error rather than truncated on the wire.
async fn send_json<S>(stream: &mut S, value: &serde_json::Value) -> AppResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let text = value.to_string();
    match protocol::send(stream, text.as_bytes()).await {
        Err(AppError::FrameTooLarge(_)) => {
            let fallback = error_response("Response too large for one frame");
            protocol::send(stream, fallback.to_string().as_bytes()).await
        }
        other => other,
    }
}
