// shopwire/src/handlers.rs
//
// Command handlers and the shared server state they operate on. Every
// handler returns the JSON value that becomes the response frame;
// application-level failures are structured `{"status":"error"}`
// responses, never crashes. Only transport-level faults propagate as
// errors to the connection loop.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::backends::{CatalogSearch, KeywordVision, SearchBackend, VisionBackend};
use crate::command::{Command, Keyword};
use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::protocol;
use crate::session::SessionStore;

/// What the connection loop does after sending a handler's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Shared server state: the session store plus read-only credentials,
/// limits and collaborator handles. Cheap to clone, one instance per
/// server, handed to every connection task.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<Shared>,
}

struct Shared {
    sessions: SessionStore,
    credentials: HashMap<String, String>,
    max_image_bytes: usize,
    search: Box<dyn SearchBackend>,
    vision: Box<dyn VisionBackend>,
}

impl ServerState {
    /// State with the built-in deterministic backends.
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_backends(config, Box::new(CatalogSearch::new()), Box::new(KeywordVision))
    }

    pub fn with_backends(
        config: &ServerConfig,
        search: Box<dyn SearchBackend>,
        vision: Box<dyn VisionBackend>,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                sessions: SessionStore::new(),
                credentials: config.credentials.clone(),
                max_image_bytes: config.max_image_bytes,
                search,
                vision,
            }),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub fn max_image_bytes(&self) -> usize {
        self.inner.max_image_bytes
    }

    fn password_matches(&self, username: &str, password: &str) -> bool {
        self.inner
            .credentials
            .get(username)
            .is_some_and(|stored| stored == password)
    }
}

/// Structured error response payload.
pub fn error_response(message: &str) -> Value {
    json!({ "status": "error", "message": message })
}

/// Route one parsed command to its handler. The returned value is the
/// response frame; `Flow` tells the connection loop whether to keep
/// serving. `Err` means the transport itself failed and there is
/// nothing sensible left to send.
pub async fn dispatch<S>(
    state: &ServerState,
    stream: &mut S,
    cmd: &Command,
    peer: SocketAddr,
) -> AppResult<(Value, Flow)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!(keyword = cmd.keyword.as_str(), args = cmd.args.len(), %peer, "dispatching");

    let result = match cmd.keyword {
        Keyword::Login => login(state, &cmd.args, peer),
        Keyword::SearchProduct => search_product(state, &cmd.args),
        Keyword::ImageSearch => image_search(state, stream, &cmd.args).await,
        Keyword::Logout => logout(state, &cmd.args),
        Keyword::GetSessions => get_sessions(state),
        Keyword::Exit => Ok(json!({ "status": "success", "message": "EXIT" })),
    };

    match result {
        Ok(value) => {
            let flow = match cmd.keyword {
                Keyword::Exit => Flow::Close,
                _ => Flow::Continue,
            };
            Ok((value, flow))
        }
        // An abandoned upload leaves raw bytes on the stream; report it,
        // then close rather than let the next frame decode garbage.
        Err(AppError::UploadSize(msg)) => Ok((error_response(&msg), Flow::Close)),
        Err(AppError::Collaborator(msg)) => Ok((error_response(&msg), Flow::Continue)),
        Err(AppError::Decode(msg)) => Ok((error_response(&msg), Flow::Continue)),
        Err(AppError::Auth(msg)) => Ok((error_response(&msg), Flow::Continue)),
        Err(fatal) => Err(fatal),
    }
}

/// LOGIN username password
fn login(state: &ServerState, args: &[String], peer: SocketAddr) -> AppResult<Value> {
    if args.len() < 2 {
        return Ok(error_response("Username and password required"));
    }
    let (username, password) = (&args[0], &args[1]);

    if !state.password_matches(username, password) {
        return Ok(error_response("Invalid username or password"));
    }

    let session_id = state.sessions().create(username, peer);
    Ok(json!({
        "status": "success",
        "session_id": session_id,
        "username": username,
        "message": format!("Welcome, {username}!"),
    }))
}

/// SEARCH_PRODUCT session_id query-words...
fn search_product(state: &ServerState, args: &[String]) -> AppResult<Value> {
    if args.len() < 2 {
        return Ok(error_response("Session ID and product query required"));
    }
    let session_id = &args[0];
    let query = args[1..].join(" ");

    if state.sessions().get(session_id).is_none() {
        return Ok(error_response("Invalid session. Please login again."));
    }

    let products = state
        .inner
        .search
        .search(&query)
        .map_err(AppError::Collaborator)?;

    if products.is_empty() {
        return Ok(json!({
            "status": "success",
            "products": [],
            "message": format!("No products found for '{query}'"),
        }));
    }

    Ok(json!({
        "status": "success",
        "products": products,
        "query": query,
        "count": products.len(),
    }))
}

/// IMAGE_SEARCH session_id, followed on the same connection by one
/// framed declared size and then that many raw bytes in chunks.
async fn image_search<S>(state: &ServerState, stream: &mut S, args: &[String]) -> AppResult<Value>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if args.is_empty() {
        return Ok(error_response("Session ID required"));
    }
    if state.sessions().get(&args[0]).is_none() {
        return Ok(error_response("Invalid session. Please login again."));
    }

    // Declared size arrives as its own frame of decimal text.
    let frame = match protocol::recv(stream).await? {
        Some(frame) => frame,
        None => {
            return Err(AppError::Connection(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "peer closed before declaring upload size",
            )))
        }
    };
    let text = String::from_utf8(frame)
        .map_err(|_| AppError::UploadSize("declared size is not valid UTF-8".into()))?;
    let declared: usize = text
        .trim()
        .parse()
        .map_err(|_| AppError::UploadSize(format!("invalid declared size {:?}", text.trim())))?;

    if declared > state.max_image_bytes() {
        return Err(AppError::UploadSize(format!(
            "declared size {declared} exceeds the {} byte limit",
            state.max_image_bytes()
        )));
    }

    // Raw bounded reads, no per-chunk prefixes. Short read aborts the
    // transfer before any collaborator sees the buffer.
    let image = protocol::recv_raw(stream, declared).await?;

    let search_terms = state
        .inner
        .vision
        .analyze(&image)
        .map_err(AppError::Collaborator)?;
    let products = state
        .inner
        .search
        .search(&search_terms)
        .map_err(AppError::Collaborator)?;

    Ok(json!({
        "status": "success",
        "products": products,
        "search_terms": search_terms,
        "count": products.len(),
    }))
}

/// LOGOUT session_id — unknown ids are reported, not faulted on.
fn logout(state: &ServerState, args: &[String]) -> AppResult<Value> {
    if args.is_empty() {
        return Ok(error_response("Session ID required"));
    }

    match state.sessions().delete(&args[0]) {
        Some(session) => Ok(json!({
            "status": "success",
            "message": format!("Goodbye, {}!", session.username),
        })),
        None => Ok(error_response("Invalid session")),
    }
}

/// GET_SESSIONS — administrative listing of active sessions.
fn get_sessions(state: &ServerState) -> AppResult<Value> {
    Ok(json!({
        "status": "success",
        "active_sessions": state.sessions().len(),
        "sessions": state.sessions().ids(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Product;
    use crate::command;
    use crate::command::Parsed;
    use std::sync::Mutex;
    use tokio::io::AsyncWriteExt;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    /// Search mock that records every query it is asked.
    struct RecordingSearch {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl SearchBackend for RecordingSearch {
        fn search(&self, query: &str) -> Result<Vec<Product>, String> {
            self.calls.lock().unwrap().push(query.to_string());
            Ok(vec![])
        }
    }

    /// Vision mock that records the exact buffer it received.
    struct RecordingVision {
        images: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl VisionBackend for RecordingVision {
        fn analyze(&self, image: &[u8]) -> Result<String, String> {
            self.images.lock().unwrap().push(image.to_vec());
            Ok("recorded query".to_string())
        }
    }

    struct Harness {
        state: ServerState,
        search_calls: Arc<Mutex<Vec<String>>>,
        vision_images: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    fn harness() -> Harness {
        let search_calls = Arc::new(Mutex::new(Vec::new()));
        let vision_images = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState::with_backends(
            &ServerConfig::default().with_max_image_bytes(64 * 1024),
            Box::new(RecordingSearch { calls: search_calls.clone() }),
            Box::new(RecordingVision { images: vision_images.clone() }),
        );
        Harness { state, search_calls, vision_images }
    }

    fn parse(line: &str) -> Command {
        match command::parse(line.as_bytes()).unwrap() {
            Parsed::Command(cmd) => cmd,
            other => panic!("expected a command, got {other:?}"),
        }
    }

    async fn run(h: &Harness, stream: &mut tokio::io::DuplexStream, line: &str) -> (Value, Flow) {
        dispatch(&h.state, stream, &parse(line), peer()).await.unwrap()
    }

    #[tokio::test]
    async fn login_creates_a_session() {
        let h = harness();
        let (mut server, _client) = tokio::io::duplex(1024);

        let (value, flow) = run(&h, &mut server, "LOGIN admin admin123").await;
        assert_eq!(value["status"], "success");
        assert_eq!(value["username"], "admin");
        assert_eq!(flow, Flow::Continue);

        let id = value["session_id"].as_str().unwrap();
        assert_eq!(h.state.sessions().get(id).unwrap().username, "admin");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials_and_bad_arity() {
        let h = harness();
        let (mut server, _client) = tokio::io::duplex(1024);

        let (value, _) = run(&h, &mut server, "LOGIN admin wrong").await;
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "Invalid username or password");

        let (value, _) = run(&h, &mut server, "LOGIN admin").await;
        assert_eq!(value["status"], "error");
        assert!(h.state.sessions().is_empty());
    }

    #[tokio::test]
    async fn search_requires_a_live_session() {
        let h = harness();
        let (mut server, _client) = tokio::io::duplex(1024);

        let (value, flow) = run(&h, &mut server, "SEARCH_PRODUCT bogus-id red shoes").await;
        assert_eq!(value["status"], "error");
        assert_eq!(flow, Flow::Continue);
        // The collaborator must never have been consulted.
        assert!(h.search_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_joins_query_words() {
        let h = harness();
        let (mut server, _client) = tokio::io::duplex(1024);
        let id = h.state.sessions().create("admin", peer());

        let (value, _) = run(&h, &mut server, &format!("SEARCH_PRODUCT {id} red running shoes")).await;
        assert_eq!(value["status"], "success");
        assert_eq!(h.search_calls.lock().unwrap().as_slice(), ["red running shoes"]);
    }

    #[tokio::test]
    async fn logout_destroys_the_session_and_tolerates_unknown_ids() {
        let h = harness();
        let (mut server, _client) = tokio::io::duplex(1024);
        let id = h.state.sessions().create("demo", peer());

        let (value, _) = run(&h, &mut server, &format!("LOGOUT {id}")).await;
        assert_eq!(value["status"], "success");
        assert!(h.state.sessions().get(&id).is_none());

        let (value, flow) = run(&h, &mut server, &format!("LOGOUT {id}")).await;
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "Invalid session");
        assert_eq!(flow, Flow::Continue);
    }

    #[tokio::test]
    async fn exit_acknowledges_and_closes() {
        let h = harness();
        let (mut server, _client) = tokio::io::duplex(1024);

        let (value, flow) = run(&h, &mut server, "EXIT").await;
        assert_eq!(value["status"], "success");
        assert_eq!(flow, Flow::Close);
    }

    #[tokio::test]
    async fn image_search_hands_the_exact_buffer_to_vision() {
        let h = harness();
        let (mut server, mut client) = tokio::io::duplex(64 * 1024);
        let id = h.state.sessions().create("admin", peer());

        let image: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let upload = {
            let image = image.clone();
            tokio::spawn(async move {
                protocol::send(&mut client, image.len().to_string().as_bytes())
                    .await
                    .unwrap();
                for chunk in image.chunks(protocol::UPLOAD_CHUNK) {
                    client.write_all(chunk).await.unwrap();
                }
                client
            })
        };

        let (value, flow) = run(&h, &mut server, &format!("IMAGE_SEARCH {id}")).await;
        upload.await.unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["search_terms"], "recorded query");
        assert_eq!(flow, Flow::Continue);

        let images = h.vision_images.lock().unwrap();
        assert_eq!(images.as_slice(), [image]);
        assert_eq!(h.search_calls.lock().unwrap().as_slice(), ["recorded query"]);
    }

    #[tokio::test]
    async fn image_search_rejects_oversized_declarations_and_closes() {
        let h = harness();
        let (mut server, mut client) = tokio::io::duplex(1024);
        let id = h.state.sessions().create("admin", peer());

        protocol::send(&mut client, b"999999999").await.unwrap();

        let (value, flow) = run(&h, &mut server, &format!("IMAGE_SEARCH {id}")).await;
        assert_eq!(value["status"], "error");
        assert_eq!(flow, Flow::Close);
        assert!(h.vision_images.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_search_short_transfer_aborts_before_vision() {
        let h = harness();
        let (mut server, mut client) = tokio::io::duplex(1024);
        let id = h.state.sessions().create("admin", peer());

        protocol::send(&mut client, b"500").await.unwrap();
        client.write_all(&[0u8; 120]).await.unwrap();
        drop(client);

        let (value, flow) = run(&h, &mut server, &format!("IMAGE_SEARCH {id}")).await;
        assert_eq!(value["status"], "error");
        assert_eq!(flow, Flow::Close);
        assert!(h.vision_images.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_search_requires_a_live_session() {
        let h = harness();
        let (mut server, _client) = tokio::io::duplex(1024);

        let (value, flow) = run(&h, &mut server, "IMAGE_SEARCH bogus-id").await;
        assert_eq!(value["status"], "error");
        assert_eq!(flow, Flow::Continue);
        assert!(h.vision_images.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_sessions_reports_active_ids() {
        let h = harness();
        let (mut server, _client) = tokio::io::duplex(1024);
        let id = h.state.sessions().create("user", peer());

        let (value, _) = run(&h, &mut server, "GET_SESSIONS").await;
        assert_eq!(value["status"], "success");
        assert_eq!(value["active_sessions"], 1);
        assert_eq!(value["sessions"][0], id.as_str());
    }
}
