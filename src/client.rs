// shopwire/src/client.rs

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::backends::Product;
use crate::errors::{AppError, AppResult};
use crate::protocol;

/// Typed client over the framed protocol. One request, one response,
/// strictly sequential on a single persistent connection.
pub struct ShoppingClient {
    socket: TcpStream,
    session_id: Option<String>,
    username: Option<String>,
}

impl ShoppingClient {
    pub async fn connect<A: tokio::net::ToSocketAddrs>(addr: A) -> AppResult<Self> {
        let socket = TcpStream::connect(addr).await?;
        Ok(Self {
            socket,
            session_id: None,
            username: None,
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Send one command line and wait for the framed JSON response.
    pub async fn send_command(&mut self, line: &str) -> AppResult<Value> {
        debug!(command = line, "sending");
        protocol::send(&mut self.socket, line.as_bytes()).await?;
        self.read_response().await
    }

    async fn read_response(&mut self) -> AppResult<Value> {
        let frame = protocol::recv(&mut self.socket).await?.ok_or_else(|| {
            AppError::Connection(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ))
        })?;
        serde_json::from_slice(&frame)
            .map_err(|e| AppError::Decode(format!("response is not valid JSON: {e}")))
    }

    /// LOGIN. On success the session id and username are remembered
    /// for the privileged helpers.
    pub async fn login(&mut self, username: &str, password: &str) -> AppResult<bool> {
        let response = self.send_command(&format!("LOGIN {username} {password}")).await?;
        if response["status"] == "success" {
            self.session_id = response["session_id"].as_str().map(str::to_string);
            self.username = response["username"].as_str().map(str::to_string);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// SEARCH_PRODUCT with the current session.
    pub async fn search_product(&mut self, query: &str) -> AppResult<Vec<Product>> {
        let session_id = self
            .session_id
            .clone()
            .ok_or_else(|| AppError::Auth("Not logged in".into()))?;

        let response = self
            .send_command(&format!("SEARCH_PRODUCT {session_id} {query}"))
            .await?;
        if response["status"] != "success" {
            return Err(AppError::Rejected(message_of(&response)));
        }
        parse_products(&response)
    }

    /// IMAGE_SEARCH: initiating frame, framed declared size, then the
    /// raw image bytes in chunks, then one combined response. Returns
    /// the matched products and the query the vision backend derived.
    pub async fn image_search(&mut self, image: &[u8]) -> AppResult<(Vec<Product>, String)> {
        let session_id = self
            .session_id
            .clone()
            .ok_or_else(|| AppError::Auth("Not logged in".into()))?;

        protocol::send(&mut self.socket, format!("IMAGE_SEARCH {session_id}").as_bytes()).await?;
        protocol::send(&mut self.socket, image.len().to_string().as_bytes()).await?;
        for chunk in image.chunks(protocol::UPLOAD_CHUNK) {
            self.socket.write_all(chunk).await?;
        }
        self.socket.flush().await?;

        let response = self.read_response().await?;
        if response["status"] != "success" {
            return Err(AppError::Rejected(message_of(&response)));
        }
        let search_terms = response["search_terms"].as_str().unwrap_or_default().to_string();
        Ok((parse_products(&response)?, search_terms))
    }

    /// LOGOUT the current session, if any.
    pub async fn logout(&mut self) -> AppResult<bool> {
        let session_id = match self.session_id.clone() {
            Some(id) => id,
            None => return Ok(true),
        };

        let response = self.send_command(&format!("LOGOUT {session_id}")).await?;
        if response["status"] == "success" {
            self.session_id = None;
            self.username = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Send EXIT and drop the connection.
    pub async fn close(mut self) -> AppResult<()> {
        let _ = self.send_command("EXIT").await;
        self.socket.shutdown().await?;
        Ok(())
    }
}

fn message_of(response: &Value) -> String {
    response["message"]
        .as_str()
        .unwrap_or("Unknown error")
        .to_string()
}

fn parse_products(response: &Value) -> AppResult<Vec<Product>> {
    match response.get("products") {
        Some(products) => serde_json::from_value(products.clone())
            .map_err(|e| AppError::Decode(format!("malformed product list: {e}"))),
        None => Ok(Vec::new()),
    }
}
