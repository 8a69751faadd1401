// shopwire/src/config.rs

use std::collections::HashMap;
use std::net::SocketAddr;

/// Default listen address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8765";

/// Default cap on a declared image upload, in bytes.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Server configuration. Credentials and sessions are process-lifetime
/// in-memory state with no persistence; both are wiped on restart.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub max_image_bytes: usize,
    /// username -> password, read-only once the server is running.
    pub credentials: HashMap<String, String>,
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            credentials: default_credentials(),
        }
    }

    pub fn with_max_image_bytes(mut self, max: usize) -> Self {
        self.max_image_bytes = max;
        self
    }

    pub fn with_credentials(mut self, credentials: HashMap<String, String>) -> Self {
        self.credentials = credentials;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        // DEFAULT_ADDR is a valid literal.
        Self::new(DEFAULT_ADDR.parse().unwrap())
    }
}

/// Built-in demo accounts.
pub fn default_credentials() -> HashMap<String, String> {
    let mut users = HashMap::new();
    users.insert("admin".to_string(), "admin123".to_string());
    users.insert("user".to_string(), "password".to_string());
    users.insert("demo".to_string(), "demo".to_string());
    users
}
