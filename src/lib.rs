// shopwire/src/lib.rs
//
// Client/server pair speaking a length-prefixed framed protocol over a
// persistent TCP connection: text commands, JSON responses, and a
// chunked binary upload path for image search.

pub mod backends;
pub mod client;
pub mod command;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod session;

pub use backends::{Product, SearchBackend, VisionBackend};
pub use client::ShoppingClient;
pub use config::ServerConfig;
pub use errors::{AppError, AppResult};
pub use server::ShoppingServer;
pub use session::{Session, SessionStore};
