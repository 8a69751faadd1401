// shopwire/src/main.rs

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shopwire::config::{ServerConfig, DEFAULT_MAX_IMAGE_BYTES};
use shopwire::errors::AppResult;
use shopwire::server::ShoppingServer;

/// Shopping protocol server.
#[derive(Parser, Debug)]
#[command(name = "shopwire", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "SHOPWIRE_ADDR", default_value = shopwire::config::DEFAULT_ADDR)]
    listen: std::net::SocketAddr,

    /// Maximum accepted image upload, in bytes.
    #[arg(long, env = "SHOPWIRE_MAX_IMAGE_BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    max_image_bytes: usize,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = ServerConfig::new(args.listen).with_max_image_bytes(args.max_image_bytes);

    let server = ShoppingServer::bind(&config).await?;
    server.run().await
}
