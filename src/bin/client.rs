// shopwire/src/bin/client.rs
//
// Interactive line-driven client for the shopwire server.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use shopwire::client::ShoppingClient;
use shopwire::errors::AppResult;

/// Shopping protocol client.
#[derive(Parser, Debug)]
#[command(name = "shopwire-client", version, about)]
struct Args {
    /// Server address to connect to.
    #[arg(long, env = "SHOPWIRE_ADDR", default_value = shopwire::config::DEFAULT_ADDR)]
    server: String,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args = Args::parse();
    let mut client = ShoppingClient::connect(args.server.as_str()).await?;
    println!("Connected to {}", args.server);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"Username: ").await?;
    stdout.flush().await?;
    let username = lines.next_line().await?.unwrap_or_default();
    stdout.write_all(b"Password: ").await?;
    stdout.flush().await?;
    let password = lines.next_line().await?.unwrap_or_default();

    if !client.login(username.trim(), password.trim()).await? {
        println!("Login failed");
        client.close().await?;
        return Ok(());
    }
    println!("Logged in as {}", client.username().unwrap_or("?"));

    loop {
        println!("\nCommands: search <query>, image <path>, logout, exit");
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let line = line.trim();

        if line.eq_ignore_ascii_case("exit") {
            break;
        } else if line.eq_ignore_ascii_case("logout") {
            if client.logout().await? {
                println!("Logged out");
            }
            break;
        } else if let Some(query) = line.strip_prefix("search ") {
            match client.search_product(query).await {
                Ok(products) if products.is_empty() => println!("No products found"),
                Ok(products) => print_products(&products),
                Err(e) => println!("Search failed: {e}"),
            }
        } else if let Some(path) = line.strip_prefix("image ") {
            let image = match tokio::fs::read(path.trim()).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    println!("Cannot read {path}: {e}");
                    continue;
                }
            };
            match client.image_search(&image).await {
                Ok((products, terms)) => {
                    println!("Derived query: {terms}");
                    print_products(&products);
                }
                Err(e) => println!("Image search failed: {e}"),
            }
        } else if !line.is_empty() {
            println!("Unknown command");
        }
    }

    client.close().await?;
    println!("Disconnected");
    Ok(())
}

fn print_products(products: &[shopwire::Product]) {
    println!("Found {} products:", products.len());
    for (i, p) in products.iter().take(5).enumerate() {
        println!("\n{}. {}", i + 1, p.name);
        println!("   Price: {}", p.price);
        println!("   Source: {}", p.source);
        println!("   Rating: {} ({} reviews)", p.rating, p.reviews);
    }
}
