// shopwire/src/backends.rs
//
// Collaborator seams. The search and vision backends are external
// services from the core's point of view; handlers call them through
// these traits and pass any failure message through verbatim to the
// client. The built-in implementations below are deterministic
// stand-ins so the binaries work without external services.

use serde::{Deserialize, Serialize};

/// One product match as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub price: String,
    pub source: String,
    pub link: String,
    pub product_link: String,
    pub thumbnail: String,
    pub rating: f64,
    pub reviews: u64,
}

/// Turns a text query into a product list. Blocking from the caller's
/// perspective; latency is absorbed by the calling connection task.
pub trait SearchBackend: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<Product>, String>;
}

/// Turns image bytes into a shopping query.
pub trait VisionBackend: Send + Sync {
    fn analyze(&self, image: &[u8]) -> Result<String, String>;
}

/// Fixed in-memory catalog, filtered by query tokens.
pub struct CatalogSearch {
    catalog: Vec<Product>,
}

impl CatalogSearch {
    pub fn new() -> Self {
        let entries = [
            ("Wireless Bluetooth Headphones", "$79.99", "TechMart", 4.5, 1289),
            ("Smart Watch", "$199.99", "GadgetHub", 4.3, 864),
            ("USB-C Cable", "$12.99", "CablesPlus", 4.8, 5121),
            ("Laptop Stand", "$45.99", "DeskWorks", 4.6, 733),
            ("Wireless Mouse", "$29.99", "TechMart", 4.4, 2408),
        ];
        let catalog = entries
            .iter()
            .enumerate()
            .map(|(i, (name, price, source, rating, reviews))| {
                let slug = name.to_lowercase().replace(' ', "-");
                Product {
                    id: i as u32 + 1,
                    name: name.to_string(),
                    price: price.to_string(),
                    source: source.to_string(),
                    link: format!("https://shop.example/{slug}"),
                    product_link: format!("https://shop.example/p/{}", i + 1),
                    thumbnail: format!("https://shop.example/{slug}.jpg"),
                    rating: *rating,
                    reviews: *reviews,
                }
            })
            .collect();
        Self { catalog }
    }
}

impl Default for CatalogSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchBackend for CatalogSearch {
    fn search(&self, query: &str) -> Result<Vec<Product>, String> {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if tokens.is_empty() {
            return Err("Empty search query".to_string());
        }

        let matches: Vec<Product> = self
            .catalog
            .iter()
            .filter(|p| {
                let name = p.name.to_lowercase();
                tokens.iter().any(|t| name.contains(t.as_str()))
            })
            .cloned()
            .collect();
        Ok(matches)
    }
}

/// Derives a canned shopping query from the image's magic bytes. A
/// stand-in for the real vision service; rejects payloads that are not
/// a recognized image format.
pub struct KeywordVision;

impl VisionBackend for KeywordVision {
    fn analyze(&self, image: &[u8]) -> Result<String, String> {
        if image.is_empty() {
            return Err("No image provided".to_string());
        }
        if image.starts_with(&[0xff, 0xd8, 0xff]) {
            Ok("wireless bluetooth headphones".to_string())
        } else if image.starts_with(b"\x89PNG\r\n\x1a\n") {
            Ok("smart watch".to_string())
        } else if image.starts_with(b"GIF87a") || image.starts_with(b"GIF89a") {
            Ok("wireless mouse".to_string())
        } else {
            Err("Unrecognized image format".to_string())
        }
    }
}
