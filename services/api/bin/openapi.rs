//! Writes the lesson API's OpenAPI document, e.g. for client generation.
//!
//! Usage: `openapi [PATH]` (defaults to `openapi.json`).

use tutor_api::router::ApiDoc;
use utoipa::OpenApi;

fn write_document(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let document = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(path, document)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    write_document(&path)?;
    println!("Wrote OpenAPI document to {path}");
    Ok(())
}
