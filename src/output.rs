//! JSON response types and formatting for CLI output.

use serde::Serialize;

use memoria::{HealthReport, MemoryRecord, MemorySearchResult};

/// Response for successful memory addition.
#[derive(Serialize)]
pub struct AddResponse {
    pub status: String,
    pub id: String,
}

/// Response for search results.
#[derive(Serialize)]
pub struct SearchResponse<'a> {
    pub results: &'a [MemorySearchResult],
}

/// Response for retrieving a specific memory.
#[derive(Serialize)]
pub struct GetResponse<'a> {
    #[serde(flatten)]
    pub memory: &'a MemoryRecord,
}

/// Response for the health probe.
#[derive(Serialize)]
pub struct HealthResponse<'a> {
    #[serde(flatten)]
    pub report: &'a HealthReport,
}

/// Response for errors.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Print a value as formatted JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}
