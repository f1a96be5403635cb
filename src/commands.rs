//! Command handlers for memoria CLI.

use crate::output::*;
use memoria::server::ToolServer;
use memoria::{limit_from_i64, parse_id, Error, MemoryStore};
use std::process::ExitCode;

/// Commands supported by memoria CLI.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Store a new memory
    Add {
        /// Memory text content
        text: String,
    },
    /// Full-text search over stored memories
    Search {
        /// Search query (web-search syntax: "phrases", or, -exclusions)
        query: String,

        /// Maximum number of results (defaults to the configured value, 5)
        #[arg(short = 'k', long, allow_negative_numbers = true)]
        top_k: Option<i64>,
    },
    /// Show one memory by ID
    Get {
        /// Memory ID
        id: String,
    },
    /// Check database reachability
    Health,
    /// Serve newline-delimited JSON tool calls on stdin/stdout
    Serve,
}

/// Execute a CLI command.
pub async fn execute(
    command: &Commands,
    store: &MemoryStore,
    default_top_k: usize,
    json: bool,
) -> Result<ExitCode, Error> {
    match command {
        Commands::Add { text } => handle_add(store, text, json).await,
        Commands::Search { query, top_k } => {
            let top_k = match top_k {
                Some(n) => limit_from_i64(*n)?,
                None => default_top_k,
            };
            handle_search(store, query, top_k, json).await
        }
        Commands::Get { id } => handle_get(store, id, json).await,
        Commands::Health => handle_health(store, json).await,
        Commands::Serve => {
            ToolServer::new(store.clone(), default_top_k)
                .serve_stdio()
                .await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn handle_add(store: &MemoryStore, text: &str, json: bool) -> Result<ExitCode, Error> {
    let id = store.add(text).await?;
    if json {
        print_json(&AddResponse {
            status: "added".to_string(),
            id: id.to_string(),
        });
    } else {
        println!("Added memory: {}", id);
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_search(
    store: &MemoryStore,
    query: &str,
    top_k: usize,
    json: bool,
) -> Result<ExitCode, Error> {
    let results = store.search(query, top_k).await?;
    if json {
        print_json(&SearchResponse { results: &results });
    } else {
        for result in &results {
            println!(
                "{} [score: {:.3}]\n  {}\n",
                result.id, result.score, result.text
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_get(store: &MemoryStore, id: &str, json: bool) -> Result<ExitCode, Error> {
    let uuid = parse_id(id)?;
    let memory = store
        .get_by_id(uuid)
        .await?
        .ok_or_else(|| Error::NotFound(id.to_string()))?;
    if json {
        print_json(&GetResponse { memory: &memory });
    } else {
        println!("ID: {}", memory.id);
        println!("Text: {}", memory.text);
        println!("Created: {}", memory.created_at.to_rfc3339());
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_health(store: &MemoryStore, json: bool) -> Result<ExitCode, Error> {
    let report = store.health().await;
    if json {
        print_json(&HealthResponse { report: &report });
    } else {
        println!("status: {}", report.status);
        println!(
            "database: {}",
            if report.is_healthy() { "healthy" } else { "degraded" }
        );
    }
    if report.is_healthy() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}
