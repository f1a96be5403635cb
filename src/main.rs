mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;
use memoria::{logging, Config, ConnectionPool, Error, MemoryStore};

use commands::Commands;
use output::{print_json, ErrorResponse};

/// memoria - A pooled memory store with full-text search
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            if cli.json {
                print_json(&ErrorResponse {
                    error: e.to_string(),
                });
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode, Error> {
    let config = Config::load()?;
    logging::init_logging(&config.log_level);

    let pool = ConnectionPool::new();
    pool.initialize(config.pool_config()?).await?;

    let store = MemoryStore::new(pool.clone());
    let result = match store.ensure_schema().await {
        Ok(()) => commands::execute(&cli.command, &store, config.default_top_k, cli.json).await,
        Err(e) => Err(e),
    };

    pool.close().await;
    result
}
