//! Luxury Jewelry CLI - catalog management tools.
//!
//! # Usage
//!
//! ```bash
//! # Validate a seed file and load it into an in-memory catalog
//! lj-cli seed --file crates/cli/products.yaml --dry-run
//!
//! # Insert the products into the hosted catalog
//! lj-cli seed --file crates/cli/products.yaml
//!
//! # List the hosted catalog, newest first
//! lj-cli catalog
//! ```
//!
//! # Environment Variables
//!
//! - `SUPABASE_URL` - project URL
//! - `SUPABASE_SERVICE_ROLE_KEY` - key with write access, used by `seed`
//! - `SUPABASE_ANON_KEY` - public key, used by `catalog`

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lj-cli")]
#[command(author, version, about = "Luxury Jewelry CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert products from a YAML file
    Seed {
        /// Path to the YAML seed file
        #[arg(short, long, default_value = "crates/cli/products.yaml")]
        file: String,

        /// Validate and load into an in-memory catalog without touching the service
        #[arg(long)]
        dry_run: bool,
    },
    /// List the catalog, newest first
    Catalog,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Seed { file, dry_run } => commands::seed::products(&file, dry_run).await?,
        Commands::Catalog => commands::catalog::list().await?,
    }
    Ok(())
}
