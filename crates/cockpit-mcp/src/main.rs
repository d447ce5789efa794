//! Efficiency Cockpit MCP Gateway
//!
//! A Model Context Protocol server over stdio that lets AI assistants read
//! and write the Efficiency Cockpit tracker database:
//! - Substring, BM25-ranked and unified search across activity, context
//!   snapshots, decisions, insights and AI interactions
//! - Record insert / get / list / update for every kind
//! - Shadow index rebuild, reconcile and health statistics
//!
//! The tracker app owns the database; the gateway shares it in WAL mode.

mod protocol;
mod server;
mod tools;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use cockpit_core::config::DATABASE_FILE_NAME;
use cockpit_core::{Store, StoreConfig};

use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;

/// Parse command-line arguments and return the optional data directory path.
/// Returns `None` for the path if no `--data-dir` was specified.
/// Exits the process if `--help` or `--version` is requested.
fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut data_dir: Option<PathBuf> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("Efficiency Cockpit MCP Gateway v{}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Search and record access for the tracker database over the Model Context Protocol.");
                println!();
                println!("USAGE:");
                println!("    cockpit-mcp [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --data-dir <PATH>       Directory holding {}", DATABASE_FILE_NAME);
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG               Log level filter (e.g., debug, info, warn, error)");
                println!();
                println!("EXAMPLES:");
                println!("    cockpit-mcp");
                println!("    cockpit-mcp --data-dir /tmp/cockpit-scratch");
                println!("    RUST_LOG=debug cockpit-mcp");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("cockpit-mcp {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--data-dir" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --data-dir requires a path argument");
                    eprintln!("Usage: cockpit-mcp --data-dir <PATH>");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with("--data-dir=") => {
                let path = arg.strip_prefix("--data-dir=").unwrap_or("");
                if path.is_empty() {
                    eprintln!("error: --data-dir requires a path argument");
                    eprintln!("Usage: cockpit-mcp --data-dir <PATH>");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(path));
            }
            arg => {
                eprintln!("error: unknown argument '{}'", arg);
                eprintln!("Usage: cockpit-mcp [OPTIONS]");
                eprintln!("Try 'cockpit-mcp --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    data_dir
}

fn store_config(data_dir: Option<PathBuf>) -> cockpit_core::Result<StoreConfig> {
    match data_dir {
        Some(dir) => Ok(StoreConfig::new(dir.join(DATABASE_FILE_NAME))),
        None => StoreConfig::default_location(),
    }
}

#[tokio::main]
async fn main() {
    // Parse CLI arguments first (before logging init, so --help/--version work cleanly)
    let data_dir = parse_args();

    // Initialize logging to stderr (stdout is for JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("Efficiency Cockpit MCP Gateway v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match store_config(data_dir) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to resolve database location: {}", e);
            std::process::exit(1);
        }
    };

    let mut store = match Store::open(&config) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open tracker database: {}", e);
            std::process::exit(1);
        }
    };

    match store.schema_report() {
        Some(report) if report.is_complete() => info!("Tracker schema verified"),
        Some(report) => {
            for kind in report.missing_tables() {
                warn!(kind = %kind, "Tracker table missing; records of this kind are unavailable until the tracker app creates it");
            }
        }
        None => warn!("Could not validate the tracker schema"),
    }

    // Shadow tables may lag rows the tracker app wrote directly
    let rebuilt = store.rebuild();
    info!(kinds = rebuilt, "Shadow indexes rebuilt");

    let server = McpServer::new(Arc::new(Mutex::new(store)));
    let transport = StdioTransport::new();

    info!("Starting MCP server on stdio...");

    if let Err(e) = transport.run(server).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Efficiency Cockpit MCP Gateway shutting down");
}
