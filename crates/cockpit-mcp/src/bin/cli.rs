//! Efficiency Cockpit CLI
//!
//! Operator commands for the shared tracker database.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use cockpit_core::config::DATABASE_FILE_NAME;
use cockpit_core::value::field_map_to_json;
use cockpit_core::{EntityKind, ListFilter, SearchHit, SearchMode, SearchOptions, Store, StoreConfig};

/// Efficiency Cockpit - tracker database CLI
#[derive(Parser)]
#[command(name = "cockpit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the Efficiency Cockpit tracker database")]
#[command(long_about = "Inspect, search and maintain the database shared by the Efficiency Cockpit tracker app and its MCP gateway.\n\nThe tracker app owns the schema; this tool only reads records and maintains the full-text shadow indexes beside them.")]
struct Cli {
    /// Directory holding the tracker database (default: per-user data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show record and index counts per kind
    Stats,

    /// Search records across kinds
    Search {
        /// Search text
        query: String,
        /// Strategy: unified, ranked or substring
        #[arg(long, default_value = "unified")]
        mode: String,
        /// Restrict to a kind (repeatable)
        #[arg(long = "kind")]
        kinds: Vec<String>,
        /// Maximum number of results
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Rebuild every full-text shadow index from the primary tables
    Rebuild {
        /// Merge index segments afterwards
        #[arg(long)]
        optimize: bool,
    },

    /// Remove shadow index rows whose records no longer exist
    Reconcile,

    /// Print one record as JSON
    Get {
        /// Record kind (activity, contextSnapshot, decision, insight, aiInteraction, contentIndex)
        kind: String,
        /// Record id
        id: String,
        /// Dump every stored column instead of the mapped fields
        #[arg(long)]
        raw: bool,
    },

    /// Show time spent per app over the last hours
    Summary {
        /// Window length in hours, ending now
        #[arg(long, default_value = "24")]
        hours: i64,
    },

    /// List the newest records of one kind
    List {
        /// Record kind
        kind: String,
        /// Maximum number of records
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut store = open_store(cli.data_dir)?;

    match cli.command {
        Commands::Stats => run_stats(&mut store),
        Commands::Search {
            query,
            mode,
            kinds,
            limit,
        } => run_search(&mut store, &query, &mode, &kinds, limit),
        Commands::Rebuild { optimize } => run_rebuild(&mut store, optimize),
        Commands::Reconcile => run_reconcile(&mut store),
        Commands::Get { kind, id, raw } => run_get(&mut store, &kind, &id, raw),
        Commands::Summary { hours } => run_summary(&mut store, hours),
        Commands::List { kind, limit } => run_list(&mut store, &kind, limit),
    }
}

fn open_store(data_dir: Option<PathBuf>) -> anyhow::Result<Store> {
    let config = match data_dir {
        Some(dir) => StoreConfig::new(dir.join(DATABASE_FILE_NAME)),
        None => StoreConfig::default_location()?,
    };
    Store::open(&config).with_context(|| format!("opening {}", config.path.display()))
}

fn parse_kind(name: &str) -> anyhow::Result<EntityKind> {
    name.parse::<EntityKind>().map_err(anyhow::Error::msg)
}

/// Run stats command
fn run_stats(store: &mut Store) -> anyhow::Result<()> {
    println!("{}", "=== Efficiency Cockpit Database ===".cyan().bold());
    println!();

    if let Some(path) = store.database().path() {
        println!("{}: {}", "Path".white().bold(), path.display());
    }

    let report = store.schema_report();
    let complete = report.as_ref().is_some_and(|r| r.is_complete());
    println!(
        "{}: {}",
        "Schema".white().bold(),
        if complete { "complete".green() } else { "incomplete".yellow() }
    );
    println!();

    let shadow = store.shadow_counts();
    println!(
        "  {:16} {:>6} {:>10} {:>10}",
        "Kind".bold(),
        "Tag".bold(),
        "Records".bold(),
        "Indexed".bold()
    );
    for kind in EntityKind::ALL {
        let tag = store
            .entity_type(kind)
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let records = store.count(kind);
        let indexed = shadow
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, count)| count.to_string())
            .unwrap_or_else(|| "-".to_string());

        let drift = kind.is_searchable() && indexed != records.to_string();
        let indexed = if drift { indexed.yellow() } else { indexed.normal() };
        println!("  {:16} {:>6} {:>10} {:>10}", kind.as_str(), tag, records, indexed);
    }

    if let Some(report) = report {
        let missing = report.missing_tables();
        if !missing.is_empty() {
            println!();
            println!("{}", "Warnings:".yellow().bold());
            for kind in missing {
                println!("  {} table {} is missing", "!".yellow(), kind.spec().table);
            }
        }
    }

    Ok(())
}

fn print_hit(index: usize, hit: &SearchHit) {
    let when = hit.timestamp.as_deref().unwrap_or("-");
    let score = hit
        .score
        .map(|s| format!(" score={:.3}", s))
        .unwrap_or_default();
    println!(
        "{:>3}. {} {} {}{}",
        index + 1,
        hit.kind.as_str().cyan(),
        hit.id.dimmed(),
        when,
        score.dimmed()
    );

    let summary = hit.snippet.clone().or_else(|| {
        hit.kind
            .spec()
            .searchable_columns()
            .find_map(|c| hit.record.get(c.field).and_then(|v| v.as_str()).map(str::to_string))
    });
    if let Some(summary) = summary {
        println!("     {}", summary);
    }
}

/// Run search command
fn run_search(
    store: &mut Store,
    query: &str,
    mode: &str,
    kinds: &[String],
    limit: usize,
) -> anyhow::Result<()> {
    let mode: SearchMode = mode.parse().map_err(anyhow::Error::msg)?;
    let kinds = kinds
        .iter()
        .map(|k| parse_kind(k))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let options = SearchOptions::new().kinds(kinds).limit(limit.max(1));

    let hits = store.search(query, mode, &options);
    if hits.is_empty() {
        println!("{}", "No matching records.".dimmed());
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        print_hit(i, hit);
    }
    Ok(())
}

/// Run rebuild command
fn run_rebuild(store: &mut Store, optimize: bool) -> anyhow::Result<()> {
    let rebuilt = store.rebuild();
    let total = EntityKind::SEARCHABLE.len();
    let status = format!("{}/{} shadow tables rebuilt", rebuilt, total);
    if rebuilt == total {
        println!("{}", status.green());
    } else {
        println!("{}", status.yellow());
    }

    if optimize {
        println!("{} tables optimized", store.optimize());
    }
    for (kind, count) in store.shadow_counts() {
        println!("  {:16} {:>8}", kind.as_str(), count);
    }
    Ok(())
}

/// Run reconcile command
fn run_reconcile(store: &mut Store) -> anyhow::Result<()> {
    let removed = store.reconcile();
    if removed == 0 {
        println!("{}", "Shadow indexes are consistent.".green());
    } else {
        println!("Removed {} orphaned shadow rows", removed.to_string().yellow());
    }
    Ok(())
}

/// Run get command
fn run_get(store: &mut Store, kind: &str, id: &str, raw: bool) -> anyhow::Result<()> {
    let kind = parse_kind(kind)?;
    let record = if raw { store.get_raw(kind, id) } else { store.get(kind, id) };
    match record {
        Some(fields) => {
            println!("{}", serde_json::to_string_pretty(&field_map_to_json(&fields))?);
            Ok(())
        }
        None => anyhow::bail!("no {} record with id {}", kind, id),
    }
}

/// Run summary command
fn run_summary(store: &mut Store, hours: i64) -> anyhow::Result<()> {
    let until = chrono::Utc::now();
    let since = until - chrono::Duration::hours(hours.max(1));
    let summary = store
        .activity_summary(since, until)
        .context("activity data is unavailable")?;

    println!("{}", format!("=== Activity, last {}h ===", hours.max(1)).cyan().bold());
    println!(
        "{} activities, {} idle, {:.1} active minutes",
        summary.total_activities,
        summary.idle_activities,
        summary.active_duration / 60.0
    );
    if let Some(app) = &summary.most_active_app {
        println!("{}: {}", "Most active".white().bold(), app.green());
    }
    for usage in &summary.apps {
        println!(
            "  {:24} {:>6} {:>10.1} min",
            usage.app_name,
            usage.activities,
            usage.active_duration / 60.0
        );
    }
    Ok(())
}

/// Run list command
fn run_list(store: &mut Store, kind: &str, limit: usize) -> anyhow::Result<()> {
    let kind = parse_kind(kind)?;
    let records = store.list(kind, &ListFilter::new(), limit.max(1));
    let json: Vec<serde_json::Value> = records.iter().map(field_map_to_json).collect();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
