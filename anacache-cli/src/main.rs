//! anacache CLI
//!
//! Inspect, populate, and evict a SQLite-backed analysis result cache.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use anacache::{AnalysisCache, CacheConfig};
use anacache_core::constants::ENV_DB_PATH;
use anacache_core::types::{CacheEntry, CacheKey, CacheType, TargetRef};
use anacache_store::{SqliteConfig, SqliteStore};

/// anacache - Analysis Result Cache
#[derive(Parser)]
#[command(name = "anacache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the cache database
    #[arg(long, global = true, env = ENV_DB_PATH)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the latest entry for an exact key
    Get {
        /// Cache type (REPOSITORY or VULNERABILITY)
        cache_type: CacheType,
        /// Upstream host that was queried
        host: String,
        /// Target type, e.g. purl or cpe
        target_type: String,
        /// Analyzed target
        target: String,
    },

    /// List entries for a target across all hosts, newest first
    List {
        /// Cache type (REPOSITORY or VULNERABILITY)
        cache_type: CacheType,
        /// Target type, e.g. purl or cpe
        target_type: String,
        /// Analyzed target
        target: String,
    },

    /// Record a result for a key
    Put {
        /// Cache type (REPOSITORY or VULNERABILITY)
        cache_type: CacheType,
        /// Upstream host that was queried
        host: String,
        /// Target type, e.g. purl or cpe
        target_type: String,
        /// Analyzed target
        target: String,
        /// Result payload as JSON; omit to only bump the timestamp
        #[arg(short, long)]
        result: Option<String>,
        /// Occurrence time (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Evict entries older than a cutoff
    Evict {
        /// Remove entries last seen before this time (RFC 3339)
        #[arg(long, conflicts_with = "expired", required_unless_present = "expired")]
        older_than: Option<DateTime<Utc>>,
        /// Remove entries outside the validity period
        #[arg(long)]
        expired: bool,
    },

    /// Remove every entry
    Clear,

    /// Show cache statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "anacache=debug,info"
    } else {
        "anacache=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let sqlite_config = match cli.db {
        Some(path) => SqliteConfig::with_path(path),
        None => SqliteConfig::default(),
    };
    tracing::debug!(path = %sqlite_config.path.display(), "Using cache database");
    let store = SqliteStore::open(&sqlite_config).context("Failed to open cache database")?;
    let cache = AnalysisCache::with_config(store, CacheConfig::from_env())
        .context("Invalid cache configuration")?;

    match cli.command {
        Commands::Get { cache_type, host, target_type, target } => {
            cmd_get(&cache, &CacheKey::new(cache_type, host, target_type, target))
        }
        Commands::List { cache_type, target_type, target } => {
            cmd_list(&cache, &TargetRef::new(cache_type, target_type, target))
        }
        Commands::Put { cache_type, host, target_type, target, result, at } => cmd_put(
            &cache,
            &CacheKey::new(cache_type, host, target_type, target),
            result.as_deref(),
            at,
        ),
        Commands::Evict { older_than, expired } => cmd_evict(&cache, older_than, expired),
        Commands::Clear => cmd_clear(&cache),
        Commands::Stats => cmd_stats(&cache, &sqlite_config),
    }
}

type Cache = AnalysisCache<SqliteStore>;

/// Print one entry
fn print_entry(entry: &CacheEntry, now: DateTime<Utc>, validity: chrono::Duration) -> Result<()> {
    let status = if entry.is_current(now, validity) {
        "current".green()
    } else {
        "stale".yellow()
    };
    println!(
        "   {} {} {} ({})",
        "Host:".dimmed(),
        entry.target_host,
        format!("@ {}", entry.last_occurrence.to_rfc3339()).dimmed(),
        status
    );
    match &entry.result {
        Some(result) => println!("{}", serde_json::to_string_pretty(result)?),
        None => println!("   {}", "(no result payload)".dimmed()),
    }
    Ok(())
}

/// Show latest entry for a key
fn cmd_get(cache: &Cache, key: &CacheKey) -> Result<()> {
    println!("{} {}", "🔍 Looking up:".cyan().bold(), key);

    match cache.get_latest(key).context("Lookup failed")? {
        Some(entry) => print_entry(&entry, Utc::now(), cache.config().validity_period())?,
        None => println!("\n{}", "Not cached.".yellow()),
    }
    Ok(())
}

/// List entries for a target on every host
fn cmd_list(cache: &Cache, target: &TargetRef) -> Result<()> {
    println!("{} {}", "📋 Entries for:".cyan().bold(), target);

    let entries = cache.get_all(target).context("Lookup failed")?;
    if entries.is_empty() {
        println!("\n{}", "Not cached.".yellow());
        return Ok(());
    }

    let now = Utc::now();
    let validity = cache.config().validity_period();
    println!("   {} entr{}\n", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
    for entry in &entries {
        print_entry(entry, now, validity)?;
    }
    Ok(())
}

/// Record a result
fn cmd_put(
    cache: &Cache,
    key: &CacheKey,
    result: Option<&str>,
    at: Option<DateTime<Utc>>,
) -> Result<()> {
    let result: Option<Value> = result
        .map(serde_json::from_str)
        .transpose()
        .context("--result is not valid JSON")?;
    let at = at.unwrap_or_else(Utc::now);
    key.validate().context("Refusing to cache a blank target")?;

    cache.upsert(key, at, result).context("Upsert failed")?;

    println!("{} {}", "✅ Cached:".green().bold(), key);
    println!("   {} {}", "Last occurrence:".dimmed(), at.to_rfc3339());
    Ok(())
}

/// Evict by age
fn cmd_evict(cache: &Cache, older_than: Option<DateTime<Utc>>, expired: bool) -> Result<()> {
    let removed = match older_than {
        Some(threshold) if !expired => {
            println!("{} {}", "🧹 Evicting entries older than".cyan().bold(), threshold.to_rfc3339());
            cache.evict_older_than(threshold)
        }
        _ => {
            println!(
                "{} {}s",
                "🧹 Evicting entries outside validity period of".cyan().bold(),
                cache.config().validity_period_secs
            );
            cache.evict_expired(Utc::now())
        }
    }
    .context("Eviction failed")?;

    println!("   {} {}", "Removed:".green(), removed);
    Ok(())
}

/// Remove everything
fn cmd_clear(cache: &Cache) -> Result<()> {
    let removed = cache.evict_all().context("Clear failed")?;
    println!("{} {} entries", "🧹 Cleared".cyan().bold(), removed);
    Ok(())
}

/// Show statistics
fn cmd_stats(cache: &Cache, sqlite_config: &SqliteConfig) -> Result<()> {
    let stats = cache.stats().context("Failed to read statistics")?;

    println!("{}", "📊 Cache statistics".cyan().bold());
    println!("   {} {}", "Database:".dimmed(), sqlite_config.path.display());
    println!("   {} {}", "Entries:".dimmed(), stats.entries);
    println!("   {} {}s", "Validity period:".dimmed(), stats.validity_period_secs);
    println!("   {} {}", "Upsert lock shards:".dimmed(), stats.lock_shards);
    Ok(())
}
