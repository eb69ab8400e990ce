// ============================================================================
// capsule - command line front end for the capsule machine
// ============================================================================
// Usage:
//   capsule draw [--count N]              Draw N capsules (100 coins each)
//   capsule sell <ID>                     Sell an owned item
//   capsule list [--rarity RARITY]        List owned items, rarest first
//   capsule collection                    Show collection progress
//   capsule bonus                         Claim today's bonus
//   capsule stats                         Show balance and inventory stats
//   capsule export --format json          Export full state as JSON
// ============================================================================

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use capsule_core::{
    BonusOutcome, CapsuleConfig, CapsuleError, CapsuleSession, LoadReport, LoadSource, Rarity,
};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Collectible capsule machine
#[derive(Parser)]
#[command(name = "capsule", version, about = "Draw, sell and collect capsule items")]
struct Cli {
    /// Path to the state database (default: ~/.capsule/capsule.redb)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Path to a legacy JSON save to migrate from on first run
    #[arg(long, global = true)]
    legacy_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw one or more capsules
    Draw {
        /// Number of draws; stops early when coins run out
        #[arg(long, default_value = "1")]
        count: u32,
    },

    /// Sell an owned item by id
    Sell {
        id: String,
    },

    /// List owned items with optional rarity filter
    List {
        /// Filter by rarity: common, rare, epic, legendary
        #[arg(long)]
        rarity: Option<String>,
    },

    /// Show which catalog slots are unlocked
    Collection,

    /// Claim the daily coin bonus
    Bonus,

    /// Show balance and inventory statistics
    Stats,

    /// Export balance, inventory and collection as JSON
    Export {
        /// Output format (currently only json is supported)
        #[arg(long, default_value = "json")]
        format: String,
    },
}

fn parse_rarity(s: &str) -> Result<Rarity> {
    Rarity::from_name(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown rarity '{}'. Valid values: common, rare, epic, legendary",
            s
        )
    })
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}…", s.chars().take(max - 1).collect::<String>())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("capsule_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = CapsuleConfig::from_env()?;
    if cli.db_path.is_some() {
        config.db_path = cli.db_path;
    }
    if cli.legacy_path.is_some() {
        config.legacy_path = cli.legacy_path;
    }

    let (session, report) = CapsuleSession::open_with_config(&config).await?;
    report_load(&report);

    let result = match cli.command {
        Commands::Draw { count } => cmd_draw(&session, count).await,
        Commands::Sell { id } => cmd_sell(&session, &id).await,
        Commands::List { rarity } => cmd_list(&session, rarity).await,
        Commands::Collection => cmd_collection(&session).await,
        Commands::Bonus => cmd_bonus(&session).await,
        Commands::Stats => cmd_stats(&session, &report).await,
        Commands::Export { format } => cmd_export(&session, &format).await,
    };

    // Pending debounced commits would die with the runtime
    if session.has_pending_commit().await {
        session.flush().await?;
    }
    result
}

fn report_load(report: &LoadReport) {
    if report.migrated {
        eprintln!("Migrated {} items from the legacy save.", report.state.inventory.len());
    }
    for warning in &report.warnings {
        warn!("{}", warning);
    }
}

async fn cmd_draw(session: &CapsuleSession, count: u32) -> Result<()> {
    for n in 1..=count {
        match session.draw().await {
            Ok(item) => {
                println!(
                    "[{}/{}] {:<10} {}  (magic {}, id {})",
                    n,
                    count,
                    item.rarity.display_name(),
                    item.name,
                    item.magic_value,
                    item.id
                );
            }
            Err(CapsuleError::InsufficientFunds { needed, available }) => {
                println!("Not enough coins: need {}, have {}.", needed, available);
                break;
            }
            Err(CapsuleError::Generation(reason)) => {
                println!("[{}/{}] Draw failed, no coins taken: {}", n, count, reason);
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("\nBalance: {} coins", session.balance().await);
    Ok(())
}

async fn cmd_sell(session: &CapsuleSession, id: &str) -> Result<()> {
    match session.sell(id).await {
        Some(credited) => println!(
            "Sold for {} coins. Balance: {} coins",
            credited,
            session.balance().await
        ),
        None => println!("No item with id {}.", id),
    }
    Ok(())
}

async fn cmd_list(session: &CapsuleSession, rarity_filter: Option<String>) -> Result<()> {
    let filter = rarity_filter.as_deref().map(parse_rarity).transpose()?;
    let items = session.sorted_view(filter).await;

    if items.is_empty() {
        println!("No items found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:<20}  {:>5}  {}",
        "ITEM ID", "RARITY", "ACQUIRED", "MAGIC", "NAME"
    );
    println!("{}", "-".repeat(100));

    for item in &items {
        println!(
            "{:<36}  {:<10}  {:<20}  {:>5}  {}",
            item.id,
            item.rarity.display_name(),
            format_timestamp(&item.acquired_at),
            item.magic_value,
            truncate(&item.name, 32)
        );
    }

    println!("\nTotal: {} items", items.len());
    Ok(())
}

async fn cmd_collection(session: &CapsuleSession) -> Result<()> {
    let inventory = session.inventory().await;
    let slots = session.catalog().slots();
    let unlocked = inventory.unlocked_slots(slots);
    let status = inventory.completion_status(slots);

    println!("=== Collection ===");
    for slot in slots {
        let mark = if unlocked.contains(slot.slot_id.as_str()) { "x" } else { " " };
        let kind = if slot.is_featured() { "*" } else { " " };
        println!("  [{}] {} {}", mark, kind, slot.display_name);
    }
    println!(
        "\nUnlocked {}/{} ({}%)",
        status.unlocked_count, status.total_count, status.percent
    );
    Ok(())
}

async fn cmd_bonus(session: &CapsuleSession) -> Result<()> {
    match session.claim_daily_bonus().await {
        BonusOutcome::Claimed { amount, balance } => {
            println!("Claimed {} coins. Balance: {} coins", amount, balance)
        }
        BonusOutcome::AlreadyClaimed => println!("Today's bonus was already claimed."),
    }
    Ok(())
}

async fn cmd_stats(session: &CapsuleSession, report: &LoadReport) -> Result<()> {
    let stats = session.inventory().await.stats();
    let status = session.completion_status().await;

    println!("=== Capsule Stats ===");
    let source = match report.source {
        LoadSource::Structured => "database",
        LoadSource::Legacy => "legacy save (migrated)",
        LoadSource::Fresh => "fresh start",
    };
    println!("Loaded from: {}", source);
    println!();
    println!("Balance:    {} coins", session.balance().await);
    println!("Items:      {} total", stats.total_items);
    for rarity in Rarity::ALL.iter().rev() {
        let count = stats.by_rarity.get(&rarity.to_string()).copied().unwrap_or(0);
        println!("  {:12} {}", rarity.display_name(), count);
    }
    println!("Sell value: {} coins", stats.total_sell_value);
    println!(
        "Collection: {}/{} ({}%)",
        status.unlocked_count, status.total_count, status.percent
    );

    Ok(())
}

async fn cmd_export(session: &CapsuleSession, format: &str) -> Result<()> {
    if format != "json" {
        anyhow::bail!("Unsupported format '{}'. Only 'json' is supported.", format);
    }

    let snapshot = session.snapshot().await;
    let inventory = session.inventory().await;

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "balance": snapshot.balance,
        "bonus_claimed_on": snapshot.bonus_claimed_on,
        "stats": inventory.stats(),
        "collection": session.completion_status().await,
        "inventory": snapshot.inventory,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}
