//! `pgviews` - keep PostgreSQL views in line with their declarations

mod commands;
mod connect;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pgviews_settings::{Settings, logging};
use std::path::PathBuf;

/// Create, update, refresh and drop declared PostgreSQL views
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file, defaults to <config dir>/pgviews/pgviews.toml
    #[arg(short, long, env = "PGVIEWS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update every declared view
    Sync(SyncArgs),
    /// Refresh materialized views
    Refresh(RefreshArgs),
    /// Drop every declared view
    Clear(DatabaseArg),
    /// Record removed or changed views, drop them, then sync
    Migrate(MigrateArgs),
}

#[derive(Args, Debug)]
struct DatabaseArg {
    /// Database alias, defaults to `default_database` from the settings
    #[arg(long)]
    database: Option<String>,
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Leave existing plain views untouched
    #[arg(long)]
    no_update: bool,

    /// Drop and recreate plain views whose new definition is incompatible,
    /// together with the views depending on them
    #[arg(long)]
    force: bool,

    /// Only recreate materialized views whose definition changed
    #[arg(
        short = 'E',
        long = "enable-materialized-views-check-sql-changed",
        conflicts_with = "disable_check_sql_changed"
    )]
    enable_check_sql_changed: bool,

    /// Always recreate materialized views
    #[arg(short = 'D', long = "disable-materialized-views-check-sql-changed")]
    disable_check_sql_changed: bool,

    #[command(flatten)]
    database: DatabaseArg,
}

impl SyncArgs {
    /// Explicit flags win over the settings file
    fn check_sql_changed(&self, settings: &Settings) -> bool {
        if self.enable_check_sql_changed {
            true
        } else if self.disable_check_sql_changed {
            false
        } else {
            settings.materialized_views_check_sql_changed
        }
    }
}

#[derive(Args, Debug)]
struct RefreshArgs {
    /// Use REFRESH MATERIALIZED VIEW CONCURRENTLY where a concurrent index is declared
    #[arg(short = 'C', long)]
    concurrently: bool,

    /// Fail instead of refreshing normally when a view has no concurrent index
    #[arg(long)]
    strict: bool,

    /// Only these views (`namespace.name`) and the views connected to them
    views: Vec<String>,

    #[command(flatten)]
    database: DatabaseArg,
}

#[derive(Args, Debug)]
struct MigrateArgs {
    /// Snapshot of the views recorded by the previous migration
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the operations without applying them
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    database: DatabaseArg,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = commands::load_settings(cli.config.as_deref())?;
    let _log_guard = logging::init(&settings.logging.to_config())?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "pgviews starting");

    match cli.command {
        Command::Sync(args) => commands::sync(&settings, &args).await,
        Command::Refresh(args) => commands::refresh(&settings, &args).await,
        Command::Clear(args) => commands::clear(&settings, &args).await,
        Command::Migrate(args) => commands::migrate(&settings, &args).await,
    }
}
