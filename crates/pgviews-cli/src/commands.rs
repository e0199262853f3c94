//! Subcommand implementations

use anyhow::{Context, Result};
use pgviews_migrations::{ViewSnapshot, diff, optimize};
use pgviews_settings::{Settings, snapshot_file};
use pgviews_sync::{AutoSync, MigrateBarrier, PgViews, RefreshOptions, SyncOptions};
use std::path::Path;
use std::sync::Arc;

use crate::{DatabaseArg, MigrateArgs, RefreshArgs, SyncArgs, connect};

pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = Settings::load_from(path).context("Failed to load settings")?;
    Ok(settings)
}

impl DatabaseArg {
    fn alias<'a>(&'a self, settings: &'a Settings) -> &'a str {
        self.database
            .as_deref()
            .unwrap_or(&settings.default_database)
    }
}

async fn engine(settings: &Settings, aliases: &[&str]) -> Result<PgViews> {
    let registry = settings.registry().context("Invalid view declarations")?;
    let router = connect::router(settings, aliases).await?;
    Ok(PgViews::new(registry, Arc::new(router)))
}

fn all_aliases(settings: &Settings) -> Vec<&str> {
    settings.databases.keys().map(String::as_str).collect()
}

pub async fn sync(settings: &Settings, args: &SyncArgs) -> Result<()> {
    let using = args.database.alias(settings);
    let pgviews = engine(settings, &[using]).await?;
    let options = SyncOptions {
        force: args.force,
        update: !args.no_update,
        check_sql_changed: args.check_sql_changed(settings),
    };

    let report = pgviews
        .sync_all(using, options)
        .await
        .with_context(|| format!("Failed to sync views on {}", using))?;
    tracing::info!(
        using,
        synced = report.finished.len(),
        changed = report.changed(),
        "sync finished"
    );
    Ok(())
}

pub async fn refresh(settings: &Settings, args: &RefreshArgs) -> Result<()> {
    let using = args.database.alias(settings);

    if args.views.is_empty() {
        let pgviews = engine(settings, &[using]).await?;
        let options = RefreshOptions {
            concurrently: args.concurrently,
            strict: args.strict,
        };
        pgviews
            .refresh_all(using, options)
            .await
            .with_context(|| format!("Failed to refresh views on {}", using))?;
        return Ok(());
    }

    // Writes may be routed to any configured database
    let pgviews = engine(settings, &all_aliases(settings)).await?;
    let labels: Vec<&str> = args.views.iter().map(String::as_str).collect();
    let count = pgviews
        .refresh_views(&labels, args.concurrently, args.strict)
        .await
        .context("Failed to refresh views")?;
    tracing::info!(count, "refreshed materialized views");
    Ok(())
}

pub async fn clear(settings: &Settings, args: &DatabaseArg) -> Result<()> {
    let using = args.alias(settings);
    let pgviews = engine(settings, &[using]).await?;

    let dropped = pgviews
        .clear_all(using)
        .await
        .with_context(|| format!("Failed to clear views on {}", using))?;
    tracing::info!(using, dropped = dropped.len(), "cleared views");
    Ok(())
}

pub async fn migrate(settings: &Settings, args: &MigrateArgs) -> Result<()> {
    let using = args.database.alias(settings);
    let snapshot_path = match &args.snapshot {
        Some(path) => path.clone(),
        None => snapshot_file()?,
    };

    let registry = settings.registry().context("Invalid view declarations")?;
    let previous = ViewSnapshot::load(&snapshot_path)
        .with_context(|| format!("Failed to read snapshot {}", snapshot_path.display()))?;
    let current = ViewSnapshot::from_registry(&registry);

    let changes = diff(&previous, &current);
    let operations = optimize(&changes.operations().cloned().collect::<Vec<_>>());
    for operation in &operations {
        println!("  - {}", operation.describe());
    }
    if operations.is_empty() {
        println!("No view changes detected");
    }
    if args.dry_run {
        return Ok(());
    }

    let router = connect::router(settings, &[using]).await?;
    for operation in &operations {
        operation
            .database_forwards(&router, using)
            .await
            .with_context(|| format!("Failed to apply: {}", operation.describe()))?;
    }
    current
        .save(&snapshot_path)
        .with_context(|| format!("Failed to write snapshot {}", snapshot_path.display()))?;

    let pgviews = Arc::new(PgViews::new(registry, Arc::new(router)));
    let barrier = MigrateBarrier::new(1);
    AutoSync::new(
        settings.materialized_views_check_sql_changed,
        settings.materialized_views_disable_sync_on_migrate,
    )
    .install(&barrier, pgviews);
    barrier
        .group_migrated(using)
        .await
        .with_context(|| format!("Failed to sync views after migrating {}", using))?;
    Ok(())
}
