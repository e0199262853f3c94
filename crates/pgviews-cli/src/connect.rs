//! Opening connections for the configured databases

use anyhow::{Context, Result};
use pgviews_driver_postgres::PostgresConnection;
use pgviews_settings::Settings;
use pgviews_sync::StaticRouter;
use std::sync::Arc;

/// Router over `aliases`, connecting to each of them
pub async fn router(settings: &Settings, aliases: &[&str]) -> Result<StaticRouter> {
    let mut router = StaticRouter::with_default_alias(&settings.default_database);
    for alias in aliases {
        let database = settings.database(alias)?;
        let connection = PostgresConnection::connect(&database.connection)
            .await
            .with_context(|| format!("Failed to connect to database {}", alias))?;
        tracing::debug!(
            alias,
            host = %database.connection.host,
            dbname = %database.connection.dbname,
            "connected"
        );

        router = match &database.namespaces {
            Some(namespaces) => {
                router.with_restricted_database(*alias, Arc::new(connection), namespaces.clone())
            }
            None => router.with_database(*alias, Arc::new(connection)),
        };
    }
    Ok(router)
}
