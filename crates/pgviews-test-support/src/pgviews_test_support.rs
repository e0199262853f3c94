//! Test utilities for pgviews
//!
//! `FakeDatabase` is an in-memory stand-in for the parts of a PostgreSQL
//! server the view operations touch: tables, views, materialized views,
//! their indexes, the catalog relations used to look them up, transactions
//! and savepoints. It understands exactly the statement shapes pgviews
//! generates and rejects everything else with a syntax error, which keeps
//! tests honest about what SQL is being sent.

mod catalog;
mod connection;
mod sql;

pub use catalog::{FakeDatabase, Refresh};
pub use connection::{FakeConnection, FakeTransaction};

/// Route `tracing` output to the test harness, once per process.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
