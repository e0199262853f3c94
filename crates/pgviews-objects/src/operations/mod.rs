//! Idempotent view operations against a live connection
//!
//! Creating or updating a view runs inside one transaction per view: either
//! the view ends up fully in its new state or it is left as it was.

mod materialized;
mod outcome;
mod view;

pub use materialized::*;
pub use outcome::*;
pub use view::*;

use pgviews_core::Transaction;

use crate::Result;

/// Commit on success, roll back on failure
async fn finish<T>(transaction: Box<dyn Transaction>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            transaction.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = transaction.rollback().await {
                tracing::warn!(error = %rollback_error, "failed to roll back view transaction");
            }
            Err(error)
        }
    }
}

/// Log label for the schema a statement lands in
fn schema_label(schema: Option<&str>) -> String {
    match schema {
        Some(schema) => format!("schema {}", schema),
        None => "default schema".to_string(),
    }
}
