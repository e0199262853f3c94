//! pgviews objects - declared views and the DDL that keeps them in sync
//!
//! This crate provides:
//! - `ViewDefinition` and its builder, the declared shape of a view
//! - `ViewRegistry`, the ordered set of declared views with deferred
//!   field projection
//! - PostgreSQL statement builders and catalog lookups
//! - The idempotent view operations (`create_or_update_view`,
//!   `create_or_update_materialized_view`, `reconcile_indexes`, `drop_view`,
//!   `refresh_materialized_view`) and their `SyncOutcome`

pub mod catalog;
mod error;
pub mod operations;
pub mod statements;
pub mod view;

pub use error::*;
pub use operations::*;
pub use view::*;
