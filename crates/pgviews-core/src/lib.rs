//! pgviews core - connection abstractions shared by every pgviews crate
//!
//! This crate provides the fundamental traits and types the view
//! synchronisation engine is written against. It defines:
//!
//! - `Executor` - anything that can run a statement or a query
//! - `Connection` - a live database connection that can open transactions
//! - `Transaction` - a transactional scope with savepoint support
//! - Common types like `Value`, `Row`, `QueryResult`
//! - `PgViewsError` with SQLSTATE classification

mod connection;
mod error;
pub mod transaction;
mod types;

pub use connection::*;
pub use error::*;
pub use transaction::*;
pub use types::*;
