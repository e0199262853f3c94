//! pgviews sync - bring a database in line with the declared views
//!
//! This crate provides:
//! - Dependency resolution over a `ViewRegistry` (`graph`)
//! - The round-based backlog that syncs or refreshes views once their
//!   dependencies are done (`ViewSyncer`, `ViewRefresher`)
//! - Connection routing and sync signals
//! - Refreshing a subset of views together with everything connected to it
//! - `PgViews`, the entry points behind the `sync`, `refresh` and `clear`
//!   commands, and the post-migrate barrier that triggers a sync

mod backlog;
mod barrier;
mod commands;
mod error;
pub mod graph;
mod refresh;
mod routing;
mod signals;

pub use backlog::*;
pub use barrier::*;
pub use commands::*;
pub use error::*;
pub use refresh::*;
pub use routing::*;
pub use signals::*;
