//! pgviews migrations - tracking which views exist between releases
//!
//! Plain and materialized views are recreated by a sync, so a migration only
//! needs to record that a view appeared or went away. This crate provides:
//! - `ViewState` and `ViewSnapshot`, the recorded shape of every declared view
//! - `diff`, which turns two snapshots into register/delete intents
//! - `ViewOperation`, the intents themselves, and `optimize`, which folds
//!   intents that cancel out

pub mod diff;
mod error;
pub mod operation;
pub mod optimizer;
mod state;

pub use diff::{ViewDiff, diff};
pub use error::*;
pub use operation::{OperationKind, Reduction, ViewOperation};
pub use optimizer::optimize;
pub use state::*;
