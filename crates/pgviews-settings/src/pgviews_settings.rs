//! pgviews settings - the `pgviews.toml` file and logging setup
//!
//! One TOML file names the databases views are synced to, the flags that
//! change how syncs behave, logging preferences, and optionally the views
//! themselves as `[[views]]` tables.

mod error;
pub mod logging;
mod paths;
mod settings;
mod views;

pub use error::*;
pub use paths::*;
pub use settings::*;
pub use views::*;
