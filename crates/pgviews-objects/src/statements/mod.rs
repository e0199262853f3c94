//! PostgreSQL statement builders
//!
//! Everything here is pure string building; nothing touches a connection.

mod builder;
mod where_clause;

#[cfg(test)]
mod tests;

pub use builder::*;
pub use where_clause::*;
