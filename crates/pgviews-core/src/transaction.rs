//! Transaction-related types and traits
//!
//! This module provides savepoint support on top of the base `Transaction`
//! trait defined in the connection module.

mod savepoint;

pub use savepoint::*;
