//! Declared views and the registry that holds them

mod definition;
mod registry;


pub use definition::*;
pub use registry::*;
