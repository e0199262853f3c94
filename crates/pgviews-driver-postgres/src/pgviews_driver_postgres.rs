//! PostgreSQL driver for pgviews

mod config;
mod connection;
mod tls;

pub use config::{PostgresConfig, SslMode};
pub use connection::{PostgresConnection, PostgresTransaction};
pub use tls::{PostgresTlsConnector, TlsError};
