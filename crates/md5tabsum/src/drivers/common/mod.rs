//! Common utilities shared across database drivers.
//!
//! - [`tls`]: TLS configuration for PostgreSQL connections
//! - `odbc`: blocking ODBC connection run on the tokio blocking pool (feature `odbc`)

#[cfg(feature = "odbc")]
mod odbc;
pub mod tls;

#[cfg(feature = "odbc")]
pub use odbc::OdbcConnection;
pub use tls::{SslMode, TlsBuilder};

/// Wrap a value for an ODBC connection string, escaping closing braces.
pub fn odbc_value(value: &str) -> String {
    format!("{{{}}}", value.replace('}', "}}"))
}
