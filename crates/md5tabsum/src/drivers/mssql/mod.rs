//! Microsoft SQL Server driver.
//!
//! - [`MssqlDialect`]: SQL syntax strategy for MSSQL
//! - [`MssqlConnection`]: live session over Tiberius

mod connection;
mod dialect;

pub use connection::MssqlConnection;
pub use dialect::MssqlDialect;
