//! Oracle driver.
//!
//! - [`OracleDialect`]: SQL syntax strategy for Oracle
//! - [`connection_string`]: ODBC connection string for an instance
//!
//! Live sessions need the `odbc` feature and an Oracle ODBC driver (Instant Client).

mod dialect;

pub use dialect::OracleDialect;

use crate::config::InstanceConfig;
use crate::drivers::common::odbc_value;

/// Driver name used when the instance sets no `odbc_driver`.
pub const DEFAULT_ODBC_DRIVER: &str = "Oracle 21 ODBC driver";

/// ODBC connection string for `instance`, using an EZConnect `host:port/service` DBQ.
pub fn connection_string(instance: &InstanceConfig, password: &str) -> String {
    format!(
        "DRIVER={};DBQ={}:{}/{};UID={};PWD={};",
        odbc_value(instance.odbc_driver.as_deref().unwrap_or(DEFAULT_ODBC_DRIVER)),
        instance.host,
        instance.port,
        instance.service.as_deref().unwrap_or_default(),
        odbc_value(&instance.user),
        odbc_value(password)
    )
}
