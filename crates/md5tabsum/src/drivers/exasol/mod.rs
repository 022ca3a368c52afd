//! Exasol driver.
//!
//! - [`ExasolDialect`]: SQL syntax strategy for Exasol
//! - [`connection_string`]: ODBC connection string for an instance
//!
//! Live sessions need the `odbc` feature and the Exasol ODBC driver registered
//! with the driver manager.

mod dialect;

pub use dialect::ExasolDialect;

use crate::config::InstanceConfig;
use crate::drivers::common::odbc_value;

/// Driver name used when the instance sets no `odbc_driver`.
pub const DEFAULT_ODBC_DRIVER: &str = "EXASolution Driver";

/// ODBC connection string for `instance`.
pub fn connection_string(instance: &InstanceConfig, password: &str) -> String {
    format!(
        "DRIVER={};EXAHOST={}:{};UID={};PWD={};EXASCHEMA={};",
        odbc_value(instance.odbc_driver.as_deref().unwrap_or(DEFAULT_ODBC_DRIVER)),
        instance.host,
        instance.port,
        odbc_value(&instance.user),
        odbc_value(password),
        odbc_value(&instance.schema)
    )
}
