//! Supported engines and the type classifier they share.
//!
//! [`DialectKind`] names the five engines as they appear in the config file.
//! [`classify`] maps an engine-reported type string to a [`TypeCategory`].

mod classify;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabsumError};

pub use classify::{classify, TypeCategory};

/// A supported database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Exasol,
    Mysql,
    Mssql,
    Oracle,
    Postgresql,
}

impl DialectKind {
    /// All engines, in config-file order.
    pub const ALL: [DialectKind; 5] = [
        DialectKind::Exasol,
        DialectKind::Mysql,
        DialectKind::Mssql,
        DialectKind::Oracle,
        DialectKind::Postgresql,
    ];

    /// Config-file key of the engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            DialectKind::Exasol => "exasol",
            DialectKind::Mysql => "mysql",
            DialectKind::Mssql => "mssql",
            DialectKind::Oracle => "oracle",
            DialectKind::Postgresql => "postgresql",
        }
    }

    /// Whether sessions for this engine go through ODBC.
    pub fn uses_odbc(&self) -> bool {
        matches!(self, DialectKind::Exasol | DialectKind::Oracle)
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = TabsumError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "exasol" => Ok(DialectKind::Exasol),
            "mysql" => Ok(DialectKind::Mysql),
            "mssql" => Ok(DialectKind::Mssql),
            "oracle" => Ok(DialectKind::Oracle),
            "postgresql" => Ok(DialectKind::Postgresql),
            other => Err(TabsumError::Config(format!(
                "Unsupported dialect '{}'. Valid values: exasol, mysql, mssql, oracle, postgresql",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_kind_round_trips_through_str() {
        for kind in DialectKind::ALL {
            assert_eq!(kind.as_str().parse::<DialectKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_dialect_kind_parse_is_case_insensitive() {
        assert_eq!("MSSQL".parse::<DialectKind>().unwrap(), DialectKind::Mssql);
    }

    #[test]
    fn test_unknown_dialect_is_config_error() {
        let err = "sqlite".parse::<DialectKind>().unwrap_err();
        assert!(matches!(err, TabsumError::Config(_)));
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn test_odbc_engines() {
        assert!(DialectKind::Exasol.uses_odbc());
        assert!(DialectKind::Oracle.uses_odbc());
        assert!(!DialectKind::Postgresql.uses_odbc());
    }
}
