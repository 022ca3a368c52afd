//! Configuration type definitions.
//!
//! The file has two global keys and one optional section per engine, each
//! holding named instances:
//!
//! ```yaml
//! Logfile: /var/log/md5tabsum.log
//! Passwordstore: /etc/md5tabsum/md5tabsum.pwd
//! postgresql:
//!   prod:
//!     active: 1
//!     host: db1.example.com
//!     port: 5432
//!     database: shop
//!     user: checker
//!     schema: public
//!     table: orders, order_items, cust%
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

use crate::dialect::DialectKind;
use crate::drivers::common::SslMode;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Log file that receives leveled, instance-prefixed lines.
    #[serde(alias = "Logfile")]
    pub logfile: PathBuf,

    /// Encrypted password store.
    #[serde(alias = "Passwordstore")]
    pub passwordstore: PathBuf,

    /// Threshold of the log file (0 basic, 1 medium, 2 full).
    #[serde(default, alias = "Loglevel")]
    pub loglevel: LogLevel,

    /// What to do when a table pattern matches nothing.
    #[serde(default)]
    pub on_missing_table: MissingTablePolicy,

    #[serde(default)]
    pub exasol: BTreeMap<String, InstanceSection>,

    #[serde(default)]
    pub mysql: BTreeMap<String, InstanceSection>,

    #[serde(default)]
    pub mssql: BTreeMap<String, InstanceSection>,

    #[serde(default)]
    pub oracle: BTreeMap<String, InstanceSection>,

    #[serde(default)]
    pub postgresql: BTreeMap<String, InstanceSection>,
}

/// One instance section as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceSection {
    /// Only active instances are checksummed (`1`, `true`).
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub active: bool,

    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Database port (default: the engine's standard port).
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Schema holding the tables.
    #[serde(default)]
    pub schema: String,

    /// Table names or LIKE patterns, comma-separated or as a list.
    #[serde(default)]
    pub table: TablePatterns,

    /// Verbosity of per-instance SQL logging.
    #[serde(default)]
    pub loglevel: LogLevel,

    /// Database name (mssql, postgresql; mysql defaults to the schema).
    #[serde(default)]
    pub database: Option<String>,

    /// Service name (oracle).
    #[serde(default)]
    pub service: Option<String>,

    /// TLS mode (postgresql).
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Encrypt connection (mssql, default: true).
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub encrypt: bool,

    /// Trust server certificate (mssql, default: false).
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub trust_server_cert: bool,

    /// ODBC driver name override (exasol, oracle).
    #[serde(default)]
    pub odbc_driver: Option<String>,
}

/// Resolved, immutable configuration of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    /// `<dialect>.<identifier>`, unique across the file.
    pub instance_id: String,
    pub dialect: DialectKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub schema: String,
    pub table_patterns: Vec<String>,
    pub active: bool,
    pub log_level: LogLevel,
    pub database: Option<String>,
    pub service: Option<String>,
    pub ssl_mode: SslMode,
    pub encrypt: bool,
    pub trust_server_cert: bool,
    pub odbc_driver: Option<String>,
}

impl InstanceConfig {
    /// Database to connect to: the configured one, or the schema for MySQL.
    pub fn database_or_schema(&self) -> &str {
        self.database.as_deref().unwrap_or(&self.schema)
    }
}

#[cfg(test)]
impl InstanceConfig {
    /// An active instance with one table pattern, for tests.
    pub(crate) fn sample(dialect: DialectKind, name: &str) -> Self {
        InstanceConfig {
            instance_id: format!("{}.{}", dialect, name),
            dialect,
            host: "db.example.com".into(),
            port: 1,
            user: "checker".into(),
            schema: "app".into(),
            table_patterns: vec!["orders".into()],
            active: true,
            log_level: LogLevel::Basic,
            database: Some("shop".into()),
            service: Some("ORCL".into()),
            ssl_mode: SslMode::Disable,
            encrypt: true,
            trust_server_cert: false,
            odbc_driver: None,
        }
    }
}

/// Log verbosity as configured (0, 1, 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Results and errors only.
    #[default]
    Basic,
    /// Adds the rendered SQL.
    Medium,
    /// Adds discovered column types.
    Full,
}

impl LogLevel {
    /// `tracing` level a log file at this verbosity records down to.
    pub fn tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Basic => tracing::Level::INFO,
            LogLevel::Medium => tracing::Level::DEBUG,
            LogLevel::Full => tracing::Level::TRACE,
        }
    }
}

impl TryFrom<i64> for LogLevel {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(LogLevel::Basic),
            1 => Ok(LogLevel::Medium),
            2 => Ok(LogLevel::Full),
            other => Err(format!("loglevel must be 0, 1 or 2, got {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = match Scalar::deserialize(deserializer)? {
            Scalar::Int(n) => n,
            Scalar::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid loglevel '{}'", s)))?,
            Scalar::Bool(b) => {
                return Err(serde::de::Error::custom(format!("invalid loglevel '{}'", b)))
            }
        };
        LogLevel::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// Handling of a table pattern that matches no table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTablePolicy {
    /// Log a warning and continue with the remaining patterns.
    #[default]
    Warn,
    /// Fail the instance.
    Fail,
}

/// Ordered table-name patterns of one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablePatterns(pub Vec<String>);

impl TablePatterns {
    /// Split a comma-separated list, dropping blanks and backslashes.
    pub fn parse(raw: &str) -> Self {
        Self::from_entries(raw.split(','))
    }

    fn from_entries<'a>(entries: impl IntoIterator<Item = &'a str>) -> Self {
        TablePatterns(
            entries
                .into_iter()
                .map(|e| {
                    e.chars()
                        .filter(|c| !c.is_whitespace() && *c != '\\')
                        .collect::<String>()
                })
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for TablePatterns {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<String>),
            Csv(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::List(items) => TablePatterns::from_entries(items.iter().map(String::as_str)),
            Raw::Csv(raw) => TablePatterns::parse(&raw),
        })
    }
}

/// YAML scalar as written by hand: `1`, `"1"` and `true` all occur in the wild.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

fn deserialize_flag<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<bool, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Bool(b) => Ok(b),
        Scalar::Int(1) => Ok(true),
        Scalar::Int(0) => Ok(false),
        Scalar::Str(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("invalid flag '{}'", other))),
        },
        Scalar::Int(n) => Err(serde::de::Error::custom(format!("invalid flag '{}'", n))),
    }
}

fn deserialize_port<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u16>, D::Error> {
    let raw = match Scalar::deserialize(deserializer)? {
        Scalar::Int(n) => n,
        Scalar::Str(s) if s.trim().is_empty() => return Ok(None),
        Scalar::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", s)))?,
        Scalar::Bool(b) => return Err(serde::de::Error::custom(format!("invalid port '{}'", b))),
    };
    u16::try_from(raw)
        .ok()
        .filter(|p| *p != 0)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("port out of range: {}", raw)))
}

fn default_true() -> bool {
    true
}
