//! Error types for the checksum library.

use thiserror::Error;

use crate::core::RunStatus;

/// Main error type for checksum operations.
#[derive(Error, Debug)]
pub enum TabsumError {
    /// Configuration error (invalid YAML, unknown dialect, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection could not be opened for an instance
    #[error("Connection to {instance} failed: {message}")]
    Connection { instance: String, message: String },

    /// Table or column discovery failed
    #[error("Discovery failed for {instance}: {message}")]
    Discovery { instance: String, message: String },

    /// Checksum query failed for a specific table
    #[error("Query failed for {instance}.{table}: {message}")]
    Query {
        instance: String,
        table: String,
        message: String,
    },

    /// Password store error (missing entry, duplicate entry, corrupt record)
    #[error("Password store error: {0}")]
    CredentialStore(String),

    /// Encryption or decryption of a password store record failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// MSSQL driver error
    #[error("MSSQL error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL driver error
    #[error("MySQL error: {0}")]
    Mysql(#[from] sqlx::Error),

    /// ODBC driver manager error (Exasol, Oracle)
    #[cfg(feature = "odbc")]
    #[error("ODBC error: {0}")]
    Odbc(#[from] odbc_api::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Base64 decoding error in the password store
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl TabsumError {
    /// Create a Connection error for an instance
    pub fn connection(instance: impl Into<String>, message: impl Into<String>) -> Self {
        TabsumError::Connection {
            instance: instance.into(),
            message: message.into(),
        }
    }

    /// Create a Discovery error for an instance
    pub fn discovery(instance: impl Into<String>, message: impl Into<String>) -> Self {
        TabsumError::Discovery {
            instance: instance.into(),
            message: message.into(),
        }
    }

    /// Create a Query error for a table of an instance
    pub fn query(
        instance: impl Into<String>,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TabsumError::Query {
            instance: instance.into(),
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for an error that ends the run before the orchestrator reduces outcomes.
    pub fn exit_code(&self) -> u8 {
        RunStatus::Error.code()
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for checksum operations.
pub type Result<T> = std::result::Result<T, TabsumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_names_instance_and_table() {
        let err = TabsumError::query("mysql.prod", "orders", "syntax error");
        assert_eq!(
            err.to_string(),
            "Query failed for mysql.prod.orders: syntax error"
        );
    }

    #[test]
    fn test_format_detailed_includes_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = TabsumError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: no such file"));
    }

    #[test]
    fn test_exit_code_is_error_status() {
        assert_eq!(TabsumError::Config("x".into()).exit_code(), 2);
    }
}
