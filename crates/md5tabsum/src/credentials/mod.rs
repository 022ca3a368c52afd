//! Instance passwords.
//!
//! - [`PasswordStore`]: the encrypted, line-oriented store file
//! - [`CredentialProvider`]: the read interface the orchestrator depends on
//! - [`StaticCredentials`]: an in-memory provider

mod store;

pub use store::PasswordStore;

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TabsumError};

/// A password. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The clear-text password, for handing to a driver.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Source of per-instance passwords.
pub trait CredentialProvider: Send + Sync {
    /// Password for `instance_id`. Errors when no entry exists.
    fn get(&self, instance_id: &str) -> Result<Secret>;

    /// Every instance id with a stored password, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// Credentials held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: BTreeMap<String, Secret>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, instance_id: impl Into<String>, secret: impl Into<Secret>) -> Self {
        self.entries.insert(instance_id.into(), secret.into());
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn get(&self, instance_id: &str) -> Result<Secret> {
        self.entries.get(instance_id).cloned().ok_or_else(|| {
            TabsumError::CredentialStore(format!("no password stored for {}", instance_id))
        })
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        let printed = format!("{:?}", secret);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("REDACTED"));
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_static_credentials() {
        let creds = StaticCredentials::new()
            .with("postgresql.prod", "pw1")
            .with("mssql.legacy", "pw2");
        assert_eq!(creds.get("postgresql.prod").unwrap().expose(), "pw1");
        assert_eq!(creds.list().unwrap(), vec!["mssql.legacy", "postgresql.prod"]);

        let err = creds.get("oracle.erp").unwrap_err();
        assert!(matches!(err, TabsumError::CredentialStore(_)));
        assert!(err.to_string().contains("oracle.erp"));
    }
}
