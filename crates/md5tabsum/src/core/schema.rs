//! Data types that flow between discovery, hashing and the orchestrator.

use std::fmt;
use std::ops::BitOr;

/// A column as reported by the engine's catalog.
///
/// Produced per table during discovery and dropped once the row-hash SQL is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name as stored in the catalog.
    pub name: String,
    /// Raw engine type string (e.g. "VARCHAR(50)", "NUMBER(10,2)", "timestamp").
    pub reported_type: String,
    /// 1-based ordinal position within the table.
    pub ordinal_position: u32,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        reported_type: impl Into<String>,
        ordinal_position: u32,
    ) -> Self {
        Self {
            name: name.into(),
            reported_type: reported_type.into(),
            ordinal_position,
        }
    }
}

/// Checksum result for one table of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChecksum {
    pub instance_id: String,
    pub table_name: String,
    pub row_count: u64,
    /// 32 lowercase hex characters; empty when `error` is set.
    pub checksum_hex: String,
    pub error: Option<String>,
}

impl TableChecksum {
    pub fn ok(
        instance_id: impl Into<String>,
        table_name: impl Into<String>,
        row_count: u64,
        checksum_hex: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            table_name: table_name.into(),
            row_count,
            checksum_hex: checksum_hex.into(),
            error: None,
        }
    }

    pub fn failed(
        instance_id: impl Into<String>,
        table_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            table_name: table_name.into(),
            row_count: 0,
            checksum_hex: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The stdout form: `instance.table:checksum`.
    pub fn output_line(&self) -> String {
        format!("{}.{}:{}", self.instance_id, self.table_name, self.checksum_hex)
    }
}

/// Terminal status of one instance run.
///
/// Statuses combine with `|` so any failure makes the reduced status non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Ok,
    Error,
}

impl RunStatus {
    /// Numeric process status: OK = 0, ERROR = 2.
    pub fn code(self) -> u8 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::Error => 2,
        }
    }

    fn from_code(code: u8) -> Self {
        if code == 0 {
            RunStatus::Ok
        } else {
            RunStatus::Error
        }
    }
}

impl BitOr for RunStatus {
    type Output = RunStatus;

    fn bitor(self, rhs: RunStatus) -> RunStatus {
        RunStatus::from_code(self.code() | rhs.code())
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Ok => write!(f, "OK"),
            RunStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// One outcome per instance runner, consumed once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub instance_id: String,
    pub status: RunStatus,
    /// Number of tables that produced a checksum before the run ended.
    pub tables_done: usize,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_or_reduction() {
        assert_eq!(RunStatus::Ok | RunStatus::Ok, RunStatus::Ok);
        assert_eq!(RunStatus::Ok | RunStatus::Error, RunStatus::Error);
        assert_eq!(RunStatus::Error | RunStatus::Ok, RunStatus::Error);
        assert_eq!(RunStatus::Error | RunStatus::Error, RunStatus::Error);
    }

    #[test]
    fn test_run_status_codes() {
        assert_eq!(RunStatus::Ok.code(), 0);
        assert_eq!(RunStatus::Error.code(), 2);
    }

    #[test]
    fn test_table_checksum_output_line() {
        let t = TableChecksum::ok(
            "postgresql.prod",
            "orders",
            3,
            "d41d8cd98f00b204e9800998ecf8427e",
        );
        assert_eq!(
            t.output_line(),
            "postgresql.prod.orders:d41d8cd98f00b204e9800998ecf8427e"
        );
        assert!(t.is_ok());
    }

    #[test]
    fn test_failed_table_checksum_has_no_hash() {
        let t = TableChecksum::failed("mssql.dev", "orders", "timeout");
        assert!(!t.is_ok());
        assert!(t.checksum_hex.is_empty());
    }
}
