//! # md5tabsum
//!
//! Order-independent table checksums across Exasol, MySQL, MSSQL, Oracle and
//! PostgreSQL.
//!
//! Each table is reduced inside its own engine: every row is canonicalized and
//! hashed, the four 32-bit chunks of the row hashes are summed, and the sums are
//! hashed once more. Equal content gives equal checksums regardless of row order or
//! engine, so staging and production copies can be compared without moving data.
//!
//! - **Dialects** render the canonicalization and aggregation SQL per engine
//! - **Drivers** run that SQL over one connection per instance
//! - **Orchestrator** checksums every active instance concurrently and reduces
//!   the outcomes to one exit status
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use md5tabsum::{Config, DriverConnector, Orchestrator, PasswordStore};
//!
//! #[tokio::main]
//! async fn main() -> md5tabsum::Result<()> {
//!     let config = Config::load("md5tabsum.yaml")?;
//!     let store = Arc::new(PasswordStore::new(&config.passwordstore));
//!     let orchestrator = Orchestrator::from_config(&config, store, Arc::new(DriverConnector));
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//!     let run = tokio::spawn(orchestrator.run(tx));
//!     while let Some(checksum) = rx.recv().await {
//!         println!("{}", checksum.output_line());
//!     }
//!     let summary = run.await.expect("orchestrator task");
//!     std::process::exit(summary.exit_code().into());
//! }
//! ```

pub mod checksum;
pub mod config;
pub mod core;
pub mod credentials;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod orchestrator;

// Re-exports for convenient access
pub use config::{Config, InstanceConfig, LogLevel, MissingTablePolicy};
pub use core::{ColumnDescriptor, RunOutcome, RunStatus, TableChecksum};
pub use credentials::{CredentialProvider, PasswordStore, Secret, StaticCredentials};
pub use dialect::{classify, DialectKind, TypeCategory};
pub use error::{Result, TabsumError};
pub use orchestrator::{Connector, DriverConnector, Orchestrator, RunSummary};
