//! Core abstractions shared by the dialects, the drivers and the orchestrator.
//!
//! - [`schema`]: column descriptors, per-table results and run outcomes
//! - [`traits`]: the dialect, connection and session traits
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod schema;
pub mod traits;

pub use schema::{ColumnDescriptor, RunOutcome, RunStatus, TableChecksum};
pub use traits::{CatalogSession, Connection, Dialect, TextRow};
