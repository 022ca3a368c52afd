//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::traits::Dialect;
use crate::dialect::DialectKind;
use crate::drivers::DialectImpl;
use crate::error::Result;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// Unknown top-level keys (including unsupported dialects) are rejected here,
    /// before any connection is attempted.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Instance sections grouped by engine, in config-file order.
    pub fn sections(&self) -> impl Iterator<Item = (DialectKind, &str, &InstanceSection)> {
        DialectKind::ALL.into_iter().flat_map(move |kind| {
            self.section_map(kind)
                .iter()
                .map(move |(name, section)| (kind, name.as_str(), section))
        })
    }

    fn section_map(&self, kind: DialectKind) -> &BTreeMap<String, InstanceSection> {
        match kind {
            DialectKind::Exasol => &self.exasol,
            DialectKind::Mysql => &self.mysql,
            DialectKind::Mssql => &self.mssql,
            DialectKind::Oracle => &self.oracle,
            DialectKind::Postgresql => &self.postgresql,
        }
    }

    /// Every configured instance, active or not.
    pub fn instances(&self) -> Vec<InstanceConfig> {
        self.sections()
            .map(|(kind, name, section)| resolve(kind, name, section))
            .collect()
    }

    /// Instances marked active, ordered by dialect and identifier.
    pub fn active_instances(&self) -> Vec<InstanceConfig> {
        self.instances().into_iter().filter(|i| i.active).collect()
    }

    /// Threshold for the run log: the global `loglevel` raised to the most verbose
    /// active instance. The runner gates SQL and column detail per instance.
    pub fn run_log_level(&self) -> LogLevel {
        self.sections()
            .filter(|(_, _, section)| section.active)
            .map(|(_, _, section)| section.loglevel)
            .fold(self.loglevel, LogLevel::max)
    }

    /// Look up one instance by its `<dialect>.<identifier>` id.
    pub fn instance(&self, instance_id: &str) -> Option<InstanceConfig> {
        let (dialect, name) = instance_id.split_once('.')?;
        let kind: DialectKind = dialect.parse().ok()?;
        self.section_map(kind)
            .get(name)
            .map(|section| resolve(kind, name, section))
    }
}

fn resolve(kind: DialectKind, name: &str, section: &InstanceSection) -> InstanceConfig {
    let default_port = DialectImpl::from_kind(kind).default_port();
    InstanceConfig {
        instance_id: format!("{}.{}", kind, name),
        dialect: kind,
        host: section.host.clone(),
        port: section.port.unwrap_or(default_port),
        user: section.user.clone(),
        schema: section.schema.clone(),
        table_patterns: section.table.0.clone(),
        active: section.active,
        log_level: section.loglevel,
        database: section.database.clone(),
        service: section.service.clone(),
        ssl_mode: section.ssl_mode,
        encrypt: section.encrypt,
        trust_server_cert: section.trust_server_cert,
        odbc_driver: section.odbc_driver.clone(),
    }
}
