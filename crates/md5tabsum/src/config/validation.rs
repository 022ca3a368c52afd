//! Configuration validation.

use super::{Config, InstanceSection};
use crate::dialect::DialectKind;
use crate::error::{Result, TabsumError};

/// Validate the configuration.
///
/// Inactive instances are only checked for a usable identifier; everything else
/// applies to active instances.
pub fn validate(config: &Config) -> Result<()> {
    if config.logfile.as_os_str().is_empty() {
        return Err(TabsumError::Config("Logfile is required".into()));
    }
    if config.passwordstore.as_os_str().is_empty() {
        return Err(TabsumError::Config("Passwordstore is required".into()));
    }
    if config.logfile == config.passwordstore {
        return Err(TabsumError::Config(
            "Logfile and Passwordstore cannot be the same file".into(),
        ));
    }

    for (kind, name, section) in config.sections() {
        validate_identifier(kind, name)?;
        if section.active {
            validate_instance(kind, name, section)?;
        }
    }

    Ok(())
}

fn validate_identifier(kind: DialectKind, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(TabsumError::Config(format!(
            "{}: instance identifier cannot be empty",
            kind
        )));
    }
    // ':' separates instance and password in the store; '.' separates dialect and name.
    if name.contains(':') || name.contains('.') || name.chars().any(char::is_whitespace) {
        return Err(TabsumError::Config(format!(
            "{}.{}: instance identifier cannot contain ':', '.' or whitespace",
            kind, name
        )));
    }
    Ok(())
}

fn validate_instance(kind: DialectKind, name: &str, section: &InstanceSection) -> Result<()> {
    let id = format!("{}.{}", kind, name);
    let required = |value: &str, field: &str| -> Result<()> {
        if value.trim().is_empty() {
            Err(TabsumError::Config(format!("{}.{} is required", id, field)))
        } else {
            Ok(())
        }
    };

    required(&section.host, "host")?;
    required(&section.user, "user")?;
    required(&section.schema, "schema")?;

    if section.table.0.is_empty() {
        return Err(TabsumError::Config(format!(
            "{}.table must name at least one table or pattern",
            id
        )));
    }

    match kind {
        DialectKind::Mssql | DialectKind::Postgresql => {
            required(section.database.as_deref().unwrap_or(""), "database")?
        }
        DialectKind::Oracle => required(section.service.as_deref().unwrap_or(""), "service")?,
        DialectKind::Exasol | DialectKind::Mysql => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_yaml() -> String {
        r#"
Logfile: md5tabsum.log
Passwordstore: md5tabsum.pwd
oracle:
  erp:
    active: 1
    host: ora1
    service: ERP
    user: system
    schema: scott
    table: EMP
"#
        .to_string()
    }

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&parse(&valid_yaml())).is_ok());
    }

    #[test]
    fn test_oracle_requires_service() {
        let yaml = valid_yaml().replace("    service: ERP\n", "");
        let err = validate(&parse(&yaml)).unwrap_err();
        assert!(err.to_string().contains("oracle.erp.service is required"));
    }

    #[test]
    fn test_active_instance_requires_host() {
        let yaml = valid_yaml().replace("    host: ora1\n", "");
        let err = validate(&parse(&yaml)).unwrap_err();
        assert!(err.to_string().contains("oracle.erp.host is required"));
    }

    #[test]
    fn test_active_instance_requires_tables() {
        let yaml = valid_yaml().replace("table: EMP", "table: ' , '");
        let err = validate(&parse(&yaml)).unwrap_err();
        assert!(err.to_string().contains("at least one table"));
    }

    #[test]
    fn test_inactive_instance_is_not_checked() {
        let yaml = valid_yaml()
            .replace("active: 1", "active: 0")
            .replace("    host: ora1\n", "");
        assert!(validate(&parse(&yaml)).is_ok());
    }

    #[test]
    fn test_postgresql_requires_database() {
        let yaml = r#"
Logfile: a
Passwordstore: b
postgresql:
  prod:
    active: true
    host: pg
    user: u
    schema: public
    table: t
"#;
        let err = validate(&parse(yaml)).unwrap_err();
        assert!(err.to_string().contains("postgresql.prod.database is required"));
    }

    #[test]
    fn test_mysql_database_is_optional() {
        let yaml = r#"
Logfile: a
Passwordstore: b
mysql:
  shop:
    active: 1
    host: my
    user: u
    schema: shop
    table: orders
"#;
        assert!(validate(&parse(yaml)).is_ok());
    }

    #[test]
    fn test_identifier_cannot_contain_separator() {
        let yaml = valid_yaml().replace("  erp:", "  \"erp:1\":");
        let err = validate(&parse(&yaml)).unwrap_err();
        assert!(err.to_string().contains("cannot contain"));
    }

    #[test]
    fn test_logfile_and_store_must_differ() {
        let yaml = valid_yaml().replace("md5tabsum.pwd", "md5tabsum.log");
        assert!(validate(&parse(&yaml)).is_err());
    }
}
