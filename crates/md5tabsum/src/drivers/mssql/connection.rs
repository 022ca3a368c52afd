//! SQL Server connection over Tiberius.

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::config::InstanceConfig;
use crate::core::traits::{Connection, TextRow};
use crate::credentials::Secret;
use crate::error::{Result, TabsumError};

/// Maximum TDS packet size (32767 bytes, ~32KB).
const TDS_MAX_PACKET_SIZE: u32 = 32767;

/// A single Tiberius client.
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
}

impl MssqlConnection {
    fn build_config(instance: &InstanceConfig, secret: &Secret) -> Config {
        let mut config = Config::new();
        config.host(&instance.host);
        config.port(instance.port);
        config.database(instance.database_or_schema());
        config.application_name("md5tabsum");
        config.authentication(AuthMethod::sql_server(&instance.user, secret.expose()));

        if instance.encrypt {
            if instance.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config.packet_size(TDS_MAX_PACKET_SIZE);
        config
    }

    /// Open a connection for `instance`.
    pub async fn connect(instance: &InstanceConfig, secret: &Secret) -> Result<Self> {
        let config = Self::build_config(instance, secret);
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        let client = Client::connect(config, tcp.compat_write()).await?;
        debug!(
            "Connected to MSSQL {}:{}/{}",
            instance.host,
            instance.port,
            instance.database_or_schema()
        );
        Ok(Self { client })
    }
}

/// Render one cell as text. Only the types the checksum and catalog queries produce
/// are supported.
fn cell_to_text(data: ColumnData<'static>) -> Result<Option<String>> {
    let text = match data {
        ColumnData::String(v) => v.map(|s| s.into_owned()),
        ColumnData::U8(v) => v.map(|n| n.to_string()),
        ColumnData::I16(v) => v.map(|n| n.to_string()),
        ColumnData::I32(v) => v.map(|n| n.to_string()),
        ColumnData::I64(v) => v.map(|n| n.to_string()),
        ColumnData::F32(v) => v.map(|n| n.to_string()),
        ColumnData::F64(v) => v.map(|n| n.to_string()),
        ColumnData::Bit(v) => v.map(|b| if b { "1" } else { "0" }.to_string()),
        ColumnData::Numeric(v) => v.map(|n| n.to_string()),
        ColumnData::Guid(v) => v.map(|g| g.to_string()),
        ColumnData::Binary(v) => v.map(|b| String::from_utf8_lossy(&b).into_owned()),
        other => {
            return Err(TabsumError::Config(format!(
                "unsupported MSSQL result type: {:?}",
                other
            )))
        }
    };
    Ok(text)
}

#[async_trait]
impl Connection for MssqlConnection {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.client.execute(sql, &[]).await?;
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<TextRow>> {
        let stream = self.client.simple_query(sql).await?;
        let rows = stream.into_first_result().await?;
        rows.into_iter()
            .map(|row| row.into_iter().map(cell_to_text).collect::<Result<TextRow>>())
            .collect()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;
    use std::borrow::Cow;

    fn instance() -> InstanceConfig {
        let mut instance = InstanceConfig::sample(DialectKind::Mssql, "legacy");
        instance.host = "sql1".into();
        instance.port = 14330;
        instance
    }

    #[test]
    fn test_build_config_address() {
        let config = MssqlConnection::build_config(&instance(), &Secret::new("pw"));
        assert_eq!(config.get_addr(), "sql1:14330");
    }

    #[test]
    fn test_cell_to_text() {
        assert_eq!(
            cell_to_text(ColumnData::String(Some(Cow::Borrowed("abc")))).unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(
            cell_to_text(ColumnData::I64(Some(42))).unwrap(),
            Some("42".to_string())
        );
        assert_eq!(cell_to_text(ColumnData::I32(None)).unwrap(), None);
        assert_eq!(
            cell_to_text(ColumnData::Bit(Some(true))).unwrap(),
            Some("1".to_string())
        );
    }
}
