//! PostgreSQL connection over tokio-postgres.
//!
//! Queries use the simple query protocol so every value comes back as text.

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, warn};

use crate::config::InstanceConfig;
use crate::core::traits::{Connection, TextRow};
use crate::credentials::Secret;
use crate::drivers::common::TlsBuilder;
use crate::error::Result;

/// A single tokio-postgres client plus its driving task.
pub struct PostgresConnection {
    client: Client,
    driver: JoinHandle<()>,
}

impl PostgresConnection {
    fn build_config(instance: &InstanceConfig, secret: &Secret) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&instance.host)
            .port(instance.port)
            .user(&instance.user)
            .password(secret.expose())
            .dbname(instance.database_or_schema())
            .application_name("md5tabsum");
        config
    }

    /// Open a connection for `instance`, with TLS per its `ssl_mode`.
    pub async fn connect(instance: &InstanceConfig, secret: &Secret) -> Result<Self> {
        let config = Self::build_config(instance, secret);
        let instance_id = instance.instance_id.clone();

        let tls = TlsBuilder::new(&instance.instance_id, instance.ssl_mode).build()?;
        let (client, driver) = match tls {
            Some(tls) => {
                let (client, connection) = config.connect(tls).await?;
                let driver = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!(instance = %instance_id, "PostgreSQL connection error: {}", e);
                    }
                });
                (client, driver)
            }
            None => {
                let (client, connection) = config.connect(NoTls).await?;
                let driver = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!(instance = %instance_id, "PostgreSQL connection error: {}", e);
                    }
                });
                (client, driver)
            }
        };

        debug!(
            "Connected to PostgreSQL {}:{}/{} (ssl_mode={:?})",
            instance.host,
            instance.port,
            instance.database_or_schema(),
            instance.ssl_mode
        );
        Ok(Self { client, driver })
    }
}

fn text_rows(messages: Vec<SimpleQueryMessage>) -> Vec<TextRow> {
    messages
        .into_iter()
        .filter_map(|message| match message {
            SimpleQueryMessage::Row(row) => {
                Some((0..row.len()).map(|i| row.get(i).map(str::to_owned)).collect())
            }
            _ => None,
        })
        .collect()
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<TextRow>> {
        let messages = self.client.simple_query(sql).await?;
        Ok(text_rows(messages))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let PostgresConnection { client, driver } = *self;
        drop(client);
        if let Err(e) = driver.await {
            warn!("PostgreSQL connection task ended abnormally: {}", e);
        }
        Ok(())
    }
}
