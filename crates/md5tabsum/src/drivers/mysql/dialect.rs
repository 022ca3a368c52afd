//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Catalog columns are cast to CHAR so the session always decodes text,
//! regardless of the server's information_schema collation.

use crate::checksum::{chunk_offsets, EMPTY_TABLE_CHECKSUM};
use crate::core::identifier::{quote_backtick, quote_literal};
use crate::core::schema::ColumnDescriptor;
use crate::core::traits::Dialect;
use crate::dialect::{classify, TypeCategory};

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_backtick(name)
    }

    fn default_port(&self) -> u16 {
        3306
    }

    fn tables_query(&self, schema: &str, pattern: &str) -> String {
        format!(
            "SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME \
             FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = {} AND LOWER(TABLE_NAME) LIKE LOWER({}) \
             ORDER BY TABLE_NAME",
            quote_literal(schema),
            quote_literal(pattern)
        )
    }

    fn columns_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME, \
             CAST(DATA_TYPE AS CHAR(255)) AS DATA_TYPE, \
             CAST(ORDINAL_POSITION AS CHAR(20)) AS ORDINAL_POSITION \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} \
             ORDER BY ORDINAL_POSITION",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn render_column_expression(&self, column: &ColumnDescriptor) -> String {
        let col = self.quote_ident(&column.name);
        match classify(&column.reported_type) {
            TypeCategory::String => format!("coalesce(md5(rtrim({})), 'null')", col),
            TypeCategory::Temporal => format!(
                "coalesce(date_format({}, '%Y-%m-%d %H:%i:%s.%f'), 'null')",
                col
            ),
            TypeCategory::Boolean => format!(
                "case when {c} is null then 'null' when {c} then '1' else '0' end",
                c = col
            ),
            TypeCategory::Numeric => {
                // MySQL keeps the leading zero; only trailing fractional zeros differ.
                let text = format!("cast({} as char)", col);
                format!(
                    "coalesce(case when instr({t}, '.') > 0 \
                     then trim(trailing '.' from trim(trailing '0' from {t})) \
                     else {t} end, 'null')",
                    t = text
                )
            }
            TypeCategory::Other => format!("coalesce(cast({} as char(65535)), 'null')", col),
        }
    }

    fn render_row_hash_query(&self, schema: &str, table: &str, column_exprs: &[String]) -> String {
        format!(
            "SELECT md5(concat({})) AS ROWHASH FROM {}",
            column_exprs.join(", "),
            self.qualify(schema, table)
        )
    }

    fn render_aggregation_query(&self, row_hash_subquery: &str) -> String {
        let sums: Vec<String> = chunk_offsets()
            .map(|start| {
                format!(
                    "sum(cast(conv(substring(t.ROWHASH, {}, 8), 16, 10) as unsigned))",
                    start
                )
            })
            .collect();
        format!(
            "SELECT count(*) AS NUMROWS, coalesce(md5(concat({})), '{}') AS CHECKSUM FROM ({}) t",
            sums.join(", "),
            EMPTY_TABLE_CHECKSUM,
            row_hash_subquery
        )
    }
}
