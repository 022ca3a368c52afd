//! Microsoft SQL Server dialect (Strategy pattern).
//!
//! `hashbytes` digests the exact bytes it is given, so every canonical value is
//! funneled through `varchar` before hashing; an `nvarchar` operand would be hashed
//! as UTF-16 and never match the other engines.

use crate::checksum::{chunk_offsets, EMPTY_TABLE_CHECKSUM};
use crate::core::identifier::{quote_bracket, quote_literal};
use crate::core::schema::ColumnDescriptor;
use crate::core::traits::Dialect;
use crate::dialect::{classify, TypeCategory};

/// .NET custom format: at least one integer digit, up to 38 fractional digits,
/// no trailing zeros.
const NUMERIC_FORMAT: &str = "0.######################################";

/// MSSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Create a new MSSQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    fn nliteral(value: &str) -> String {
        format!("N{}", quote_literal(value))
    }
}

impl Dialect for MssqlDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_bracket(name)
    }

    fn default_port(&self) -> u16 {
        1433
    }

    fn tables_query(&self, schema: &str, pattern: &str) -> String {
        format!(
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = {} AND LOWER(TABLE_NAME) LIKE LOWER({}) \
             ORDER BY TABLE_NAME",
            Self::nliteral(schema),
            Self::nliteral(pattern)
        )
    }

    fn columns_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT COLUMN_NAME, DATA_TYPE, ORDINAL_POSITION \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} \
             ORDER BY ORDINAL_POSITION",
            Self::nliteral(schema),
            Self::nliteral(table)
        )
    }

    fn render_column_expression(&self, column: &ColumnDescriptor) -> String {
        let col = self.quote_ident(&column.name);
        match classify(&column.reported_type) {
            TypeCategory::String => format!(
                "coalesce(lower(convert(varchar(32), \
                 hashbytes('MD5', cast(rtrim({}) as varchar(max))), 2)), 'null')",
                col
            ),
            TypeCategory::Temporal => {
                // FORMAT treats `time` as a TimeSpan and returns NULL for date specifiers.
                let value = if column.reported_type.trim().eq_ignore_ascii_case("time") {
                    format!("cast({} as datetime2)", col)
                } else {
                    col
                };
                format!(
                    "coalesce(cast(format({}, 'yyyy-MM-dd HH:mm:ss.ffffff', 'en-US') \
                     as varchar(32)), 'null')",
                    value
                )
            }
            TypeCategory::Boolean => format!(
                "case when {c} is null then 'null' when {c} = 1 then '1' else '0' end",
                c = col
            ),
            TypeCategory::Numeric => format!(
                "coalesce(cast(format({}, '{}', 'en-US') as varchar(64)), 'null')",
                col, NUMERIC_FORMAT
            ),
            TypeCategory::Other => format!("coalesce(cast({} as varchar(max)), 'null')", col),
        }
    }

    fn render_row_hash_query(&self, schema: &str, table: &str, column_exprs: &[String]) -> String {
        format!(
            "SELECT lower(convert(varchar(32), hashbytes('MD5', {}), 2)) AS ROWHASH FROM {}",
            column_exprs.join(" + "),
            self.qualify(schema, table)
        )
    }

    fn render_aggregation_query(&self, row_hash_subquery: &str) -> String {
        // A 4-byte varbinary converts to bigint zero-padded on the left, i.e. unsigned.
        let sums: Vec<String> = chunk_offsets()
            .map(|start| {
                format!(
                    "cast(sum(cast(convert(bigint, convert(varbinary(4), \
                     substring(t.ROWHASH, {}, 8), 2)) as decimal(38, 0))) as varchar(40))",
                    start
                )
            })
            .collect();
        format!(
            "SELECT count_big(*) AS NUMROWS, \
             coalesce(lower(convert(varchar(32), hashbytes('MD5', {}), 2)), '{}') AS CHECKSUM \
             FROM ({}) t",
            sums.join(" + "),
            EMPTY_TABLE_CHECKSUM,
            row_hash_subquery
        )
    }
}
