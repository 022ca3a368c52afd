//! Exasol SQL dialect (Strategy pattern).
//!
//! Like Oracle, Exasol treats the empty string as NULL and may drop the leading
//! zero of fractional numbers, so strings and numerics get explicit guards.

use crate::checksum::{chunk_offsets, EMPTY_TABLE_CHECKSUM, MD5_OF_EMPTY};
use crate::core::identifier::{quote_double, quote_literal};
use crate::core::schema::ColumnDescriptor;
use crate::core::traits::Dialect;
use crate::dialect::{classify, TypeCategory};

const FRACTION_FORMAT: &str = "FM0.999999999999999999999999999999999999";

const SESSION_SETUP: &[&str] = &["ALTER SESSION SET NLS_NUMERIC_CHARACTERS = '.,'"];

/// Exasol dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct ExasolDialect;

impl ExasolDialect {
    /// Create a new Exasol dialect instance.
    pub fn new() -> Self {
        Self
    }
}

fn trim_fraction(text: &str) -> String {
    format!(
        "case when instr({t}, '.') > 0 then rtrim(rtrim({t}, '0'), '.') else {t} end",
        t = text
    )
}

impl Dialect for ExasolDialect {
    fn name(&self) -> &str {
        "exasol"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_double(name)
    }

    fn default_port(&self) -> u16 {
        8563
    }

    fn session_setup(&self) -> &'static [&'static str] {
        SESSION_SETUP
    }

    fn tables_query(&self, schema: &str, pattern: &str) -> String {
        format!(
            "SELECT TABLE_NAME FROM EXA_ALL_TABLES \
             WHERE TABLE_SCHEMA = UPPER({}) AND UPPER(TABLE_NAME) LIKE UPPER({}) \
             ORDER BY TABLE_NAME",
            quote_literal(schema),
            quote_literal(pattern)
        )
    }

    fn columns_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT COLUMN_NAME, COLUMN_TYPE, COLUMN_ORDINAL_POSITION \
             FROM EXA_ALL_COLUMNS \
             WHERE COLUMN_SCHEMA = UPPER({}) AND COLUMN_TABLE = {} \
             ORDER BY COLUMN_ORDINAL_POSITION",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn render_column_expression(&self, column: &ColumnDescriptor) -> String {
        let col = self.quote_ident(&column.name);
        match classify(&column.reported_type) {
            TypeCategory::String => format!(
                "case when {c} is null then 'null' \
                 else coalesce(hash_md5(rtrim({c})), '{e}') end",
                c = col,
                e = MD5_OF_EMPTY
            ),
            TypeCategory::Temporal if column.reported_type.to_uppercase().contains("TIMESTAMP") => {
                format!(
                    "coalesce(to_char({}, 'YYYY-MM-DD HH24:MI:SS.FF6'), 'null')",
                    col
                )
            }
            TypeCategory::Temporal => format!(
                "case when {c} is null then 'null' \
                 else to_char({c}, 'YYYY-MM-DD HH24:MI:SS') || '.000000' end",
                c = col
            ),
            TypeCategory::Boolean => format!(
                "case when {c} is null then 'null' when {c} then '1' else '0' end",
                c = col
            ),
            TypeCategory::Numeric => format!(
                "case when {c} is null then 'null' \
                 when {c} > -1 and {c} < 1 then {small} \
                 else {large} end",
                c = col,
                small = trim_fraction(&format!("to_char({}, '{}')", col, FRACTION_FORMAT)),
                large = trim_fraction(&format!("to_char({})", col))
            ),
            TypeCategory::Other => {
                format!("coalesce(cast({} as varchar(2000000)), 'null')", col)
            }
        }
    }

    fn render_row_hash_query(&self, schema: &str, table: &str, column_exprs: &[String]) -> String {
        format!(
            "SELECT hash_md5({}) AS ROWHASH FROM {}",
            column_exprs.join(" || "),
            self.qualify(schema, table)
        )
    }

    fn render_aggregation_query(&self, row_hash_subquery: &str) -> String {
        let sums: Vec<String> = chunk_offsets()
            .map(|start| {
                format!(
                    "to_char(sum(to_number(substr(t.ROWHASH, {}, 8), 'XXXXXXXX')))",
                    start
                )
            })
            .collect();
        format!(
            "SELECT count(*) AS NUMROWS, coalesce(hash_md5({}), '{}') AS CHECKSUM FROM ({}) AS t",
            sums.join(" || "),
            EMPTY_TABLE_CHECKSUM,
            row_hash_subquery
        )
    }
}
