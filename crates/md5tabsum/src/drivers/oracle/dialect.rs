//! Oracle SQL dialect (Strategy pattern).
//!
//! Oracle prints numbers below 1 in magnitude without the leading zero (`.5`),
//! treats the empty string as NULL and ignores NULL operands of `||`. The
//! expressions below compensate for all three.

use crate::checksum::{chunk_offsets, EMPTY_TABLE_CHECKSUM, MD5_OF_EMPTY};
use crate::core::identifier::{quote_double, quote_literal};
use crate::core::schema::ColumnDescriptor;
use crate::core::traits::Dialect;
use crate::dialect::{classify, TypeCategory};

/// Format model for |x| < 1: forces the leading zero, fill mode drops padding.
const FRACTION_FORMAT: &str = "FM0.99999999999999999999999999999999999999";

const SESSION_SETUP: &[&str] = &[
    "ALTER SESSION SET NLS_NUMERIC_CHARACTERS = '.,'",
    "ALTER SESSION SET NLS_DATE_FORMAT = 'YYYY-MM-DD HH24:MI:SS'",
    "ALTER SESSION SET NLS_TIMESTAMP_FORMAT = 'YYYY-MM-DD HH24:MI:SS.FF6'",
];

/// Oracle dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct OracleDialect;

impl OracleDialect {
    /// Create a new Oracle dialect instance.
    pub fn new() -> Self {
        Self
    }
}

/// Drop trailing fractional zeros and a dangling point from a numeric text expression.
/// LOBs cannot be cast to VARCHAR2 or passed to STANDARD_HASH. They are
/// canonicalized as their length plus the MD5 of a leading slice: bytes for BLOB,
/// characters for CLOB and NCLOB.
fn lob_prefix_len(reported_type: &str) -> Option<u32> {
    let upper = reported_type.trim().to_uppercase();
    if upper.starts_with("BLOB") {
        Some(2000)
    } else if upper.starts_with("CLOB") || upper.starts_with("NCLOB") {
        Some(1000)
    } else {
        None
    }
}

fn trim_fraction(text: &str) -> String {
    format!(
        "case when instr({t}, '.') > 0 then rtrim(rtrim({t}, '0'), '.') else {t} end",
        t = text
    )
}

impl Dialect for OracleDialect {
    fn name(&self) -> &str {
        "oracle"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_double(name)
    }

    fn default_port(&self) -> u16 {
        1521
    }

    fn session_setup(&self) -> &'static [&'static str] {
        SESSION_SETUP
    }

    fn tables_query(&self, schema: &str, pattern: &str) -> String {
        format!(
            "SELECT TABLE_NAME FROM ALL_TABLES \
             WHERE OWNER = UPPER({}) AND UPPER(TABLE_NAME) LIKE UPPER({}) \
             ORDER BY TABLE_NAME",
            quote_literal(schema),
            quote_literal(pattern)
        )
    }

    fn columns_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT COLUMN_NAME, \
             DATA_TYPE || '(' || DATA_LENGTH || ',' || DATA_PRECISION || ',' || DATA_SCALE || ')', \
             COLUMN_ID \
             FROM ALL_TAB_COLUMNS \
             WHERE OWNER = UPPER({}) AND TABLE_NAME = {} \
             ORDER BY COLUMN_ID",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn render_column_expression(&self, column: &ColumnDescriptor) -> String {
        let col = self.quote_ident(&column.name);
        match classify(&column.reported_type) {
            // rtrim of an all-blank value yields NULL; hash it as the empty string.
            TypeCategory::String => format!(
                "case when {c} is null then 'null' \
                 else coalesce(lower(rawtohex(standard_hash(rtrim({c}), 'MD5'))), '{e}') end",
                c = col,
                e = MD5_OF_EMPTY
            ),
            TypeCategory::Temporal if column.reported_type.to_uppercase().contains("TIMESTAMP") => {
                format!(
                    "coalesce(to_char({}, 'YYYY-MM-DD HH24:MI:SS.FF6'), 'null')",
                    col
                )
            }
            // DATE has no fractional seconds.
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
            TypeCategory::Other => match lob_prefix_len(&column.reported_type) {
                Some(amount) => format!(
                    "case when {c} is null then 'null' \
                     else dbms_lob.getlength({c}) || ':' || \
                     lower(rawtohex(standard_hash(dbms_lob.substr({c}, {n}, 1), 'MD5'))) end",
                    c = col,
                    n = amount
                ),
                None => format!("coalesce(cast({} as varchar2(4000)), 'null')", col),
            },
        }
    }

    fn render_row_hash_query(&self, schema: &str, table: &str, column_exprs: &[String]) -> String {
        format!(
            "SELECT lower(rawtohex(standard_hash({}, 'MD5'))) AS ROWHASH FROM {}",
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
            "SELECT /*+ PARALLEL */ count(*) AS NUMROWS, \
             coalesce(lower(rawtohex(standard_hash({}, 'MD5'))), '{}') AS CHECKSUM \
             FROM ({}) t",
            sums.join(" || "),
            EMPTY_TABLE_CHECKSUM,
            row_hash_subquery
        )
    }
}
