//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! PostgreSQL always renders numerics with their leading zero, so canonical
//! numeric text only needs `trim_scale` to drop trailing fractional zeros
//! (PostgreSQL 13+).

use crate::checksum::{chunk_offsets, EMPTY_TABLE_CHECKSUM};
use crate::core::identifier::{quote_double, quote_literal};
use crate::core::schema::ColumnDescriptor;
use crate::core::traits::Dialect;
use crate::dialect::{classify, TypeCategory};

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgresql"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_double(name)
    }

    fn default_port(&self) -> u16 {
        5432
    }

    fn tables_query(&self, schema: &str, pattern: &str) -> String {
        format!(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = {} AND table_name ILIKE {} \
             ORDER BY table_name",
            quote_literal(schema),
            quote_literal(pattern)
        )
    }

    fn columns_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT column_name, data_type, ordinal_position \
             FROM information_schema.columns \
             WHERE table_schema = {} AND table_name = {} \
             ORDER BY ordinal_position",
            quote_literal(schema),
            quote_literal(table)
        )
    }

    fn render_column_expression(&self, column: &ColumnDescriptor) -> String {
        let col = self.quote_ident(&column.name);
        match classify(&column.reported_type) {
            TypeCategory::String => format!("coalesce(md5(rtrim({}::text)), 'null')", col),
            TypeCategory::Temporal => format!(
                "coalesce(to_char({}, 'YYYY-MM-DD HH24:MI:SS.US'), 'null')",
                col
            ),
            TypeCategory::Boolean => format!("coalesce({}::integer::text, 'null')", col),
            TypeCategory::Numeric => {
                format!("coalesce(trim_scale({}::numeric)::text, 'null')", col)
            }
            TypeCategory::Other => format!("coalesce({}::text, 'null')", col),
        }
    }

    fn render_row_hash_query(&self, schema: &str, table: &str, column_exprs: &[String]) -> String {
        format!(
            "SELECT md5({}) AS ROWHASH FROM {}",
            column_exprs.join(" || "),
            self.qualify(schema, table)
        )
    }

    fn render_aggregation_query(&self, row_hash_subquery: &str) -> String {
        // bit(32)::bigint zero-extends, so every chunk is read as unsigned.
        let sums: Vec<String> = chunk_offsets()
            .map(|start| {
                format!(
                    "sum(('x' || substring(t.ROWHASH, {}, 8))::bit(32)::bigint)::text",
                    start
                )
            })
            .collect();
        format!(
            "SELECT count(*) AS NUMROWS, coalesce(md5({}), '{}') AS CHECKSUM FROM ({}) t",
            sums.join(" || "),
            EMPTY_TABLE_CHECKSUM,
            row_hash_subquery
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, data_type: &str) -> ColumnDescriptor {
        ColumnDescriptor::new(name, data_type, 1)
    }

    #[test]
    fn test_quote_ident() {
        let d = PostgresDialect::new();
        assert_eq!(d.quote_ident("orders"), "\"orders\"");
        assert_eq!(d.qualify("public", "Order\"s"), "\"public\".\"Order\"\"s\"");
    }

    #[test]
    fn test_tables_query_is_case_insensitive_like() {
        let sql = PostgresDialect::new().tables_query("public", "ord%");
        assert!(sql.contains("table_schema = 'public'"));
        assert!(sql.contains("ILIKE 'ord%'"));
    }

    #[test]
    fn test_tables_query_escapes_literals() {
        let sql = PostgresDialect::new().tables_query("pub'lic", "x");
        assert!(sql.contains("'pub''lic'"));
    }

    #[test]
    fn test_columns_query_orders_by_position() {
        let sql = PostgresDialect::new().columns_query("public", "orders");
        assert!(sql.contains("table_name = 'orders'"));
        assert!(sql.ends_with("ORDER BY ordinal_position"));
    }

    #[test]
    fn test_string_column_is_trimmed_and_hashed() {
        let expr = PostgresDialect::new().render_column_expression(&col("name", "character varying"));
        assert_eq!(expr, "coalesce(md5(rtrim(\"name\"::text)), 'null')");
    }

    #[test]
    fn test_temporal_column_has_microseconds() {
        let expr = PostgresDialect::new()
            .render_column_expression(&col("created", "timestamp without time zone"));
        assert!(expr.contains("'YYYY-MM-DD HH24:MI:SS.US'"));
        assert!(expr.ends_with(", 'null')"));
    }

    #[test]
    fn test_boolean_column_renders_integer() {
        let expr = PostgresDialect::new().render_column_expression(&col("flag", "boolean"));
        assert_eq!(expr, "coalesce(\"flag\"::integer::text, 'null')");
    }

    #[test]
    fn test_numeric_column_trims_scale() {
        let expr = PostgresDialect::new().render_column_expression(&col("amount", "numeric"));
        assert!(expr.contains("trim_scale(\"amount\"::numeric)"));
    }

    #[test]
    fn test_other_column_casts_to_text() {
        let expr = PostgresDialect::new().render_column_expression(&col("id", "integer"));
        assert_eq!(expr, "coalesce(\"id\"::text, 'null')");
    }

    #[test]
    fn test_row_hash_query_concatenates_with_pipes() {
        let d = PostgresDialect::new();
        let sql = d.render_row_hash_query("public", "t", &["a".to_string(), "b".to_string()]);
        assert_eq!(sql, "SELECT md5(a || b) AS ROWHASH FROM \"public\".\"t\"");
    }

    #[test]
    fn test_aggregation_query_sums_four_chunks_with_empty_guard() {
        let sql = PostgresDialect::new().render_aggregation_query("SELECT 1");
        for start in [1, 9, 17, 25] {
            assert!(sql.contains(&format!("substring(t.ROWHASH, {}, 8)", start)));
        }
        assert!(sql.contains("count(*) AS NUMROWS"));
        assert!(sql.contains("'d41d8cd98f00b204e9800998ecf8427e') AS CHECKSUM"));
        assert!(sql.ends_with("FROM (SELECT 1) t"));
    }
}
