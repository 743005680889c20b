//! Live PostgreSQL schema reader over `pg_catalog`.

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use tracing::{debug, info};

use super::builder::{
    is_sequence_default, CheckDraft, ColumnDraft, ForeignKeyDraft, IndexDraft, SchemaBuilder,
    TableDraft,
};
use super::SchemaReader;
use crate::config::ConnectionConfig;
use crate::core::{FkAction, IssueCategory, IssueTarget, SourceDialect, SourceType};
use crate::error::{ConvertError, Result};
use crate::pg;

/// Reads tables from the configured schemas of a live database.
pub struct PostgresReader {
    connection: ConnectionConfig,
}

impl PostgresReader {
    pub fn new(connection: ConnectionConfig) -> Self {
        Self { connection }
    }

    async fn client(pool: &Pool, context: &str) -> Result<Object> {
        pool.get()
            .await
            .map_err(|e| ConvertError::pool(e, format!("getting connection for {}", context)))
    }

    async fn list_tables(&self, pool: &Pool) -> Result<Vec<(String, String)>> {
        let client = Self::client(pool, "list_tables").await?;
        let query = r#"
            SELECT n.nspname, c.relname
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relkind IN ('r', 'p')
              AND NOT c.relispartition
              AND n.nspname = ANY($1)
            ORDER BY n.nspname, c.relname
        "#;
        let rows = client.query(query, &[&self.connection.schemas]).await?;
        Ok(rows
            .iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect())
    }

    /// Views and materialized views cannot be converted; each becomes an issue.
    async fn report_views(&self, pool: &Pool, builder: &mut SchemaBuilder) -> Result<()> {
        let client = Self::client(pool, "list_views").await?;
        let query = r#"
            SELECT n.nspname, c.relname, c.relkind = 'm'
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relkind IN ('v', 'm')
              AND n.nspname = ANY($1)
            ORDER BY n.nspname, c.relname
        "#;
        for row in client.query(query, &[&self.connection.schemas]).await? {
            let schema: String = row.get(0);
            let name: String = row.get(1);
            let materialized: bool = row.get(2);
            builder.issue(
                IssueCategory::UnsupportedConstruct,
                IssueTarget::Schema,
                format!(
                    "Skipped {} {}.{}",
                    if materialized { "materialized view" } else { "view" },
                    schema,
                    name
                ),
            );
        }
        Ok(())
    }

    /// Load one table; also returns the names of partial indexes, which are not converted.
    async fn load_table(
        &self,
        pool: &Pool,
        schema: &str,
        name: &str,
    ) -> Result<(TableDraft, Vec<String>)> {
        let client = Self::client(pool, "load_table").await?;
        let mut draft = TableDraft::new(Some(schema.to_string()), name);

        let columns = r#"
            SELECT
                a.attname,
                pg_catalog.format_type(a.atttypid, a.atttypmod),
                NOT a.attnotnull,
                pg_catalog.pg_get_expr(d.adbin, d.adrelid),
                a.attgenerated::text,
                a.attidentity::text,
                (SELECT array_agg(e.enumlabel::text ORDER BY e.enumsortorder)
                   FROM pg_catalog.pg_enum e
                  WHERE e.enumtypid = a.atttypid)
            FROM pg_catalog.pg_attribute a
            JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
            WHERE n.nspname = $1 AND c.relname = $2
              AND a.attnum > 0 AND NOT a.attisdropped
            ORDER BY a.attnum
        "#;
        for row in client.query(columns, &[&schema, &name]).await? {
            let raw_type: String = row.get(1);
            let mut source_type = SourceType::parse(&raw_type);
            if let Some(labels) = row.get::<_, Option<Vec<String>>>(6) {
                source_type.name = "enum".to_string();
                source_type.values = labels;
            }

            let mut column = ColumnDraft::new(row.get::<_, String>(0), source_type);
            column.nullable = row.get(2);
            let expr: Option<String> = row.get(3);
            let generated: String = row.get(4);
            let identity: String = row.get(5);
            match expr {
                Some(e) if generated == "s" => column.generated = Some(e),
                Some(e) if is_sequence_default(&e) => column.identity = true,
                other => column.default = other,
            }
            if !identity.is_empty() {
                column.identity = true;
            }
            draft.columns.push(column);
        }

        let primary_key = r#"
            SELECT a.attname
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;
        draft.primary_key = client
            .query(primary_key, &[&schema, &name])
            .await?
            .iter()
            .map(|row| (row.get::<_, String>(0), false))
            .collect();

        // One row per key position; expression keys come back as their text
        let indexes = r#"
            SELECT
                i.relname,
                ix.indisunique,
                ix.indpred IS NOT NULL,
                pg_catalog.pg_get_indexdef(ix.indexrelid, k.ord, true),
                (ix.indoption[k.ord - 1]::int & 1) = 1
            FROM pg_catalog.pg_index ix
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            CROSS JOIN LATERAL generate_series(1, ix.indnkeyatts::int) AS k(ord)
            WHERE n.nspname = $1
              AND t.relname = $2
              AND NOT ix.indisprimary
            ORDER BY i.relname, k.ord
        "#;
        let mut partial = Vec::new();
        for row in client.query(indexes, &[&schema, &name]).await? {
            let index_name: String = row.get(0);
            if row.get::<_, bool>(2) {
                if !partial.contains(&index_name) {
                    partial.push(index_name);
                }
                continue;
            }
            let key = (unquote(&row.get::<_, String>(3)), row.get::<_, bool>(4));
            match draft.indexes.last_mut() {
                Some(last) if last.name.as_deref() == Some(index_name.as_str()) => {
                    last.columns.push(key)
                }
                _ => draft.indexes.push(IndexDraft {
                    name: Some(index_name),
                    columns: vec![key],
                    unique: row.get(1),
                }),
            }
        }

        let foreign_keys = r#"
            SELECT
                c.conname,
                array_agg(a.attname::text ORDER BY array_position(c.conkey, a.attnum)),
                rn.nspname,
                rt.relname,
                array_agg(ra.attname::text ORDER BY array_position(c.confkey, ra.attnum)),
                c.confdeltype::text,
                c.confupdtype::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
            JOIN pg_catalog.pg_namespace rn ON rn.oid = rt.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(c.conkey)
            JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid
                AND ra.attnum = c.confkey[array_position(c.conkey, a.attnum)]
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'f'
            GROUP BY c.conname, rn.nspname, rt.relname, c.confdeltype, c.confupdtype
            ORDER BY c.conname
        "#;
        for row in client.query(foreign_keys, &[&schema, &name]).await? {
            draft.foreign_keys.push(ForeignKeyDraft {
                name: Some(row.get(0)),
                columns: row.get(1),
                referenced_namespace: Some(row.get(2)),
                referenced_table: row.get(3),
                referenced_columns: row.get(4),
                on_delete: action_code(&row.get::<_, String>(5)),
                on_update: action_code(&row.get::<_, String>(6)),
            });
        }

        let checks = r#"
            SELECT c.conname, pg_catalog.pg_get_expr(c.conbin, c.conrelid)
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'c'
            ORDER BY c.conname
        "#;
        for row in client.query(checks, &[&schema, &name]).await? {
            draft.checks.push(CheckDraft {
                name: Some(row.get(0)),
                expr: strip_outer_parens(&row.get::<_, String>(1)),
            });
        }

        debug!(
            "Loaded {}.{}: {} columns, {} indexes, {} foreign keys, {} checks",
            schema,
            name,
            draft.columns.len(),
            draft.indexes.len(),
            draft.foreign_keys.len(),
            draft.checks.len()
        );
        Ok((draft, partial))
    }
}

#[async_trait]
impl SchemaReader for PostgresReader {
    fn dialect(&self) -> SourceDialect {
        SourceDialect::Postgres
    }

    async fn read(&mut self, builder: &mut SchemaBuilder) -> Result<()> {
        let pool = pg::connect(&self.connection, 2, "source").await?;
        let tables = self.list_tables(&pool).await?;
        info!(
            "Found {} tables in schemas {:?}",
            tables.len(),
            self.connection.schemas
        );

        for (schema, name) in &tables {
            if builder.should_stop() {
                break;
            }
            let (draft, partial) = self.load_table(&pool, schema, name).await?;
            if let Some(id) = builder.add_table(draft)? {
                for index in partial {
                    builder.issue(
                        IssueCategory::UnsupportedConstraint,
                        IssueTarget::Table { table: id },
                        format!("Partial index {} on {}.{} not converted.", index, schema, name),
                    );
                }
            }
        }

        if !builder.should_stop() {
            self.report_views(&pool, builder).await?;
        }
        Ok(())
    }
}

/// `pg_constraint.confdeltype` / `confupdtype` codes.
fn action_code(code: &str) -> FkAction {
    match code {
        "r" => FkAction::Restrict,
        "c" => FkAction::Cascade,
        "n" => FkAction::SetNull,
        "d" => FkAction::SetDefault,
        _ => FkAction::NoAction,
    }
}

fn unquote(ident: &str) -> String {
    match ident.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => ident.to_string(),
    }
}

/// `pg_get_expr` wraps check bodies in one pair of parentheses.
fn strip_outer_parens(expr: &str) -> String {
    let trimmed = expr.trim();
    if let Some(inner) = trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        let mut depth = 0i32;
        for c in inner.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return trimmed.to_string();
                    }
                }
                _ => {}
            }
        }
        if depth == 0 {
            return inner.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_code() {
        assert_eq!(action_code("a"), FkAction::NoAction);
        assert_eq!(action_code("r"), FkAction::Restrict);
        assert_eq!(action_code("c"), FkAction::Cascade);
        assert_eq!(action_code("n"), FkAction::SetNull);
        assert_eq!(action_code("d"), FkAction::SetDefault);
    }

    #[test]
    fn test_strip_outer_parens() {
        assert_eq!(strip_outer_parens("(price > (0)::numeric)"), "price > (0)::numeric");
        assert_eq!(strip_outer_parens("(a > 0) AND (b > 0)"), "(a > 0) AND (b > 0)");
        assert_eq!(strip_outer_parens("a > 0"), "a > 0");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"Order Id\""), "Order Id");
        assert_eq!(unquote("total"), "total");
        assert_eq!(unquote("lower(name)"), "lower(name)");
    }
}
