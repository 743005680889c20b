//! Schema dump reader for PostgreSQL (`pg_dump --schema-only`) and MySQL
//! (`mysqldump --no-data`) files.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlparser::ast::{
    AlterColumnOperation, AlterTableOperation, ColumnDef, ColumnOption, CreateIndex, CreateTable,
    Expr, ObjectName, ReferentialAction, Statement, TableConstraint,
};
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use tracing::{debug, info};

use super::builder::{
    is_sequence_default, CheckDraft, ColumnDraft, ForeignKeyDraft, IndexDraft, SchemaBuilder,
    TableDraft,
};
use super::splitter::{split_statements, RawStatement};
use super::SchemaReader;
use crate::core::{FkAction, IssueCategory, IssueTarget, SourceDialect, SourceType};
use crate::error::{ConvertError, Result};

/// What a statement is, decided from its leading keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    CreateTable,
    AlterTable,
    CreateIndex,
    CreateEnum,
    Unsupported(&'static str),
    Ignored,
}

fn classify(text: &str) -> StatementKind {
    let words: Vec<String> = text
        .split_whitespace()
        .take(8)
        .map(|w| w.to_uppercase())
        .collect();
    let w: Vec<&str> = words.iter().map(String::as_str).collect();

    match w.as_slice() {
        ["CREATE", "TABLE", ..]
        | ["CREATE", "UNLOGGED", "TABLE", ..]
        | ["CREATE", "TEMPORARY", "TABLE", ..] => StatementKind::CreateTable,
        ["ALTER", "TABLE", ..] => StatementKind::AlterTable,
        ["CREATE", "INDEX", ..] | ["CREATE", "UNIQUE", "INDEX", ..] => StatementKind::CreateIndex,
        ["CREATE", "TYPE", ..] if text.to_uppercase().contains("AS ENUM") => {
            StatementKind::CreateEnum
        }
        ["CREATE", rest @ ..] => {
            // CREATE OR REPLACE / ALGORITHM=... DEFINER=... prefixes
            let object = rest
                .iter()
                .find(|w| {
                    matches!(
                        **w,
                        "VIEW"
                            | "FUNCTION"
                            | "PROCEDURE"
                            | "TRIGGER"
                            | "TYPE"
                            | "DOMAIN"
                            | "RULE"
                            | "POLICY"
                            | "AGGREGATE"
                            | "EVENT"
                            | "MATERIALIZED"
                    )
                })
                .copied();
            match object {
                Some("VIEW") => StatementKind::Unsupported("view"),
                Some("MATERIALIZED") => StatementKind::Unsupported("materialized view"),
                Some("FUNCTION") => StatementKind::Unsupported("function"),
                Some("PROCEDURE") => StatementKind::Unsupported("procedure"),
                Some("TRIGGER") => StatementKind::Unsupported("trigger"),
                Some("TYPE") => StatementKind::Unsupported("type"),
                Some("DOMAIN") => StatementKind::Unsupported("domain"),
                Some("RULE") => StatementKind::Unsupported("rule"),
                Some("POLICY") => StatementKind::Unsupported("policy"),
                Some("AGGREGATE") => StatementKind::Unsupported("aggregate"),
                Some("EVENT") => StatementKind::Unsupported("event"),
                // SEQUENCE, SCHEMA, EXTENSION, DATABASE...
                _ => StatementKind::Ignored,
            }
        }
        _ => StatementKind::Ignored,
    }
}

/// Reads `CREATE TABLE`, `ALTER TABLE` and `CREATE INDEX` statements from a dump.
pub struct DumpReader {
    dialect: SourceDialect,
    path: PathBuf,
    enums: HashMap<String, Vec<String>>,
}

impl DumpReader {
    pub fn new(dialect: SourceDialect, path: impl Into<PathBuf>) -> Result<Self> {
        if dialect == SourceDialect::DynamoDb {
            return Err(ConvertError::Config(
                "dump reader handles postgres and mysql; use the dynamodb reader".into(),
            ));
        }
        Ok(Self {
            dialect,
            path: path.into(),
            enums: HashMap::new(),
        })
    }

    fn sql_dialect(&self) -> Box<dyn Dialect> {
        match self.dialect {
            SourceDialect::Mysql => Box::new(MySqlDialect {}),
            _ => Box::new(PostgreSqlDialect {}),
        }
    }

    /// Parse already-loaded dump text into `builder`.
    pub fn read_str(&mut self, sql: &str, builder: &mut SchemaBuilder) -> Result<()> {
        let statements = split_statements(sql, self.dialect);
        debug!("Dump contains {} statements", statements.len());

        for stmt in statements {
            if builder.should_stop() {
                break;
            }
            match classify(&stmt.text) {
                StatementKind::CreateTable => self.create_table(&stmt, builder)?,
                StatementKind::AlterTable => self.alter_table(&stmt, builder)?,
                StatementKind::CreateIndex => self.create_index(&stmt, builder),
                StatementKind::CreateEnum => self.create_enum(&stmt),
                StatementKind::Unsupported(what) => builder.issue(
                    IssueCategory::UnsupportedConstruct,
                    IssueTarget::Schema,
                    format!(
                        "Skipped {} at line {}: {}",
                        what,
                        stmt.line,
                        summarize(&stmt.text)
                    ),
                ),
                StatementKind::Ignored => {}
            }
        }
        Ok(())
    }

    fn parse(&self, stmt: &RawStatement) -> std::result::Result<Vec<Statement>, String> {
        self.parse_text(&stmt.text)
    }

    fn parse_text(&self, sql: &str) -> std::result::Result<Vec<Statement>, String> {
        Parser::parse_sql(self.sql_dialect().as_ref(), sql).map_err(|e| e.to_string())
    }

    /// Parse a `CREATE TABLE`, tolerating MySQL index definitions sqlparser
    /// cannot read. Returns the statements and one note per lost index detail.
    fn parse_create_table(&self, stmt: &RawStatement) -> Result<(Vec<Statement>, Vec<String>)> {
        let (text, prefixed) = match self.dialect {
            SourceDialect::Mysql => strip_prefix_lengths(&stmt.text),
            _ => (stmt.text.clone(), Vec::new()),
        };
        let mut notes: Vec<String> = prefixed
            .iter()
            .map(|column| {
                format!(
                    "Index prefix length on column '{}' dropped; the whole column is indexed",
                    column
                )
            })
            .collect();

        let first_error = match self.parse_text(&text) {
            Ok(parsed) => return Ok((parsed, notes)),
            Err(e) => e,
        };
        let fail = || {
            ConvertError::source_parse(
                format!("statement at line {} ({})", stmt.line, summarize(&stmt.text)),
                first_error.clone(),
            )
        };

        let (reduced, dropped) = drop_index_lines(&text);
        if dropped.is_empty() {
            return Err(fail());
        }
        let parsed = self.parse_text(&reduced).map_err(|_| fail())?;
        debug!(
            "Dropped {} unreadable index definitions at line {}",
            dropped.len(),
            stmt.line
        );
        notes.extend(
            dropped
                .into_iter()
                .map(|line| format!("Index definition '{}' could not be read", line)),
        );
        Ok((parsed, notes))
    }

    fn create_table(&self, stmt: &RawStatement, builder: &mut SchemaBuilder) -> Result<()> {
        let (parsed, notes) = self.parse_create_table(stmt)?;

        for statement in parsed {
            let Statement::CreateTable(CreateTable {
                name,
                columns,
                constraints,
                ..
            }) = statement
            else {
                continue;
            };
            let (namespace, table_name) = split_name(&name);
            let mut draft = TableDraft::new(namespace, table_name);
            let mut inline_fks = Vec::new();

            for column in &columns {
                let (col, extra) = self.column_draft(column);
                for item in extra {
                    match item {
                        InlineConstraint::PrimaryKey => {
                            draft.primary_key.push((col.name.clone(), false))
                        }
                        InlineConstraint::Unique => draft.indexes.push(IndexDraft {
                            name: None,
                            columns: vec![(col.name.clone(), false)],
                            unique: true,
                        }),
                        InlineConstraint::Check(expr) => draft.checks.push(CheckDraft {
                            name: None,
                            expr,
                        }),
                        InlineConstraint::ForeignKey(fk) => inline_fks.push(fk),
                    }
                }
                draft.columns.push(col);
            }
            draft.foreign_keys.extend(inline_fks);

            let mut unsupported = Vec::new();
            for constraint in &constraints {
                if let Err(what) = apply_table_constraint(&mut draft, constraint) {
                    unsupported.push(what);
                }
            }

            let table_name = draft.name.clone();
            if let Some(id) = builder.add_table(draft)? {
                for what in unsupported {
                    builder.issue(
                        IssueCategory::UnsupportedConstraint,
                        IssueTarget::Table { table: id },
                        format!("{} on {} not converted.", what, table_name),
                    );
                }
                for note in &notes {
                    builder.issue(
                        IssueCategory::UnsupportedConstraint,
                        IssueTarget::Table { table: id },
                        format!("{} on {}.", note, table_name),
                    );
                }
            }
        }
        Ok(())
    }

    fn column_draft(&self, column: &ColumnDef) -> (ColumnDraft, Vec<InlineConstraint>) {
        let mut source_type = SourceType::parse(&column.data_type.to_string());
        if let Some(values) = self.enums.get(&bare_type_name(&source_type.name)) {
            source_type = SourceType {
                name: "enum".to_string(),
                values: values.clone(),
                ..source_type
            };
        }

        let mut draft = ColumnDraft::new(column.name.value.clone(), source_type);
        if matches!(
            draft.source_type.name.as_str(),
            "serial" | "serial2" | "serial4" | "serial8" | "smallserial" | "bigserial"
        ) {
            draft.identity = true;
            draft.nullable = false;
        }

        let mut extra = Vec::new();
        for def in &column.options {
            match &def.option {
                ColumnOption::Null => draft.nullable = true,
                ColumnOption::NotNull => draft.nullable = false,
                ColumnOption::Default(expr) => {
                    let text = expr.to_string();
                    if is_sequence_default(&text) {
                        draft.identity = true;
                    } else {
                        draft.default = Some(text);
                    }
                }
                ColumnOption::Unique { is_primary, .. } => {
                    if *is_primary {
                        draft.nullable = false;
                        extra.push(InlineConstraint::PrimaryKey);
                    } else {
                        extra.push(InlineConstraint::Unique);
                    }
                }
                ColumnOption::ForeignKey {
                    foreign_table,
                    referred_columns,
                    on_delete,
                    on_update,
                    ..
                } => {
                    let (ns, table) = split_name(foreign_table);
                    extra.push(InlineConstraint::ForeignKey(ForeignKeyDraft {
                        name: None,
                        columns: vec![column.name.value.clone()],
                        referenced_namespace: ns,
                        referenced_table: table,
                        referenced_columns: referred_columns
                            .iter()
                            .map(|i| i.value.clone())
                            .collect(),
                        on_delete: fk_action(on_delete.as_ref()),
                        on_update: fk_action(on_update.as_ref()),
                    }));
                }
                ColumnOption::Check(expr) => extra.push(InlineConstraint::Check(expr.to_string())),
                ColumnOption::Generated {
                    generation_expr, ..
                } => match generation_expr {
                    Some(expr) => draft.generated = Some(expr.to_string()),
                    None => draft.identity = true,
                },
                other => {
                    if other.to_string().to_uppercase().contains("AUTO_INCREMENT") {
                        draft.identity = true;
                    }
                }
            }
        }
        (draft, extra)
    }

    fn alter_table(&self, stmt: &RawStatement, builder: &mut SchemaBuilder) -> Result<()> {
        let upper = stmt.text.to_uppercase();

        // Identity clauses sqlparser may not accept are handled textually
        if upper.contains(" ADD GENERATED ") {
            if let (Some(table), Some(column)) = (
                word_after(&stmt.text, &["TABLE", "ONLY"]),
                word_after(&stmt.text, &["COLUMN"]),
            ) {
                let (ns, name) = split_dotted(&table);
                match builder.lookup(ns.as_deref(), &name) {
                    Some(id) => builder.set_identity(id, &column),
                    None => self.missing_table(builder, stmt, &name),
                }
            }
            return Ok(());
        }

        let relevant = ["ADD CONSTRAINT", "ADD PRIMARY KEY", "ADD FOREIGN KEY", "ADD UNIQUE", "ADD CHECK", "ADD INDEX", "ADD KEY", "SET DEFAULT"];
        if !relevant.iter().any(|k| upper.contains(k)) {
            return Ok(());
        }

        let parsed = match self.parse(stmt) {
            Ok(parsed) => parsed,
            Err(e) => {
                builder.issue(
                    IssueCategory::UnsupportedConstruct,
                    IssueTarget::Schema,
                    format!(
                        "Could not parse ALTER TABLE at line {}: {}",
                        stmt.line, e
                    ),
                );
                return Ok(());
            }
        };

        for statement in parsed {
            let Statement::AlterTable {
                name, operations, ..
            } = statement
            else {
                continue;
            };
            let (ns, table_name) = split_name(&name);
            let Some(id) = builder.lookup(ns.as_deref(), &table_name) else {
                self.missing_table(builder, stmt, &table_name);
                continue;
            };

            for op in operations {
                match op {
                    AlterTableOperation::AddConstraint(constraint) => {
                        let mut draft = TableDraft::new(ns.clone(), table_name.clone());
                        if let Err(what) = apply_table_constraint(&mut draft, &constraint) {
                            builder.issue(
                                IssueCategory::UnsupportedConstraint,
                                IssueTarget::Table { table: id },
                                format!("{} on {} not converted.", what, table_name),
                            );
                            continue;
                        }
                        if !draft.primary_key.is_empty() {
                            builder.set_primary_key(id, &draft.primary_key)?;
                        }
                        for index in draft.indexes {
                            builder.add_index(id, index);
                        }
                        for fk in draft.foreign_keys {
                            builder.add_foreign_key(id, fk);
                        }
                        for check in draft.checks {
                            builder.add_check(id, check);
                        }
                    }
                    AlterTableOperation::AlterColumn {
                        column_name,
                        op: AlterColumnOperation::SetDefault { value },
                    } => builder.set_column_default(id, &column_name.value, value.to_string()),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn create_index(&self, stmt: &RawStatement, builder: &mut SchemaBuilder) {
        let parsed = match self.parse(stmt) {
            Ok(parsed) => parsed,
            Err(e) => {
                builder.issue(
                    IssueCategory::UnsupportedConstruct,
                    IssueTarget::Schema,
                    format!("Could not parse CREATE INDEX at line {}: {}", stmt.line, e),
                );
                return;
            }
        };

        for statement in parsed {
            let Statement::CreateIndex(CreateIndex {
                name,
                table_name,
                columns,
                unique,
                ..
            }) = statement
            else {
                continue;
            };
            let (ns, table) = split_name(&table_name);
            let Some(id) = builder.lookup(ns.as_deref(), &table) else {
                self.missing_table(builder, stmt, &table);
                continue;
            };
            let columns = columns
                .iter()
                .map(|c| {
                    let name = match &c.expr {
                        Expr::Identifier(ident) => ident.value.clone(),
                        other => other.to_string(),
                    };
                    (name, c.asc == Some(false))
                })
                .collect();
            builder.add_index(
                id,
                IndexDraft {
                    name: name.as_ref().map(|n| split_name(n).1),
                    columns,
                    unique,
                },
            );
        }
    }

    /// `CREATE TYPE mood AS ENUM ('sad', 'ok')`
    fn create_enum(&mut self, stmt: &RawStatement) {
        let Some(name) = word_after(&stmt.text, &["TYPE"]) else {
            return;
        };
        let (Some(open), Some(close)) = (stmt.text.find('('), stmt.text.rfind(')')) else {
            return;
        };
        let parsed = SourceType::parse(&format!("enum{}", &stmt.text[open..=close]));
        let (_, bare) = split_dotted(&name);
        debug!("Enum type {} with {} labels", bare, parsed.values.len());
        self.enums.insert(bare.to_lowercase(), parsed.values);
    }

    fn missing_table(&self, builder: &mut SchemaBuilder, stmt: &RawStatement, table: &str) {
        builder.issue(
            IssueCategory::MissingReference,
            IssueTarget::Schema,
            format!(
                "Statement at line {} refers to unknown table '{}': {}",
                stmt.line,
                table,
                summarize(&stmt.text)
            ),
        );
    }
}

#[async_trait]
impl SchemaReader for DumpReader {
    fn dialect(&self) -> SourceDialect {
        self.dialect
    }

    async fn read(&mut self, builder: &mut SchemaBuilder) -> Result<()> {
        info!("Reading {} dump {}", self.dialect, self.path.display());
        let bytes = tokio::fs::read(&self.path).await?;

        let audit = builder.audit_mut();
        audit.bytes_read = bytes.len() as u64;
        audit.source_digest = Some(hex::encode(Sha256::digest(&bytes)));

        let sql = String::from_utf8_lossy(&bytes);
        self.read_str(&sql, builder)?;
        info!("Read {} tables from dump", builder.table_count());
        Ok(())
    }
}

enum InlineConstraint {
    PrimaryKey,
    Unique,
    Check(String),
    ForeignKey(ForeignKeyDraft),
}

/// Fold a table-level constraint into the draft; `Err` names what is unsupported.
fn apply_table_constraint(
    draft: &mut TableDraft,
    constraint: &TableConstraint,
) -> std::result::Result<(), String> {
    match constraint {
        TableConstraint::PrimaryKey { columns, .. } => {
            draft.primary_key = columns.iter().map(|c| (c.value.clone(), false)).collect();
        }
        TableConstraint::Unique {
            name,
            index_name,
            columns,
            ..
        } => draft.indexes.push(IndexDraft {
            name: index_name.as_ref().or(name.as_ref()).map(|i| i.value.clone()),
            columns: columns.iter().map(|c| (c.value.clone(), false)).collect(),
            unique: true,
        }),
        TableConstraint::Index { name, columns, .. } => draft.indexes.push(IndexDraft {
            name: name.as_ref().map(|i| i.value.clone()),
            columns: columns.iter().map(|c| (c.value.clone(), false)).collect(),
            unique: false,
        }),
        TableConstraint::ForeignKey {
            name,
            columns,
            foreign_table,
            referred_columns,
            on_delete,
            on_update,
            ..
        } => {
            let (ns, table) = split_name(foreign_table);
            draft.foreign_keys.push(ForeignKeyDraft {
                name: name.as_ref().map(|i| i.value.clone()),
                columns: columns.iter().map(|c| c.value.clone()).collect(),
                referenced_namespace: ns,
                referenced_table: table,
                referenced_columns: referred_columns.iter().map(|c| c.value.clone()).collect(),
                on_delete: fk_action(on_delete.as_ref()),
                on_update: fk_action(on_update.as_ref()),
            });
        }
        TableConstraint::Check { name, expr } => draft.checks.push(CheckDraft {
            name: name.as_ref().map(|i| i.value.clone()),
            expr: expr.to_string(),
        }),
        other => return Err(format!("Constraint '{}'", other)),
    }
    Ok(())
}

fn fk_action(action: Option<&ReferentialAction>) -> FkAction {
    action
        .and_then(|a| FkAction::parse(&a.to_string()))
        .unwrap_or_default()
}

/// `(namespace, name)` from a possibly qualified object name.
fn split_name(name: &ObjectName) -> (Option<String>, String) {
    let parts: Vec<&str> = name.0.iter().map(|i| i.value.as_str()).collect();
    match parts.as_slice() {
        [] => (None, String::new()),
        [only] => (None, only.to_string()),
        [.., ns, table] => (Some(ns.to_string()), table.to_string()),
    }
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '`').to_string()
}

/// Split `schema.name` text, unquoting each part.
fn split_dotted(name: &str) -> (Option<String>, String) {
    match name.rsplit_once('.') {
        Some((ns, n)) => (Some(strip_quotes(ns)), strip_quotes(n)),
        None => (None, strip_quotes(name)),
    }
}

/// Type name without schema qualification or quotes, lower-cased.
fn bare_type_name(name: &str) -> String {
    split_dotted(name).1.to_lowercase()
}

/// The word following the first of `keywords` (later keywords refine), e.g.
/// the table in `ALTER TABLE ONLY public.t`.
fn word_after(text: &str, keywords: &[&str]) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut pos = None;
    for (i, w) in words.iter().enumerate() {
        if keywords.iter().any(|k| w.eq_ignore_ascii_case(k)) {
            pos = Some(i);
            if !words
                .get(i + 1)
                .is_some_and(|n| keywords.iter().any(|k| n.eq_ignore_ascii_case(k)))
            {
                break;
            }
        }
    }
    pos.and_then(|i| words.get(i + 1))
        .map(|w| w.trim_end_matches(|c| c == '(' || c == ',').to_string())
}

/// Remove MySQL index prefix lengths (`` `name`(10) ``), returning the
/// rewritten text and the affected column names. Column types are never
/// backtick-quoted in dumps, so `varchar(10)` is left alone.
fn strip_prefix_lengths(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut columns = Vec::new();
    let mut rest = sql;
    while let Some(pos) = rest.find("`(") {
        // `head` ends with the closing backtick, `tail` starts at '('
        let (head, tail) = rest.split_at(pos + 1);
        let digits = tail[1..].chars().take_while(|c| c.is_ascii_digit()).count();
        out.push_str(head);
        if digits > 0 && tail[1 + digits..].starts_with(')') {
            let quoted = &head[..head.len() - 1];
            if let Some(open) = quoted.rfind('`') {
                columns.push(quoted[open + 1..].to_string());
            }
            rest = &tail[digits + 2..];
        } else {
            rest = tail;
        }
    }
    out.push_str(rest);
    (out, columns)
}

/// Drop secondary index lines from a multi-line `CREATE TABLE`, fixing up
/// the comma left before the closing parenthesis.
fn drop_index_lines(sql: &str) -> (String, Vec<String>) {
    const INDEX_PREFIXES: [&str; 6] = [
        "KEY ",
        "INDEX ",
        "UNIQUE KEY ",
        "UNIQUE INDEX ",
        "FULLTEXT ",
        "SPATIAL ",
    ];
    let mut kept: Vec<String> = Vec::new();
    let mut dropped = Vec::new();
    for line in sql.lines() {
        let trimmed = line.trim();
        let upper = trimmed.to_uppercase();
        let is_index = INDEX_PREFIXES.iter().any(|p| upper.starts_with(p));
        if is_index {
            dropped.push(trimmed.trim_end_matches(',').to_string());
            continue;
        }
        if trimmed.starts_with(')') {
            if let Some(prev) = kept.iter_mut().rev().find(|l| !l.trim().is_empty()) {
                let without = prev.trim_end().trim_end_matches(',').to_string();
                *prev = without;
            }
        }
        kept.push(line.to_string());
    }
    (kept.join("\n"), dropped)
}

fn summarize(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 80 {
        format!("{}...", flat.chars().take(77).collect::<String>())
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameCollisionPolicy;
    use crate::core::{Conv, TargetDialect};
    use tokio_util::sync::CancellationToken;

    fn read(dialect: SourceDialect, sql: &str) -> Result<Conv> {
        let mut builder = SchemaBuilder::new(
            dialect,
            TargetDialect::GoogleSql,
            NameCollisionPolicy::Rename,
            CancellationToken::new(),
        );
        let mut reader = DumpReader::new(dialect, "unused.sql")?;
        reader.read_str(sql, &mut builder)?;
        Ok(builder.finish())
    }

    const PG_DUMP: &str = r#"
--
-- PostgreSQL database dump
--
SET statement_timeout = 0;
CREATE TYPE public.order_status AS ENUM ('new', 'paid', 'shipped');

CREATE TABLE public.customers (
    id integer NOT NULL,
    email character varying(255) NOT NULL,
    created_at timestamp with time zone DEFAULT now()
);

CREATE TABLE public.orders (
    id bigint NOT NULL,
    customer_id integer,
    status public.order_status DEFAULT 'new'::public.order_status,
    total numeric(10,2),
    CONSTRAINT orders_total_check CHECK ((total > (0)::numeric))
);

CREATE SEQUENCE public.orders_id_seq START WITH 1;
ALTER TABLE ONLY public.orders ALTER COLUMN id SET DEFAULT nextval('public.orders_id_seq'::regclass);

COPY public.orders (id, customer_id) FROM stdin;
1	1
\.

ALTER TABLE ONLY public.customers
    ADD CONSTRAINT customers_pkey PRIMARY KEY (id);
ALTER TABLE ONLY public.orders
    ADD CONSTRAINT orders_pkey PRIMARY KEY (id);
CREATE UNIQUE INDEX customers_email_key ON public.customers USING btree (email);
CREATE INDEX orders_total_idx ON public.orders USING btree (total DESC);
ALTER TABLE ONLY public.orders
    ADD CONSTRAINT orders_customer_id_fkey FOREIGN KEY (customer_id) REFERENCES public.customers(id) ON DELETE CASCADE;

CREATE VIEW public.big_orders AS SELECT * FROM public.orders WHERE total > 100;
"#;

    #[test]
    fn test_classify() {
        assert_eq!(classify("create table t (a int)"), StatementKind::CreateTable);
        assert_eq!(classify("CREATE UNIQUE INDEX i ON t (a)"), StatementKind::CreateIndex);
        assert_eq!(
            classify("CREATE OR REPLACE VIEW v AS SELECT 1"),
            StatementKind::Unsupported("view")
        );
        assert_eq!(
            classify("CREATE ALGORITHM=UNDEFINED DEFINER=`root`@`%` VIEW v AS SELECT 1"),
            StatementKind::Unsupported("view")
        );
        assert_eq!(classify("CREATE SEQUENCE s"), StatementKind::Ignored);
        assert_eq!(classify("INSERT INTO t VALUES (1)"), StatementKind::Ignored);
        assert_eq!(
            classify("CREATE TYPE mood AS ENUM ('a')"),
            StatementKind::CreateEnum
        );
    }

    #[test]
    fn test_postgres_dump() {
        let conv = read(SourceDialect::Postgres, PG_DUMP).unwrap();
        conv.validate().unwrap();
        assert_eq!(conv.tables.len(), 2);

        let customers = conv.table_by_name("customers").unwrap();
        assert_eq!(customers.namespace.as_deref(), Some("public"));
        assert_eq!(customers.primary_key.len(), 1);
        assert!(customers.indexes[0].unique);
        assert_eq!(
            customers.columns[2].default.as_ref().unwrap().source,
            "now()"
        );

        let orders = conv.table_by_name("orders").unwrap();
        let id = orders.column_by_name("id").unwrap();
        assert!(id.identity);
        assert!(id.default.is_none());
        let status = orders.column_by_name("status").unwrap();
        assert_eq!(status.source_type.name, "enum");
        assert_eq!(status.source_type.values, vec!["new", "paid", "shipped"]);
        assert_eq!(orders.checks.len(), 1);
        assert_eq!(orders.checks[0].name, "orders_total_check");
        assert!(orders.indexes[0].keys[0].desc);

        let fk = &orders.foreign_keys[0];
        assert_eq!(fk.name, "orders_customer_id_fkey");
        assert_eq!(fk.referenced_table, customers.id);
        assert_eq!(fk.on_delete.source, FkAction::Cascade);

        assert_eq!(conv.issue_counts()[&IssueCategory::UnsupportedConstruct], 1);
    }

    #[test]
    fn test_mysql_dump() {
        let sql = r#"
/*!40101 SET NAMES utf8mb4 */;
DROP TABLE IF EXISTS `users`;
CREATE TABLE `users` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `name` varchar(100) DEFAULT NULL,
  `active` tinyint(1) NOT NULL DEFAULT '1',
  `role` enum('admin','user') NOT NULL,
  PRIMARY KEY (`id`),
  UNIQUE KEY `users_name_uk` (`name`),
  KEY `users_active_idx` (`active`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

CREATE TABLE `posts` (
  `id` bigint NOT NULL,
  `user_id` int(11) DEFAULT NULL,
  PRIMARY KEY (`id`),
  CONSTRAINT `posts_user_fk` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE SET NULL
) ENGINE=InnoDB;
INSERT INTO `users` VALUES (1,'a;b',1,'admin');
"#;
        let conv = read(SourceDialect::Mysql, sql).unwrap();
        conv.validate().unwrap();
        let users = conv.table_by_name("users").unwrap();
        assert!(users.columns[0].identity);
        assert_eq!(users.columns[3].source_type.values, vec!["admin", "user"]);
        assert_eq!(users.indexes.len(), 2);
        assert_eq!(users.indexes[0].name, "users_name_uk");
        assert!(users.indexes[0].unique);
        assert!(!users.indexes[1].unique);

        let posts = conv.table_by_name("posts").unwrap();
        assert_eq!(posts.foreign_keys[0].on_delete.source, FkAction::SetNull);
        assert!(conv.issues.is_empty());
    }

    #[test]
    fn test_mysql_prefix_index_kept_with_issue() {
        let sql = "CREATE TABLE `users` (\n  `id` int NOT NULL,\n  `name` varchar(255) DEFAULT NULL,\n  PRIMARY KEY (`id`),\n  KEY `users_name_idx` (`name`(10))\n) ENGINE=InnoDB;";
        let conv = read(SourceDialect::Mysql, sql).unwrap();
        let users = conv.table_by_name("users").unwrap();
        assert_eq!(users.primary_key.len(), 1);
        assert_eq!(users.indexes.len(), 1);
        assert_eq!(users.indexes[0].name, "users_name_idx");

        assert_eq!(conv.issues.len(), 1);
        assert_eq!(conv.issues[0].category, IssueCategory::UnsupportedConstraint);
        assert!(conv.issues[0].detail.contains("prefix length on column 'name'"));
    }

    #[test]
    fn test_mysql_unreadable_index_dropped_with_issue() {
        let sql = "CREATE TABLE `posts` (\n  `id` int NOT NULL,\n  `body` text,\n  PRIMARY KEY (`id`),\n  KEY `posts_lower_idx` ((lower(`body`)))\n) ENGINE=InnoDB;\nCREATE TABLE `tags` (`id` int NOT NULL, PRIMARY KEY (`id`));";
        let conv = read(SourceDialect::Mysql, sql).unwrap();
        assert_eq!(conv.tables.len(), 2);
        let posts = conv.table_by_name("posts").unwrap();
        assert_eq!(posts.primary_key.len(), 1);
        assert!(posts.indexes.is_empty());
        assert_eq!(conv.issues.len(), 1);
        assert!(conv.issues[0].detail.contains("posts_lower_idx"));
    }

    #[test]
    fn test_mysql_trigger_block_is_reported() {
        let sql = r#"
CREATE TABLE `users` (`id` int NOT NULL, `name` varchar(50), PRIMARY KEY (`id`));
/*!50003 SET @saved_cs_client = @@character_set_client */ ;
DELIMITER ;;
/*!50003 CREATE*/ /*!50017 DEFINER=`root`@`localhost`*/ /*!50003 TRIGGER `users_bi` BEFORE INSERT ON `users` FOR EACH ROW BEGIN
  SET NEW.name = LOWER(NEW.name);
END */;;
DELIMITER ;
CREATE TABLE `audit` (`id` int NOT NULL, PRIMARY KEY (`id`));
"#;
        let conv = read(SourceDialect::Mysql, sql).unwrap();
        assert_eq!(conv.tables.len(), 2);
        assert_eq!(conv.issues.len(), 1);
        assert_eq!(conv.issues[0].category, IssueCategory::UnsupportedConstruct);
        assert!(conv.issues[0].detail.contains("Skipped trigger at line 5"));
    }

    #[test]
    fn test_strip_prefix_lengths() {
        let (text, columns) =
            strip_prefix_lengths("KEY `k` (`a`(10),`b`), `c` varchar(20), `d`(x)");
        assert_eq!(text, "KEY `k` (`a`,`b`), `c` varchar(20), `d`(x)");
        assert_eq!(columns, vec!["a"]);
    }

    #[test]
    fn test_unparseable_create_table_is_source_parse_error() {
        let err = read(
            SourceDialect::Postgres,
            "CREATE TABLE ok (id int);\nCREATE TABLE broken (id int,, name);",
        )
        .unwrap_err();
        match err {
            ConvertError::SourceParse { object, .. } => {
                assert!(object.contains("line 2"));
                assert!(object.contains("broken"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_add_generated_identity() {
        let sql = "CREATE TABLE public.t (id integer NOT NULL);\n\
                   ALTER TABLE public.t ALTER COLUMN id ADD GENERATED BY DEFAULT AS IDENTITY (SEQUENCE NAME public.t_id_seq START WITH 1);";
        let conv = read(SourceDialect::Postgres, sql).unwrap();
        assert!(conv.table_by_name("t").unwrap().columns[0].identity);
    }

    #[test]
    fn test_inline_references() {
        let sql = "CREATE TABLE a (id int PRIMARY KEY);\n\
                   CREATE TABLE b (id int PRIMARY KEY, a_id int REFERENCES a (id) ON UPDATE CASCADE, qty int CHECK (qty > 0) UNIQUE);";
        let conv = read(SourceDialect::Postgres, sql).unwrap();
        let b = conv.table_by_name("b").unwrap();
        assert_eq!(b.foreign_keys.len(), 1);
        assert_eq!(b.foreign_keys[0].on_update.source, FkAction::Cascade);
        assert_eq!(b.checks[0].expr.source, "qty > 0");
        assert_eq!(b.indexes[0].name, "b_qty_key");
    }

    #[test]
    fn test_word_after() {
        assert_eq!(
            word_after("ALTER TABLE ONLY public.t ALTER COLUMN id ADD", &["TABLE", "ONLY"]),
            Some("public.t".to_string())
        );
        assert_eq!(
            word_after("ALTER TABLE t ALTER COLUMN id ADD", &["COLUMN"]),
            Some("id".to_string())
        );
    }
}
