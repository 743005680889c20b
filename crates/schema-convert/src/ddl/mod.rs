//! DDL script generation for the target.
//!
//! Tables first, then indexes, then foreign keys as `ALTER TABLE`, so the
//! script applies in order regardless of reference cycles. Expressions the
//! target rejected are kept as comments above their table.

use crate::core::identifier::quote_ident;
use crate::core::{
    Column, Conv, Expression, FkAction, ForeignKey, Index, KeyPart, Table, TargetDialect,
    TargetType, VerificationStatus,
};
use crate::error::Result;
use crate::verify::Translator;

/// Renders a mapped model as DDL for one target dialect.
pub struct DdlEmitter {
    dialect: TargetDialect,
    translator: Translator,
}

impl DdlEmitter {
    pub fn new(conv: &Conv) -> Self {
        Self::for_dialect(conv, conv.target_dialect)
    }

    /// Emit for a dialect other than the one the model was mapped for.
    pub fn for_dialect(conv: &Conv, dialect: TargetDialect) -> Self {
        Self {
            dialect,
            translator: Translator::new(conv.source_dialect, dialect),
        }
    }

    /// Full script, statements separated by blank lines.
    pub fn emit(&self, conv: &Conv) -> Result<String> {
        let mut out = format!(
            "-- Generated by schema-convert {} ({} -> {})\n-- Request: {}\n",
            env!("CARGO_PKG_VERSION"),
            conv.source_dialect,
            self.dialect.as_str(),
            conv.audit.migration_request_id
        );
        if conv.is_partial() {
            out.push_str("-- WARNING: partial model; some tables or checks are missing\n");
        }
        for statement in self.statements(conv)? {
            out.push('\n');
            out.push_str(&statement);
            out.push_str(";\n");
        }
        Ok(out)
    }

    /// Individual statements, without terminators. Comment lines precede
    /// the statement they concern.
    pub fn statements(&self, conv: &Conv) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for table in conv.tables.values() {
            statements.push(self.create_table(table)?);
        }
        for table in conv.tables.values() {
            for index in &table.indexes {
                statements.push(self.create_index(table, index)?);
            }
        }
        for table in conv.tables.values() {
            for fk in &table.foreign_keys {
                if let Some(parent) = conv.table(fk.referenced_table) {
                    statements.push(self.create_foreign_key(table, parent, fk)?);
                }
            }
        }
        Ok(statements)
    }

    fn q(&self, name: &str) -> Result<String> {
        quote_ident(self.dialect, name)
    }

    /// Text to emit for an expression, or `None` when it was rejected.
    fn expression_text(&self, expr: &Expression, table: &Table) -> Option<String> {
        match expr.status {
            VerificationStatus::Verified => Some(expr.text().to_string()),
            VerificationStatus::Unverified => Some(self.translator.translate(&expr.source, table)),
            VerificationStatus::Rejected => None,
        }
    }

    fn rejected_note(what: &str, expr: &Expression) -> String {
        format!(
            "-- rejected: {}: {} ({})\n",
            what,
            single_line(&expr.source),
            single_line(expr.rejection.as_deref().unwrap_or("no detail"))
        )
    }

    fn column_def(&self, table: &Table, column: &Column, notes: &mut String) -> Result<String> {
        let fallback = TargetType::string(None);
        let ty = column.target_type.as_ref().unwrap_or(&fallback);
        let mut def = format!("{} {}", self.q(&column.name)?, ty.render(self.dialect));
        if !column.nullable {
            def.push_str(" NOT NULL");
        }

        if let Some(generated) = &column.generated {
            match self.expression_text(generated, table) {
                Some(text) => match self.dialect {
                    TargetDialect::GoogleSql => def.push_str(&format!(" AS ({}) STORED", text)),
                    TargetDialect::Postgresql => {
                        def.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", text))
                    }
                },
                None => notes.push_str(&Self::rejected_note(
                    &format!("{}.{} generated as", table.name, column.name),
                    generated,
                )),
            }
        } else if let Some(default) = &column.default {
            match self.expression_text(default, table) {
                Some(text) => def.push_str(&format!(" DEFAULT ({})", text)),
                None => notes.push_str(&Self::rejected_note(
                    &format!("{}.{} default", table.name, column.name),
                    default,
                )),
            }
        }
        Ok(def)
    }

    fn key_list(&self, table: &Table, keys: &[KeyPart], directions: bool) -> Result<String> {
        let parts = keys
            .iter()
            .map(|k| {
                let name = self.q(table.column_name(k.column))?;
                Ok(if directions && k.desc {
                    format!("{} DESC", name)
                } else {
                    name
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(", "))
    }

    /// `CREATE TABLE` with columns, checks and primary key.
    pub fn create_table(&self, table: &Table) -> Result<String> {
        let mut notes = String::new();
        let mut items = Vec::with_capacity(table.columns.len() + table.checks.len() + 1);
        for column in &table.columns {
            items.push(self.column_def(table, column, &mut notes)?);
        }
        for check in &table.checks {
            match self.expression_text(&check.expr, table) {
                Some(text) => items.push(format!(
                    "CONSTRAINT {} CHECK ({})",
                    self.q(&check.name)?,
                    text
                )),
                None => notes.push_str(&Self::rejected_note(
                    &format!("{} check {}", table.name, check.name),
                    &check.expr,
                )),
            }
        }

        let name = self.q(&table.name)?;
        Ok(match self.dialect {
            // Key order is part of the physical layout; DESC is honored.
            TargetDialect::GoogleSql => format!(
                "{}CREATE TABLE {} (\n    {}\n) PRIMARY KEY ({})",
                notes,
                name,
                items.join(",\n    "),
                self.key_list(table, &table.primary_key, true)?
            ),
            TargetDialect::Postgresql => {
                if table.has_pk() {
                    items.push(format!(
                        "PRIMARY KEY ({})",
                        self.key_list(table, &table.primary_key, false)?
                    ));
                }
                format!(
                    "{}CREATE TABLE {} (\n    {}\n)",
                    notes,
                    name,
                    items.join(",\n    ")
                )
            }
        })
    }

    pub fn create_index(&self, table: &Table, index: &Index) -> Result<String> {
        let unique = if index.unique { "UNIQUE " } else { "" };
        Ok(format!(
            "CREATE {}INDEX {} ON {} ({})",
            unique,
            self.q(&index.name)?,
            self.q(&table.name)?,
            self.key_list(table, &index.keys, true)?
        ))
    }

    pub fn create_foreign_key(
        &self,
        table: &Table,
        parent: &Table,
        fk: &ForeignKey,
    ) -> Result<String> {
        let columns = fk
            .columns
            .iter()
            .map(|c| self.q(table.column_name(*c)))
            .collect::<Result<Vec<_>>>()?;
        let referenced = fk
            .referenced_columns
            .iter()
            .map(|c| self.q(parent.column_name(*c)))
            .collect::<Result<Vec<_>>>()?;

        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.q(&table.name)?,
            self.q(&fk.name)?,
            columns.join(", "),
            self.q(&parent.name)?,
            referenced.join(", ")
        );
        let on_delete = fk.on_delete.effective();
        if on_delete != FkAction::NoAction {
            sql.push_str(&format!(" ON DELETE {}", on_delete.sql()));
        }
        // GoogleSQL has no ON UPDATE clause; NO ACTION is implied.
        let on_update = fk.on_update.effective();
        if self.dialect == TargetDialect::Postgresql && on_update != FkAction::NoAction {
            sql.push_str(&format!(" ON UPDATE {}", on_update.sql()));
        }
        Ok(sql)
    }
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CheckConstraint, FkPolicy, SourceDialect, SourceType};
    use crate::mapper::Mapper;

    fn model(target: TargetDialect) -> Conv {
        let mut conv = Conv::new(SourceDialect::Postgres, target);

        let parent = conv.alloc_table_id();
        let mut t = Table::new(parent, "customers");
        let id = conv.alloc_column_id();
        t.columns.push(Column::new(id, "id", SourceType::parse("bigint")));
        let email = conv.alloc_column_id();
        t.columns.push(Column::new(email, "email", SourceType::parse("varchar(255)")));
        t.primary_key = vec![KeyPart::asc(id)];
        let idx = conv.alloc_index_id();
        t.indexes.push(Index {
            id: idx,
            name: "customers_email_key".to_string(),
            keys: vec![KeyPart::asc(email)],
            unique: true,
        });
        conv.tables.insert(parent, t);

        let child = conv.alloc_table_id();
        let mut t = Table::new(child, "orders");
        let oid = conv.alloc_column_id();
        let mut c = Column::new(oid, "id", SourceType::parse("bigint"));
        c.nullable = false;
        t.columns.push(c);
        let cust = conv.alloc_column_id();
        t.columns.push(Column::new(cust, "customer_id", SourceType::parse("bigint")));
        let total = conv.alloc_column_id();
        let mut c = Column::new(total, "total", SourceType::parse("numeric(10,2)"));
        c.default = Some(Expression::new("0"));
        t.columns.push(c);
        t.primary_key = vec![KeyPart::asc(oid)];
        let ck = conv.alloc_check_id();
        t.checks.push(CheckConstraint {
            id: ck,
            name: "orders_total_check".to_string(),
            expr: Expression::new("total >= 0"),
        });
        let fk = conv.alloc_foreign_key_id();
        t.foreign_keys.push(ForeignKey {
            id: fk,
            name: "orders_customer_fk".to_string(),
            columns: vec![cust],
            referenced_table: parent,
            referenced_columns: vec![id],
            on_delete: FkPolicy::declared(FkAction::Cascade),
            on_update: FkPolicy::declared(FkAction::NoAction),
        });
        conv.tables.insert(child, t);

        Mapper::new(conv.source_dialect, "synth_id").map(&mut conv);
        conv
    }

    #[test]
    fn test_google_sql_table() {
        let conv = model(TargetDialect::GoogleSql);
        let emitter = DdlEmitter::new(&conv);
        let orders = conv.table_by_name("orders").unwrap();
        assert_eq!(
            emitter.create_table(orders).unwrap(),
            "CREATE TABLE `orders` (\n    `id` INT64 NOT NULL,\n    `customer_id` INT64,\n    \
             `total` NUMERIC DEFAULT (0),\n    \
             CONSTRAINT `orders_total_check` CHECK (`total` >= 0)\n) PRIMARY KEY (`id`)"
        );
    }

    #[test]
    fn test_postgres_table_and_constraints() {
        let conv = model(TargetDialect::Postgresql);
        let statements = DdlEmitter::new(&conv).statements(&conv).unwrap();
        assert_eq!(statements.len(), 4);
        assert!(statements[0].contains("\"email\" varchar(255)"));
        assert!(statements[0].ends_with("PRIMARY KEY (\"id\")\n)"));
        assert_eq!(
            statements[2],
            "CREATE UNIQUE INDEX \"customers_email_key\" ON \"customers\" (\"email\")"
        );
        assert_eq!(
            statements[3],
            "ALTER TABLE \"orders\" ADD CONSTRAINT \"orders_customer_fk\" FOREIGN KEY \
             (\"customer_id\") REFERENCES \"customers\" (\"id\") ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_rejected_check_commented_out() {
        let mut conv = model(TargetDialect::GoogleSql);
        let orders = conv.table_by_name("orders").unwrap().id;
        let table = conv.table_mut(orders).unwrap();
        table.checks[0]
            .expr
            .mark_rejected("`total` >= 0".into(), "Unsupported\nsyntax".into())
            .unwrap();
        let ddl = DdlEmitter::new(&conv).emit(&conv).unwrap();
        assert!(ddl.contains(
            "-- rejected: orders check orders_total_check: total >= 0 (Unsupported syntax)\n\
             CREATE TABLE `orders`"
        ));
        assert!(!ddl.contains("CONSTRAINT `orders_total_check`"));
    }

    #[test]
    fn test_synthetic_key_rendered() {
        let mut conv = Conv::new(SourceDialect::Mysql, TargetDialect::GoogleSql);
        let id = conv.alloc_table_id();
        let mut t = Table::new(id, "log");
        let c = conv.alloc_column_id();
        t.columns.push(Column::new(c, "msg", SourceType::parse("text")));
        conv.tables.insert(id, t);
        Mapper::new(conv.source_dialect, "synth_id").map(&mut conv);

        let ddl = DdlEmitter::new(&conv).create_table(conv.table(id).unwrap()).unwrap();
        assert!(ddl.starts_with(
            "CREATE TABLE `log` (\n    `synth_id` STRING(36) NOT NULL DEFAULT (GENERATE_UUID()),"
        ));
        assert!(ddl.ends_with(") PRIMARY KEY (`synth_id`)"));
    }
}
