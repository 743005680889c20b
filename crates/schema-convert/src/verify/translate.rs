//! Best-effort rewrite of source expressions into the target dialect.

use std::ops::ControlFlow;

use sqlparser::ast::{
    visit_expressions_mut, CastKind, DataType, Expr, FunctionArgumentList, FunctionArguments,
    Ident, ObjectName, Value,
};
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use tracing::debug;

use crate::core::{SourceDialect, SourceType, Table, TargetDialect};
use crate::dialect::{mapper_for, ComposedMapper, TypeMapper};

/// Rewrites expression text from a source dialect into a target dialect.
///
/// Casts written with `::` become `CAST(.. AS <target type>)`, column
/// references are re-quoted, and functions with a different target
/// spelling are renamed.
pub struct Translator {
    source: SourceDialect,
    target: TargetDialect,
    types: ComposedMapper,
}

impl Translator {
    pub fn new(source: SourceDialect, target: TargetDialect) -> Self {
        Self {
            source,
            target,
            types: mapper_for(source),
        }
    }

    /// Translate `text`, resolving column references against `table`.
    ///
    /// Text that does not parse is returned unchanged; the target decides.
    pub fn translate(&self, text: &str, table: &Table) -> String {
        let dialect: Box<dyn Dialect> = match self.source {
            SourceDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SourceDialect::Mysql => Box::new(MySqlDialect {}),
            SourceDialect::DynamoDb => Box::new(GenericDialect {}),
        };
        let parsed = Parser::new(dialect.as_ref())
            .try_with_sql(text)
            .and_then(|mut parser| parser.parse_expr());
        let mut expr = match parsed {
            Ok(expr) => expr,
            Err(e) => {
                debug!("Expression '{}' not parsed ({}); submitting verbatim", text, e);
                return text.to_string();
            }
        };

        let _ = visit_expressions_mut(&mut expr, |e| {
            self.rewrite(e, table);
            ControlFlow::<()>::Continue(())
        });
        expr.to_string()
    }

    fn rewrite(&self, expr: &mut Expr, table: &Table) {
        match expr {
            Expr::Identifier(ident) => self.requote(ident, table),
            Expr::CompoundIdentifier(parts) => {
                if let Some(last) = parts.last_mut() {
                    self.requote(last, table);
                }
            }
            Expr::Cast {
                kind, data_type, ..
            } => {
                if *kind == CastKind::DoubleColon {
                    *kind = CastKind::Cast;
                }
                let mapping = self
                    .types
                    .map_type(&SourceType::parse(&data_type.to_string()));
                let rendered = mapping.target_type.render(self.target);
                *data_type = DataType::Custom(ObjectName(vec![Ident::new(rendered)]), vec![]);
            }
            Expr::Function(function) => {
                let name = function.name.to_string().to_lowercase();
                if let Some(renamed) = self.function_name(&name) {
                    function.name =
                        ObjectName(renamed.split('.').map(Ident::new).collect());
                    if matches!(function.args, FunctionArguments::None) {
                        function.args = FunctionArguments::List(FunctionArgumentList {
                            duplicate_treatment: None,
                            args: vec![],
                            clauses: vec![],
                        });
                    }
                }
            }
            Expr::Value(Value::DoubleQuotedString(s)) if self.target == TargetDialect::Postgresql => {
                *expr = Expr::Value(Value::SingleQuotedString(std::mem::take(s)));
            }
            _ => {}
        }
    }

    /// Re-quote a column reference using the model's spelling of the name.
    fn requote(&self, ident: &mut Ident, table: &Table) {
        if let Some(column) = table.column_by_name(&ident.value) {
            ident.value = column.name.clone();
            ident.quote_style = Some(match self.target {
                TargetDialect::GoogleSql => '`',
                TargetDialect::Postgresql => '"',
            });
        }
    }

    fn function_name(&self, name: &str) -> Option<&'static str> {
        match (self.target, name) {
            (
                TargetDialect::GoogleSql,
                "now" | "current_timestamp" | "localtimestamp" | "sysdate" | "getdate",
            ) => Some("CURRENT_TIMESTAMP"),
            (TargetDialect::GoogleSql, "current_date" | "curdate") => Some("CURRENT_DATE"),
            (TargetDialect::GoogleSql, "gen_random_uuid" | "uuid_generate_v4" | "uuid") => {
                Some("GENERATE_UUID")
            }
            (TargetDialect::GoogleSql, "character_length") => Some("CHAR_LENGTH"),
            (TargetDialect::Postgresql, "gen_random_uuid" | "uuid_generate_v4" | "uuid") => {
                Some("spanner.generate_uuid")
            }
            (TargetDialect::Postgresql, "sysdate" | "getdate") => Some("now"),
            (TargetDialect::Postgresql, "curdate") => Some("current_date"),
            _ => None,
        }
    }
}
