//! Name-based schema assembly shared by every reader.
//!
//! Readers describe tables by name; the builder allocates identifiers,
//! flattens namespaces (applying the configured collision policy), resolves
//! column references and, once every table is known, foreign keys.

use std::collections::{HashMap, HashSet};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::NameCollisionPolicy;
use crate::core::{
    Audit, CheckConstraint, Column, ColumnId, Conv, Expression, FkAction, FkPolicy, ForeignKey,
    Index, Issue, IssueCategory, IssueTarget, KeyPart, SourceDialect, SourceType, Stage, Table,
    TableId, TargetDialect,
};
use crate::error::{ConvertError, Result};

/// Column as declared in the source.
#[derive(Debug, Clone)]
pub struct ColumnDraft {
    pub name: String,
    pub source_type: SourceType,
    pub nullable: bool,
    pub default: Option<String>,
    pub generated: Option<String>,
    pub identity: bool,
}

impl ColumnDraft {
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            name: name.into(),
            source_type,
            nullable: true,
            default: None,
            generated: None,
            identity: false,
        }
    }
}

/// Index or unique constraint; columns are `(name, descending)`.
#[derive(Debug, Clone)]
pub struct IndexDraft {
    pub name: Option<String>,
    pub columns: Vec<(String, bool)>,
    pub unique: bool,
}

#[derive(Debug, Clone)]
pub struct ForeignKeyDraft {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_namespace: Option<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: FkAction,
    pub on_update: FkAction,
}

#[derive(Debug, Clone)]
pub struct CheckDraft {
    pub name: Option<String>,
    pub expr: String,
}

/// Table as declared in the source.
#[derive(Debug, Clone, Default)]
pub struct TableDraft {
    pub namespace: Option<String>,
    pub name: String,
    pub columns: Vec<ColumnDraft>,
    pub primary_key: Vec<(String, bool)>,
    pub indexes: Vec<IndexDraft>,
    pub foreign_keys: Vec<ForeignKeyDraft>,
    pub checks: Vec<CheckDraft>,
}

impl TableDraft {
    pub fn new(namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
            ..Default::default()
        }
    }
}

struct PendingForeignKey {
    table: TableId,
    namespace: Option<String>,
    draft: ForeignKeyDraft,
}

type SourceKey = (Option<String>, String);

fn source_key(namespace: Option<&str>, name: &str) -> SourceKey {
    (namespace.map(|n| n.to_lowercase()), name.to_lowercase())
}

/// Incrementally builds a [`Conv`] from reader output.
pub struct SchemaBuilder {
    conv: Conv,
    policy: NameCollisionPolicy,
    cancel: CancellationToken,
    by_source: HashMap<SourceKey, TableId>,
    pending: Vec<PendingForeignKey>,
    aborted: bool,
}

impl SchemaBuilder {
    pub fn new(
        source: SourceDialect,
        target: TargetDialect,
        policy: NameCollisionPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            conv: Conv::new(source, target),
            policy,
            cancel,
            by_source: HashMap::new(),
            pending: Vec::new(),
            aborted: false,
        }
    }

    pub fn source_dialect(&self) -> SourceDialect {
        self.conv.source_dialect
    }

    pub fn audit_mut(&mut self) -> &mut Audit {
        &mut self.conv.audit
    }

    pub fn table_count(&self) -> usize {
        self.conv.tables.len()
    }

    /// Whether reading must stop. The first call after cancellation records
    /// the single `aborted` issue.
    pub fn should_stop(&mut self) -> bool {
        if !self.aborted && self.cancel.is_cancelled() {
            self.aborted = true;
            let read = self.conv.tables.len();
            warn!("Schema read cancelled after {} tables", read);
            self.conv.add_issue(Issue::new(
                IssueCategory::Aborted,
                Stage::Reader,
                IssueTarget::Schema,
                format!("Reading cancelled after {} tables; the model is partial.", read),
            ));
        }
        self.aborted
    }

    /// Record a reader issue.
    pub fn issue(&mut self, category: IssueCategory, target: IssueTarget, detail: impl Into<String>) {
        self.conv
            .add_issue(Issue::new(category, Stage::Reader, target, detail));
    }

    /// Find a table by its source namespace and name. Without a namespace,
    /// any namespace matches when the name is unambiguous.
    pub fn lookup(&self, namespace: Option<&str>, name: &str) -> Option<TableId> {
        if let Some(id) = self.by_source.get(&source_key(namespace, name)) {
            return Some(*id);
        }
        let lname = name.to_lowercase();
        let mut matches = self.by_source.iter().filter(|((ns, n), _)| {
            *n == lname && (namespace.is_none() || ns.is_none())
        });
        let first = matches.next().map(|(_, id)| *id);
        if matches.next().is_some() {
            return None;
        }
        first
    }

    /// Add a table. Returns `None` when the collision policy skipped it.
    pub fn add_table(&mut self, draft: TableDraft) -> Result<Option<TableId>> {
        let TableDraft {
            namespace,
            name: source_name,
            columns,
            primary_key,
            indexes,
            foreign_keys,
            checks,
        } = draft;
        let label = qualified(namespace.as_deref(), &source_name);

        let mut name = source_name.clone();
        let mut collided_with = None;
        if let Some(existing) = self.conv.table_by_name(&name) {
            let existing = qualified(existing.namespace.as_deref(), &existing.source_name);
            match self.policy {
                NameCollisionPolicy::Error => {
                    return Err(ConvertError::source_parse(
                        label,
                        format!("table name collides with {}", existing),
                    ));
                }
                NameCollisionPolicy::Skip => {
                    self.issue(
                        IssueCategory::NameCollision,
                        IssueTarget::Schema,
                        format!(
                            "Table {} skipped: its name collides with {}.",
                            label, existing
                        ),
                    );
                    return Ok(None);
                }
                NameCollisionPolicy::Rename => {
                    name = self.unique_table_name(namespace.as_deref(), &source_name);
                    collided_with = Some(existing);
                }
            }
        }

        let id = self.conv.alloc_table_id();
        let mut table = Table::new(id, name);
        table.source_name = source_name.clone();
        table.namespace = namespace.clone();

        let mut seen = HashSet::new();
        for draft in columns {
            if !seen.insert(draft.name.to_lowercase()) {
                return Err(ConvertError::source_parse(
                    label,
                    format!("duplicate column '{}'", draft.name),
                ));
            }
            let column_id = self.conv.alloc_column_id();
            let mut column = Column::new(column_id, draft.name, draft.source_type);
            column.nullable = draft.nullable;
            column.default = draft.default.map(Expression::new);
            column.generated = draft.generated.map(Expression::new);
            column.identity = draft.identity;
            table.columns.push(column);
        }

        if let Some(other) = collided_with {
            self.conv.add_issue(Issue::new(
                IssueCategory::NameCollision,
                Stage::Reader,
                IssueTarget::Table { table: id },
                format!(
                    "Table {} renamed to '{}': its name collides with {}.",
                    label, table.name, other
                ),
            ));
        }

        self.conv.tables.insert(id, table);
        self.by_source
            .insert(source_key(namespace.as_deref(), &source_name), id);
        debug!("Read table {} as {}", label, id);

        if !primary_key.is_empty() {
            self.set_primary_key(id, &primary_key)?;
        }
        for index in indexes {
            self.add_index(id, index);
        }
        for fk in foreign_keys {
            self.add_foreign_key(id, fk);
        }
        for check in checks {
            self.add_check(id, check);
        }
        Ok(Some(id))
    }

    fn unique_table_name(&self, namespace: Option<&str>, name: &str) -> String {
        let base = match namespace {
            Some(ns) => format!("{}_{}", ns, name),
            None => format!("{}_1", name),
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while self.conv.table_by_name(&candidate).is_some() {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        candidate
    }

    fn table_mut(&mut self, id: TableId) -> Result<&mut Table> {
        self.conv
            .table_mut(id)
            .ok_or_else(|| ConvertError::source_parse(id.to_string(), "unknown table"))
    }

    fn resolve_columns(table: &Table, names: &[String]) -> std::result::Result<Vec<ColumnId>, String> {
        names
            .iter()
            .map(|n| {
                table
                    .column_by_name(n)
                    .map(|c| c.id)
                    .ok_or_else(|| n.clone())
            })
            .collect()
    }

    /// Set the primary key. An unknown key column makes the schema unusable.
    pub fn set_primary_key(&mut self, id: TableId, columns: &[(String, bool)]) -> Result<()> {
        let table = self.table_mut(id)?;
        let mut keys = Vec::with_capacity(columns.len());
        for (name, desc) in columns {
            let column = table.column_by_name(name).map(|c| c.id).ok_or_else(|| {
                ConvertError::source_parse(
                    table.source_name.clone(),
                    format!("primary key references unknown column '{}'", name),
                )
            })?;
            keys.push(KeyPart {
                column,
                desc: *desc,
            });
        }
        for key in &keys {
            if let Some(column) = table.column_mut(key.column) {
                column.nullable = false;
            }
        }
        table.primary_key = keys;
        Ok(())
    }

    pub fn add_index(&mut self, id: TableId, draft: IndexDraft) {
        let index_id = self.conv.alloc_index_id();
        let Some(table) = self.conv.table(id) else {
            return;
        };
        let names: Vec<String> = draft.columns.iter().map(|(n, _)| n.clone()).collect();
        let name = draft.name.unwrap_or_else(|| {
            let suffix = if draft.unique { "key" } else { "idx" };
            format!("{}_{}_{}", table.name, names.join("_"), suffix)
        });
        match Self::resolve_columns(table, &names) {
            Ok(ids) => {
                let keys = ids
                    .into_iter()
                    .zip(draft.columns.iter())
                    .map(|(column, (_, desc))| KeyPart {
                        column,
                        desc: *desc,
                    })
                    .collect();
                if let Some(table) = self.conv.table_mut(id) {
                    table.indexes.push(Index {
                        id: index_id,
                        name,
                        keys,
                        unique: draft.unique,
                    });
                }
            }
            Err(missing) => {
                let detail = format!(
                    "Index {} on {} dropped: '{}' is not a plain column of the table.",
                    name, table.name, missing
                );
                self.issue(
                    IssueCategory::UnsupportedConstraint,
                    IssueTarget::Table { table: id },
                    detail,
                );
            }
        }
    }

    /// Queue a foreign key; it is resolved in [`SchemaBuilder::finish`].
    pub fn add_foreign_key(&mut self, id: TableId, draft: ForeignKeyDraft) {
        let namespace = self.conv.table(id).and_then(|t| t.namespace.clone());
        self.pending.push(PendingForeignKey {
            table: id,
            namespace,
            draft,
        });
    }

    pub fn add_check(&mut self, id: TableId, draft: CheckDraft) {
        let check_id = self.conv.alloc_check_id();
        if let Some(table) = self.conv.table_mut(id) {
            let name = draft
                .name
                .unwrap_or_else(|| format!("{}_check{}", table.name, table.checks.len() + 1));
            table.checks.push(CheckConstraint {
                id: check_id,
                name,
                expr: Expression::new(draft.expr),
            });
        }
    }

    /// Apply `ALTER COLUMN ... SET DEFAULT`.
    pub fn set_column_default(&mut self, id: TableId, column: &str, expr: String) {
        let Some(table) = self.conv.table_mut(id) else {
            return;
        };
        let table_name = table.name.clone();
        match table.columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(column)) {
            Some(c) if is_sequence_default(&expr) => {
                c.identity = true;
                c.default = None;
            }
            Some(c) => c.default = Some(Expression::new(expr)),
            None => self.issue(
                IssueCategory::MissingReference,
                IssueTarget::Table { table: id },
                format!("Default for unknown column {}.{} ignored.", table_name, column),
            ),
        }
    }

    /// Mark a column as identity (`ADD GENERATED ... AS IDENTITY`).
    pub fn set_identity(&mut self, id: TableId, column: &str) {
        if let Some(c) = self
            .conv
            .table_mut(id)
            .and_then(|t| t.columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(column)))
        {
            c.identity = true;
        }
    }

    /// Resolve pending foreign keys and return the model.
    pub fn finish(mut self) -> Conv {
        let pending = std::mem::take(&mut self.pending);
        for fk in pending {
            self.resolve_foreign_key(fk);
        }
        self.conv
    }

    fn resolve_foreign_key(&mut self, pending: PendingForeignKey) {
        let PendingForeignKey {
            table,
            namespace,
            draft,
        } = pending;
        let fk_id = self.conv.alloc_foreign_key_id();
        let Some(child) = self.conv.table(table) else {
            return;
        };
        let name = draft
            .name
            .clone()
            .unwrap_or_else(|| format!("fk_{}_{}", child.name, draft.columns.join("_")));
        let target = IssueTarget::Table { table };

        // An explicit namespace must match; only unqualified references may
        // fall back to a table of the same name elsewhere.
        let parent_id = match draft.referenced_namespace.as_deref() {
            Some(ns) => self.lookup(Some(ns), &draft.referenced_table),
            None => self
                .lookup(namespace.as_deref(), &draft.referenced_table)
                .or_else(|| self.lookup(None, &draft.referenced_table)),
        };
        let Some(parent_id) = parent_id else {
            let detail = format!(
                "Foreign key {} on {} dropped: referenced table '{}' not found.",
                name, child.name, draft.referenced_table
            );
            self.issue(IssueCategory::MissingReference, target, detail);
            return;
        };

        let columns = match Self::resolve_columns(child, &draft.columns) {
            Ok(ids) => ids,
            Err(missing) => {
                let detail = format!(
                    "Foreign key {} on {} dropped: column '{}' not found.",
                    name, child.name, missing
                );
                self.issue(IssueCategory::MissingReference, target, detail);
                return;
            }
        };

        let Some(parent) = self.conv.table(parent_id) else {
            return;
        };
        let referenced_names = if draft.referenced_columns.is_empty() {
            // REFERENCES t without a column list targets the primary key
            parent
                .primary_key
                .iter()
                .map(|k| parent.column_name(k.column).to_string())
                .collect()
        } else {
            draft.referenced_columns.clone()
        };
        let referenced_columns = match Self::resolve_columns(parent, &referenced_names) {
            Ok(ids) if ids.len() == columns.len() && !ids.is_empty() => ids,
            Ok(_) => {
                let detail = format!(
                    "Foreign key {} on {} dropped: column count does not match {}.",
                    name, child.name, parent.name
                );
                self.issue(IssueCategory::MissingReference, target, detail);
                return;
            }
            Err(missing) => {
                let detail = format!(
                    "Foreign key {} on {} dropped: referenced column {}.{} not found.",
                    name, child.name, parent.name, missing
                );
                self.issue(IssueCategory::MissingReference, target, detail);
                return;
            }
        };

        if let Some(child) = self.conv.table_mut(table) {
            child.foreign_keys.push(ForeignKey {
                id: fk_id,
                name,
                columns,
                referenced_table: parent_id,
                referenced_columns,
                on_delete: FkPolicy::declared(draft.on_delete),
                on_update: FkPolicy::declared(draft.on_update),
            });
        }
    }
}

fn qualified(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}.{}", ns, name),
        None => name.to_string(),
    }
}

/// `nextval('seq'::regclass)` defaults are how serial columns appear in dumps.
pub fn is_sequence_default(expr: &str) -> bool {
    expr.trim_start().to_lowercase().starts_with("nextval(")
}
