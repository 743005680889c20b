//! Type and constraint mapping onto the target.
//!
//! [`Mapper::map`] assigns target types, introduces synthetic keys, makes
//! index names unique and degrades referential actions. Every imperfect
//! decision is recorded as an [`Issue`] raised by [`Stage::Mapper`]; the
//! mapper clears its own issues first, so a re-run yields the same set.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::core::{
    Column, Confidence, Conv, Expression, FkAction, ForeignKeyId, Issue, IssueCategory,
    IssueTarget, KeyPart, Severity, SourceDialect, SourceType, Stage, TableId, TargetDialect,
    TargetType,
};
use crate::dialect::{mapper_for, TypeMapper};

/// Length of the textual UUID stored in synthetic keys.
const UUID_LENGTH: u32 = 36;

/// Maps a populated model onto the target type system and constraint vocabulary.
pub struct Mapper {
    types: Box<dyn TypeMapper>,
    synthetic_key_column: String,
}

/// Planned changes to one foreign key.
struct ForeignKeyPlan {
    table: TableId,
    foreign_key: ForeignKeyId,
    drop: bool,
    on_delete: FkAction,
    on_update: FkAction,
}

impl Mapper {
    pub fn new(source: SourceDialect, synthetic_key_column: impl Into<String>) -> Self {
        Self::with_type_mapper(Box::new(mapper_for(source)), synthetic_key_column)
    }

    pub fn with_type_mapper(
        types: Box<dyn TypeMapper>,
        synthetic_key_column: impl Into<String>,
    ) -> Self {
        Self {
            types,
            synthetic_key_column: synthetic_key_column.into(),
        }
    }

    /// Map `conv` in place.
    pub fn map(&self, conv: &mut Conv) {
        conv.clear_issues(Stage::Mapper);
        let table_ids: Vec<TableId> = conv.tables.keys().copied().collect();

        for &id in &table_ids {
            self.map_columns(conv, id);
            self.map_primary_key(conv, id);
        }
        self.map_indexes(conv, &table_ids);
        self.map_foreign_keys(conv, &table_ids);

        let mut counts = [0usize; 3];
        for column in conv.tables.values().flat_map(|t| &t.columns) {
            match column.confidence {
                Some(Confidence::Exact) => counts[0] += 1,
                Some(Confidence::Lossy) => counts[1] += 1,
                Some(Confidence::Unsupported) => counts[2] += 1,
                None => {}
            }
        }
        info!(
            "Mapped {} tables: {} exact, {} lossy, {} unsupported columns",
            table_ids.len(),
            counts[0],
            counts[1],
            counts[2]
        );
    }

    fn map_columns(&self, conv: &mut Conv, id: TableId) {
        let mut issues = Vec::new();
        let dialect = conv.target_dialect;
        let Some(table) = conv.table_mut(id) else {
            return;
        };

        for column in table.columns.iter_mut() {
            if column.synthetic {
                continue;
            }
            let mapping = self.types.map_type(&column.source_type);
            let target = IssueTarget::Column {
                table: id,
                column: column.id,
            };
            let rendered = mapping.target_type.render(dialect);

            if mapping.confidence != Confidence::Exact {
                let note = mapping.note.clone().unwrap_or_default();
                issues.push(Issue::new(
                    IssueCategory::LossyType,
                    Stage::Mapper,
                    target,
                    format!(
                        "{}.{}: {} mapped to {} ({}). {}",
                        table.name,
                        column.name,
                        column.source_type.raw,
                        rendered,
                        mapping.confidence.as_str(),
                        note
                    )
                    .trim_end()
                    .to_string(),
                ));
            }
            if let Some(ambiguity) = &mapping.ambiguity {
                issues.push(Issue::new(
                    IssueCategory::AmbiguousMapping,
                    Stage::Mapper,
                    target,
                    format!("{}.{}: {}", table.name, column.name, ambiguity),
                ));
            }
            if column.identity {
                issues.push(Issue::new(
                    IssueCategory::UnsupportedConstraint,
                    Stage::Mapper,
                    target,
                    format!(
                        "{}.{} is auto-incrementing; values must be supplied on insert.",
                        table.name, column.name
                    ),
                ));
            }

            column.target_type = Some(mapping.target_type);
            column.confidence = Some(mapping.confidence);
        }

        for issue in issues {
            conv.add_issue(issue);
        }
    }

    fn map_primary_key(&self, conv: &mut Conv, id: TableId) {
        let Some(table) = conv.table(id) else {
            return;
        };

        if let Some(existing) = table.synthetic_key() {
            let detail = synthetic_detail(&table.name, &existing.name);
            conv.add_issue(Issue::new(
                IssueCategory::SyntheticKey,
                Stage::Mapper,
                IssueTarget::Table { table: id },
                detail,
            ));
            return;
        }

        if table.has_pk() {
            let mut issues = Vec::new();
            for key in &table.primary_key {
                let Some(column) = table.column(key.column) else {
                    continue;
                };
                if let Some(ty) = column.target_type.as_ref().filter(|t| !t.is_keyable()) {
                    issues.push(Issue::new(
                        IssueCategory::UnsupportedConstraint,
                        Stage::Mapper,
                        IssueTarget::Column {
                            table: id,
                            column: column.id,
                        },
                        format!(
                            "Primary key column {}.{} has type {}, which cannot be part of a key.",
                            table.name,
                            column.name,
                            ty.render(conv.target_dialect)
                        ),
                    ));
                }
            }
            for issue in issues {
                conv.add_issue(issue);
            }
            return;
        }

        let name = unique_column_name(table.columns.iter(), &self.synthetic_key_column);
        let default = match conv.target_dialect {
            TargetDialect::GoogleSql => "GENERATE_UUID()",
            TargetDialect::Postgresql => "spanner.generate_uuid()",
        };
        let column_id = conv.alloc_column_id();
        let mut column = Column::new(column_id, name.clone(), SourceType::simple("uuid"));
        column.target_type = Some(TargetType::string(Some(UUID_LENGTH)));
        column.confidence = Some(Confidence::Exact);
        column.nullable = false;
        column.synthetic = true;
        column.default = Some(Expression::new(default));

        if let Some(table) = conv.table_mut(id) {
            debug!("Adding synthetic key {}.{}", table.name, name);
            table.columns.insert(0, column);
            table.primary_key = vec![KeyPart::asc(column_id)];
            let detail = synthetic_detail(&table.name, &name);
            conv.add_issue(Issue::new(
                IssueCategory::SyntheticKey,
                Stage::Mapper,
                IssueTarget::Table { table: id },
                detail,
            ));
        }
    }

    /// Index names share one namespace with tables in the target.
    fn map_indexes(&self, conv: &mut Conv, table_ids: &[TableId]) {
        let mut used: HashSet<String> = conv
            .tables
            .values()
            .map(|t| t.name.to_lowercase())
            .collect();
        let mut issues = Vec::new();

        for &id in table_ids {
            let Some(table) = conv.tables.get_mut(&id) else {
                continue;
            };
            let table_name = table.name.clone();
            let columns = table.columns.clone();
            let mut kept = Vec::with_capacity(table.indexes.len());

            for mut index in std::mem::take(&mut table.indexes) {
                let target = IssueTarget::Index {
                    table: id,
                    index: index.id,
                };
                let unkeyable = index.keys.iter().find_map(|k| {
                    columns
                        .iter()
                        .find(|c| c.id == k.column)
                        .filter(|c| c.target_type.as_ref().is_some_and(|t| !t.is_keyable()))
                });
                if let Some(column) = unkeyable {
                    issues.push(Issue::new(
                        IssueCategory::UnsupportedConstraint,
                        Stage::Mapper,
                        IssueTarget::Table { table: id },
                        format!(
                            "Index {} on {} dropped: column {} cannot be indexed.",
                            index.name, table_name, column.name
                        ),
                    ));
                    continue;
                }

                if !used.insert(index.name.to_lowercase()) {
                    let base = format!("{}_{}", table_name, index.name);
                    let mut candidate = base.clone();
                    let mut n = 2;
                    while used.contains(&candidate.to_lowercase()) {
                        candidate = format!("{}_{}", base, n);
                        n += 1;
                    }
                    issues.push(Issue::new(
                        IssueCategory::NameCollision,
                        Stage::Mapper,
                        target,
                        format!(
                            "Index {} on {} renamed to {}: index names must be unique.",
                            index.name, table_name, candidate
                        ),
                    ));
                    used.insert(candidate.to_lowercase());
                    index.name = candidate;
                }
                kept.push(index);
            }
            table.indexes = kept;
        }

        for issue in issues {
            conv.add_issue(issue);
        }
    }

    fn map_foreign_keys(&self, conv: &mut Conv, table_ids: &[TableId]) {
        let mut plans = Vec::new();
        let mut issues = Vec::new();

        for &id in table_ids {
            let Some(table) = conv.table(id) else {
                continue;
            };
            for fk in &table.foreign_keys {
                let target = IssueTarget::ForeignKey {
                    table: id,
                    foreign_key: fk.id,
                };
                let mut plan = ForeignKeyPlan {
                    table: id,
                    foreign_key: fk.id,
                    drop: false,
                    on_delete: FkAction::NoAction,
                    on_update: FkAction::NoAction,
                };
                let Some(parent) = conv.table(fk.referenced_table) else {
                    plan.drop = true;
                    plans.push(plan);
                    continue;
                };

                if !parent.is_unique_key(&fk.referenced_columns) {
                    issues.push(Issue::new(
                        IssueCategory::UnsupportedConstraint,
                        Stage::Mapper,
                        IssueTarget::Table { table: id },
                        format!(
                            "Foreign key {} on {} dropped: referenced columns ({}) are not a primary or unique key of {}.",
                            fk.name,
                            table.name,
                            fk.referenced_columns
                                .iter()
                                .map(|c| parent.column_name(*c))
                                .collect::<Vec<_>>()
                                .join(", "),
                            parent.name
                        ),
                    ));
                    plan.drop = true;
                    plans.push(plan);
                    continue;
                }

                for (child_col, parent_col) in fk.columns.iter().zip(&fk.referenced_columns) {
                    let child_type = table.column(*child_col).and_then(|c| c.target_type.as_ref());
                    let parent_type =
                        parent.column(*parent_col).and_then(|c| c.target_type.as_ref());
                    if let (Some(a), Some(b)) = (child_type, parent_type) {
                        if a.kind != b.kind || a.array != b.array {
                            issues.push(Issue::new(
                                IssueCategory::TypeMismatch,
                                Stage::Mapper,
                                target,
                                format!(
                                    "Foreign key {}: {}.{} is {} but {}.{} is {}.",
                                    fk.name,
                                    table.name,
                                    table.column_name(*child_col),
                                    a.render(conv.target_dialect),
                                    parent.name,
                                    parent.column_name(*parent_col),
                                    b.render(conv.target_dialect)
                                ),
                            ));
                        }
                    }
                }

                let (on_delete, delete_issue) = map_delete_action(fk.on_delete.source);
                let (on_update, update_issue) = map_update_action(fk.on_update.source);
                for (clause, source, severity) in [
                    ("ON DELETE", fk.on_delete.source, delete_issue),
                    ("ON UPDATE", fk.on_update.source, update_issue),
                ] {
                    if let Some(severity) = severity {
                        issues.push(
                            Issue::new(
                                IssueCategory::UnsupportedConstraint,
                                Stage::Mapper,
                                target,
                                format!(
                                    "Foreign key {} on {}: {} {} is not supported; using NO ACTION.",
                                    fk.name,
                                    table.name,
                                    clause,
                                    source.sql()
                                ),
                            )
                            .with_severity(severity),
                        );
                    }
                }
                plan.on_delete = on_delete;
                plan.on_update = on_update;
                plans.push(plan);
            }
        }

        for plan in plans {
            let Some(table) = conv.table_mut(plan.table) else {
                continue;
            };
            if plan.drop {
                table.foreign_keys.retain(|f| f.id != plan.foreign_key);
                continue;
            }
            if let Some(fk) = table
                .foreign_keys
                .iter_mut()
                .find(|f| f.id == plan.foreign_key)
            {
                fk.on_delete.target = Some(plan.on_delete);
                fk.on_update.target = Some(plan.on_update);
            }
        }
        for issue in issues {
            conv.add_issue(issue);
        }
    }
}

/// Target ON DELETE action and the severity of the issue the change warrants.
fn map_delete_action(action: FkAction) -> (FkAction, Option<Severity>) {
    match action {
        FkAction::NoAction => (FkAction::NoAction, None),
        FkAction::Cascade => (FkAction::Cascade, None),
        FkAction::Restrict => (FkAction::NoAction, Some(Severity::Info)),
        FkAction::SetNull | FkAction::SetDefault => (FkAction::NoAction, Some(Severity::Warning)),
    }
}

fn map_update_action(action: FkAction) -> (FkAction, Option<Severity>) {
    match action {
        FkAction::NoAction => (FkAction::NoAction, None),
        FkAction::Restrict => (FkAction::NoAction, Some(Severity::Info)),
        FkAction::Cascade | FkAction::SetNull | FkAction::SetDefault => {
            (FkAction::NoAction, Some(Severity::Warning))
        }
    }
}

fn unique_column_name<'a>(columns: impl Iterator<Item = &'a Column> + Clone, base: &str) -> String {
    let taken = |name: &str| columns.clone().any(|c| c.name.eq_ignore_ascii_case(name));
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn synthetic_detail(table: &str, column: &str) -> String {
    format!(
        "{} has no primary key; added synthetic key column {} (UUID).",
        table, column
    )
}
