//! Canonical schema model: the aggregate every pipeline stage reads and writes.
//!
//! Objects are addressed by typed identifiers allocated from a single
//! counter stored in the model, so identifiers survive a session
//! save/load round trip unchanged.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::audit::Audit;
use super::issue::{Issue, IssueCategory, IssueTarget, Stage};
use super::types::{Confidence, SourceDialect, SourceType, TargetDialect, TargetType};
use crate::error::{ConvertError, Result};

macro_rules! model_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

model_id!(
    /// Stable table identifier.
    TableId,
    "t"
);
model_id!(
    /// Stable column identifier.
    ColumnId,
    "c"
);
model_id!(
    /// Stable index identifier.
    IndexId,
    "i"
);
model_id!(
    /// Stable foreign key identifier.
    ForeignKeyId,
    "f"
);
model_id!(
    /// Stable check constraint identifier.
    CheckId,
    "ck"
);

/// Verification state of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

/// A default, generated-column or check expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    /// Expression text as written in the source.
    pub source: String,

    /// Text translated to the target dialect, set by the verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,

    #[serde(default)]
    pub status: VerificationStatus,

    /// Target error message when rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

impl Expression {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            translated: None,
            status: VerificationStatus::Unverified,
            rejection: None,
        }
    }

    /// Return to `Unverified` so the expression can be checked again.
    pub fn reset(&mut self) {
        self.translated = None;
        self.status = VerificationStatus::Unverified;
        self.rejection = None;
    }

    pub fn mark_verified(&mut self, translated: String) -> Result<()> {
        self.transition(VerificationStatus::Verified)?;
        self.translated = Some(translated);
        Ok(())
    }

    pub fn mark_rejected(&mut self, translated: String, reason: String) -> Result<()> {
        self.transition(VerificationStatus::Rejected)?;
        self.translated = Some(translated);
        self.rejection = Some(reason);
        Ok(())
    }

    fn transition(&mut self, to: VerificationStatus) -> Result<()> {
        if self.status != VerificationStatus::Unverified {
            return Err(ConvertError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Text to emit in DDL: the translation when present, otherwise the source.
    pub fn text(&self) -> &str {
        self.translated.as_deref().unwrap_or(&self.source)
    }
}

/// One element of a key: column plus sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPart {
    pub column: ColumnId,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub desc: bool,
}

impl KeyPart {
    pub fn asc(column: ColumnId) -> Self {
        Self {
            column,
            desc: false,
        }
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,

    /// Column name.
    pub name: String,

    /// Declared source type.
    pub source_type: SourceType,

    /// Target type; absent until the mapper has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<TargetType>,

    /// Mapping confidence assigned with the target type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Default value expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Expression>,

    /// Generated (computed) column expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<Expression>,

    /// Whether the source declared the column as identity/serial/auto-increment.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub identity: bool,

    /// Whether the column was introduced as a synthetic primary key.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

impl Column {
    pub fn new(id: ColumnId, name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            id,
            name: name.into(),
            source_type,
            target_type: None,
            confidence: None,
            nullable: true,
            default: None,
            generated: None,
            identity: false,
            synthetic: false,
        }
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub id: IndexId,

    /// Index name.
    pub name: String,

    /// Key columns in order.
    pub keys: Vec<KeyPart>,

    /// Whether the index is unique.
    pub unique: bool,
}

/// Referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    pub fn sql(&self) -> &'static str {
        match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Restrict => "RESTRICT",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Parse a referential action keyword; unknown text yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase()
            .as_str()
        {
            "NO ACTION" => Some(FkAction::NoAction),
            "RESTRICT" => Some(FkAction::Restrict),
            "CASCADE" => Some(FkAction::Cascade),
            "SET NULL" => Some(FkAction::SetNull),
            "SET DEFAULT" => Some(FkAction::SetDefault),
            _ => None,
        }
    }
}

/// Source action and the action chosen for the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FkPolicy {
    pub source: FkAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<FkAction>,
}

impl FkPolicy {
    pub fn declared(source: FkAction) -> Self {
        Self {
            source,
            target: None,
        }
    }

    /// Action to emit: the mapped one, or the declared one before mapping.
    pub fn effective(&self) -> FkAction {
        self.target.unwrap_or(self.source)
    }
}

/// Foreign key metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub id: ForeignKeyId,

    /// Constraint name.
    pub name: String,

    /// Referencing columns of the owning table.
    pub columns: Vec<ColumnId>,

    /// Referenced table.
    pub referenced_table: TableId,

    /// Referenced columns, positionally matching `columns`.
    pub referenced_columns: Vec<ColumnId>,

    #[serde(default)]
    pub on_delete: FkPolicy,

    #[serde(default)]
    pub on_update: FkPolicy,
}

/// Check constraint metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub id: CheckId,

    /// Constraint name.
    pub name: String,

    /// Boolean expression.
    pub expr: Expression,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,

    /// Name in the flattened target namespace.
    pub name: String,

    /// Source schema/database the table came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Name as declared in the source.
    pub source_name: String,

    /// Column definitions in DDL order.
    pub columns: Vec<Column>,

    /// Primary key parts in key order.
    #[serde(default)]
    pub primary_key: Vec<KeyPart>,

    #[serde(default)]
    pub indexes: Vec<Index>,

    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,

    #[serde(default)]
    pub checks: Vec<CheckConstraint>,
}

impl Table {
    pub fn new(id: TableId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            source_name: name.clone(),
            name,
            namespace: None,
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == id)
    }

    /// Case-insensitive column lookup.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Column name for display; `"?"` for dangling ids.
    pub fn column_name(&self, id: ColumnId) -> &str {
        self.column(id).map(|c| c.name.as_str()).unwrap_or("?")
    }

    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn is_pk_column(&self, id: ColumnId) -> bool {
        self.primary_key.iter().any(|k| k.column == id)
    }

    /// Whether `columns` is exactly the primary key or a unique index, as a set.
    pub fn is_unique_key(&self, columns: &[ColumnId]) -> bool {
        let wanted: HashSet<ColumnId> = columns.iter().copied().collect();
        if wanted.is_empty() || wanted.len() != columns.len() {
            return false;
        }
        let same = |keys: &[KeyPart]| {
            keys.len() == wanted.len() && keys.iter().all(|k| wanted.contains(&k.column))
        };
        same(&self.primary_key) || self.indexes.iter().any(|i| i.unique && same(&i.keys))
    }

    pub fn synthetic_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.synthetic)
    }
}

/// Where an expression lives in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionSlot {
    Default { table: TableId, column: ColumnId },
    Generated { table: TableId, column: ColumnId },
    Check { table: TableId, check: CheckId },
}

/// Role of an expression, as told to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionKind {
    Check,
    Default,
    Generated,
}

impl ExpressionSlot {
    pub fn table(&self) -> TableId {
        match *self {
            ExpressionSlot::Default { table, .. }
            | ExpressionSlot::Generated { table, .. }
            | ExpressionSlot::Check { table, .. } => table,
        }
    }

    pub fn kind(&self) -> ExpressionKind {
        match self {
            ExpressionSlot::Default { .. } => ExpressionKind::Default,
            ExpressionSlot::Generated { .. } => ExpressionKind::Generated,
            ExpressionSlot::Check { .. } => ExpressionKind::Check,
        }
    }

    pub fn issue_target(&self) -> IssueTarget {
        match *self {
            ExpressionSlot::Default { table, column }
            | ExpressionSlot::Generated { table, column } => IssueTarget::Column { table, column },
            ExpressionSlot::Check { table, check } => IssueTarget::Check { table, check },
        }
    }
}

fn first_id() -> u32 {
    1
}

/// The canonical schema model ("Conv").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv {
    pub source_dialect: SourceDialect,

    pub target_dialect: TargetDialect,

    /// Tables keyed by id; id order is allocation order.
    pub tables: BTreeMap<TableId, Table>,

    #[serde(default)]
    pub issues: Vec<Issue>,

    pub audit: Audit,

    /// Next identifier to allocate.
    #[serde(default = "first_id")]
    next_id: u32,
}

impl Conv {
    pub fn new(source_dialect: SourceDialect, target_dialect: TargetDialect) -> Self {
        Self {
            source_dialect,
            target_dialect,
            tables: BTreeMap::new(),
            issues: Vec::new(),
            audit: Audit::new(),
            next_id: first_id(),
        }
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn alloc_table_id(&mut self) -> TableId {
        TableId(self.alloc())
    }

    pub fn alloc_column_id(&mut self) -> ColumnId {
        ColumnId(self.alloc())
    }

    pub fn alloc_index_id(&mut self) -> IndexId {
        IndexId(self.alloc())
    }

    pub fn alloc_foreign_key_id(&mut self) -> ForeignKeyId {
        ForeignKeyId(self.alloc())
    }

    pub fn alloc_check_id(&mut self) -> CheckId {
        CheckId(self.alloc())
    }

    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(&id)
    }

    pub fn table_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.get_mut(&id)
    }

    /// Case-insensitive lookup by target name.
    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables
            .values()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn add_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Drop every issue raised by `stage`.
    pub fn clear_issues(&mut self, stage: Stage) {
        self.issues.retain(|i| i.stage != stage);
    }

    pub fn issues_for(&self, target: IssueTarget) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.target == target)
    }

    pub fn has_issue(&self, category: IssueCategory) -> bool {
        self.issues.iter().any(|i| i.category == category)
    }

    /// A model is partial when a run was aborted while building or checking it.
    pub fn is_partial(&self) -> bool {
        self.has_issue(IssueCategory::Aborted)
    }

    pub fn issue_counts(&self) -> BTreeMap<IssueCategory, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.category).or_insert(0) += 1;
        }
        counts
    }

    /// Every expression in table, column, then check order.
    pub fn expressions(&self) -> Vec<(ExpressionSlot, &Expression)> {
        let mut out = Vec::new();
        for table in self.tables.values() {
            for column in &table.columns {
                if let Some(expr) = &column.default {
                    out.push((
                        ExpressionSlot::Default {
                            table: table.id,
                            column: column.id,
                        },
                        expr,
                    ));
                }
                if let Some(expr) = &column.generated {
                    out.push((
                        ExpressionSlot::Generated {
                            table: table.id,
                            column: column.id,
                        },
                        expr,
                    ));
                }
            }
            for check in &table.checks {
                out.push((
                    ExpressionSlot::Check {
                        table: table.id,
                        check: check.id,
                    },
                    &check.expr,
                ));
            }
        }
        out
    }

    pub fn expression(&self, slot: ExpressionSlot) -> Option<&Expression> {
        let table = self.tables.get(&slot.table())?;
        match slot {
            ExpressionSlot::Default { column, .. } => table.column(column)?.default.as_ref(),
            ExpressionSlot::Generated { column, .. } => table.column(column)?.generated.as_ref(),
            ExpressionSlot::Check { check, .. } => {
                table.checks.iter().find(|c| c.id == check).map(|c| &c.expr)
            }
        }
    }

    pub fn expression_mut(&mut self, slot: ExpressionSlot) -> Option<&mut Expression> {
        let table = self.tables.get_mut(&slot.table())?;
        match slot {
            ExpressionSlot::Default { column, .. } => table.column_mut(column)?.default.as_mut(),
            ExpressionSlot::Generated { column, .. } => {
                table.column_mut(column)?.generated.as_mut()
            }
            ExpressionSlot::Check { check, .. } => table
                .checks
                .iter_mut()
                .find(|c| c.id == check)
                .map(|c| &mut c.expr),
        }
    }

    /// Human-readable name of an issue target, e.g. `orders.total`.
    pub fn describe(&self, target: IssueTarget) -> String {
        let Some(table) = target.table().and_then(|id| self.table(id)) else {
            return "schema".to_string();
        };
        match target {
            IssueTarget::Column { column, .. } => {
                format!("{}.{}", table.name, table.column_name(column))
            }
            IssueTarget::Index { index, .. } => {
                let name = table.indexes.iter().find(|i| i.id == index);
                format!("{}.{}", table.name, name.map(|i| i.name.as_str()).unwrap_or("?"))
            }
            IssueTarget::ForeignKey { foreign_key, .. } => {
                let name = table.foreign_keys.iter().find(|f| f.id == foreign_key);
                format!("{}.{}", table.name, name.map(|f| f.name.as_str()).unwrap_or("?"))
            }
            IssueTarget::Check { check, .. } => {
                let name = table.checks.iter().find(|c| c.id == check);
                format!("{}.{}", table.name, name.map(|c| c.name.as_str()).unwrap_or("?"))
            }
            _ => table.name.clone(),
        }
    }

    /// Check the structural invariants: identifiers unique and below the
    /// allocator, names unique, every reference resolvable.
    pub fn validate(&self) -> Result<()> {
        let corrupt = |msg: String| Err(ConvertError::CorruptSession(msg));
        let mut ids = HashSet::new();
        let mut claim = |raw: u32, what: &str| -> Result<()> {
            if raw == 0 || raw >= self.next_id {
                return Err(ConvertError::CorruptSession(format!(
                    "{} id {} outside allocated range",
                    what, raw
                )));
            }
            if !ids.insert(raw) {
                return Err(ConvertError::CorruptSession(format!(
                    "duplicate identifier {} ({})",
                    raw, what
                )));
            }
            Ok(())
        };

        let mut table_names = HashSet::new();
        for (key, table) in &self.tables {
            if *key != table.id {
                return corrupt(format!("table {} stored under key {}", table.id, key));
            }
            claim(table.id.0, "table")?;
            if !table_names.insert(table.name.to_lowercase()) {
                return corrupt(format!("duplicate table name '{}'", table.name));
            }

            let mut column_names = HashSet::new();
            for column in &table.columns {
                claim(column.id.0, "column")?;
                if !column_names.insert(column.name.to_lowercase()) {
                    return corrupt(format!(
                        "table '{}': duplicate column name '{}'",
                        table.name, column.name
                    ));
                }
            }

            let has_column = |id: &ColumnId| table.column(*id).is_some();
            if let Some(k) = table.primary_key.iter().find(|k| !has_column(&k.column)) {
                return corrupt(format!(
                    "table '{}': primary key references unknown column {}",
                    table.name, k.column
                ));
            }
            for index in &table.indexes {
                claim(index.id.0, "index")?;
                if index.keys.is_empty() {
                    return corrupt(format!("index '{}' has no key columns", index.name));
                }
                if let Some(k) = index.keys.iter().find(|k| !has_column(&k.column)) {
                    return corrupt(format!(
                        "index '{}' references unknown column {}",
                        index.name, k.column
                    ));
                }
            }
            for check in &table.checks {
                claim(check.id.0, "check")?;
            }
            for fk in &table.foreign_keys {
                claim(fk.id.0, "foreign key")?;
                if fk.columns.is_empty() || fk.columns.len() != fk.referenced_columns.len() {
                    return corrupt(format!(
                        "foreign key '{}': column lists are empty or differ in length",
                        fk.name
                    ));
                }
                if let Some(c) = fk.columns.iter().find(|c| !has_column(c)) {
                    return corrupt(format!(
                        "foreign key '{}' references unknown column {}",
                        fk.name, c
                    ));
                }
                let Some(parent) = self.tables.get(&fk.referenced_table) else {
                    return corrupt(format!(
                        "foreign key '{}' references unknown table {}",
                        fk.name, fk.referenced_table
                    ));
                };
                if let Some(c) = fk
                    .referenced_columns
                    .iter()
                    .find(|c| parent.column(**c).is_none())
                {
                    return corrupt(format!(
                        "foreign key '{}' references unknown column {} of '{}'",
                        fk.name, c, parent.name
                    ));
                }
            }
        }

        for issue in &self.issues {
            if let Some(table_id) = issue.target.table() {
                if !self.tables.contains_key(&table_id) {
                    return corrupt(format!(
                        "issue '{}' attached to unknown table {}",
                        issue.category, table_id
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Conv {
        let mut conv = Conv::new(SourceDialect::Postgres, TargetDialect::GoogleSql);
        let tid = conv.alloc_table_id();
        let id = conv.alloc_column_id();
        let total = conv.alloc_column_id();
        let mut table = Table::new(tid, "orders");
        let mut id_col = Column::new(id, "id", SourceType::parse("integer"));
        id_col.nullable = false;
        table.columns.push(id_col);
        let mut total_col = Column::new(total, "total", SourceType::parse("numeric(10,2)"));
        total_col.default = Some(Expression::new("0"));
        table.columns.push(total_col);
        table.primary_key.push(KeyPart::asc(id));
        let check = conv.alloc_check_id();
        table.checks.push(CheckConstraint {
            id: check,
            name: "total_positive".to_string(),
            expr: Expression::new("total >= 0"),
        });
        conv.tables.insert(tid, table);
        conv
    }

    #[test]
    fn test_id_display() {
        assert_eq!(TableId(3).to_string(), "t3");
        assert_eq!(CheckId(12).to_string(), "ck12");
        assert_eq!(serde_json::to_string(&ColumnId(4)).unwrap(), "4");
    }

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let mut conv = Conv::new(SourceDialect::Mysql, TargetDialect::GoogleSql);
        let t = conv.alloc_table_id();
        let c = conv.alloc_column_id();
        let i = conv.alloc_index_id();
        assert_eq!((t.0, c.0, i.0), (1, 2, 3));
    }

    #[test]
    fn test_expression_transitions_forward_only() {
        let mut expr = Expression::new("price > 0");
        expr.mark_verified("price > 0".to_string()).unwrap();
        assert_eq!(expr.status, VerificationStatus::Verified);

        let err = expr
            .mark_rejected("price > 0".to_string(), "nope".to_string())
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidTransition { .. }));

        expr.reset();
        assert_eq!(expr.status, VerificationStatus::Unverified);
        assert!(expr.translated.is_none());
        expr.mark_rejected("price > 0".to_string(), "nope".to_string())
            .unwrap();
        assert_eq!(expr.rejection.as_deref(), Some("nope"));
    }

    #[test]
    fn test_is_unique_key() {
        let conv = sample();
        let table = conv.tables.values().next().unwrap();
        let id = table.columns[0].id;
        let total = table.columns[1].id;
        assert!(table.is_unique_key(&[id]));
        assert!(!table.is_unique_key(&[total]));
        assert!(!table.is_unique_key(&[]));
    }

    #[test]
    fn test_expressions_and_slots() {
        let mut conv = sample();
        let exprs = conv.expressions();
        assert_eq!(exprs.len(), 2);
        assert_eq!(exprs[0].0.kind(), ExpressionKind::Default);
        assert_eq!(exprs[1].0.kind(), ExpressionKind::Check);

        let slot = exprs[1].0;
        conv.expression_mut(slot)
            .unwrap()
            .mark_verified("total >= 0".to_string())
            .unwrap();
        assert_eq!(
            conv.expression(slot).unwrap().status,
            VerificationStatus::Verified
        );
    }

    #[test]
    fn test_validate_accepts_sample() {
        sample().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_dangling_pk() {
        let mut conv = sample();
        let table = conv.tables.values_mut().next().unwrap();
        table.primary_key = vec![KeyPart::asc(ColumnId(999))];
        let err = conv.validate().unwrap_err();
        assert!(err.to_string().contains("primary key"));
    }

    #[test]
    fn test_validate_rejects_duplicate_column_name() {
        let mut conv = sample();
        let table = conv.tables.values_mut().next().unwrap();
        table.columns[1].name = "ID".to_string();
        assert!(conv.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dangling_fk_table() {
        let mut conv = sample();
        let fk_id = conv.alloc_foreign_key_id();
        let table = conv.tables.values_mut().next().unwrap();
        let id = table.columns[0].id;
        table.foreign_keys.push(ForeignKey {
            id: fk_id,
            name: "fk_missing".to_string(),
            columns: vec![id],
            referenced_table: TableId(500),
            referenced_columns: vec![id],
            on_delete: FkPolicy::default(),
            on_update: FkPolicy::default(),
        });
        let err = conv.validate().unwrap_err();
        assert!(err.to_string().contains("unknown table"));
    }

    #[test]
    fn test_partial_and_counts() {
        let mut conv = sample();
        assert!(!conv.is_partial());
        conv.add_issue(Issue::new(
            IssueCategory::Aborted,
            Stage::Reader,
            IssueTarget::Schema,
            "cancelled",
        ));
        assert!(conv.is_partial());
        assert_eq!(conv.issue_counts()[&IssueCategory::Aborted], 1);
        conv.clear_issues(Stage::Reader);
        assert!(!conv.is_partial());
    }

    #[test]
    fn test_fk_action_parse() {
        assert_eq!(FkAction::parse("set  null"), Some(FkAction::SetNull));
        assert_eq!(FkAction::parse("CASCADE"), Some(FkAction::Cascade));
        assert_eq!(FkAction::parse("bogus"), None);
        let policy = FkPolicy::declared(FkAction::Restrict);
        assert_eq!(policy.effective(), FkAction::Restrict);
    }
}
