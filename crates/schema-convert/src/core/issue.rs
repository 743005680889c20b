//! Non-fatal findings attached to the model.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::schema::{CheckId, ColumnId, ForeignKeyId, IndexId, TableId};

/// Issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    /// Target type cannot hold every source value exactly.
    LossyType,
    /// Several target types fit; one was chosen.
    AmbiguousMapping,
    /// Related columns disagree on type (e.g. foreign key vs referenced key).
    TypeMismatch,
    /// A constraint or column property the target cannot express.
    UnsupportedConstraint,
    /// A source object (view, trigger, ...) that is not converted.
    UnsupportedConstruct,
    /// Two source objects flattened to the same target name.
    NameCollision,
    /// A surrogate primary key was introduced.
    SyntheticKey,
    /// A reference to an object that does not exist in the model.
    MissingReference,
    /// The target refused a translated expression.
    ExpressionRejected,
    /// Expression verification could not run.
    VerificationSkipped,
    /// The run was cancelled; the model is partial.
    Aborted,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::LossyType => "lossy-type",
            IssueCategory::AmbiguousMapping => "ambiguous-mapping",
            IssueCategory::TypeMismatch => "type-mismatch",
            IssueCategory::UnsupportedConstraint => "unsupported-constraint",
            IssueCategory::UnsupportedConstruct => "unsupported-construct",
            IssueCategory::NameCollision => "name-collision",
            IssueCategory::SyntheticKey => "synthetic-key",
            IssueCategory::MissingReference => "missing-reference",
            IssueCategory::ExpressionRejected => "expression-rejected",
            IssueCategory::VerificationSkipped => "verification-skipped",
            IssueCategory::Aborted => "aborted",
        }
    }

    /// Severity used when the raising stage does not pick one.
    pub fn default_severity(&self) -> Severity {
        match self {
            IssueCategory::SyntheticKey | IssueCategory::NameCollision => Severity::Info,
            IssueCategory::ExpressionRejected | IssueCategory::Aborted => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Pipeline stage that raised an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Reader,
    Mapper,
    Verifier,
    Pipeline,
}

/// Model object an issue concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueTarget {
    Schema,
    Table { table: TableId },
    Column { table: TableId, column: ColumnId },
    Index { table: TableId, index: IndexId },
    ForeignKey { table: TableId, foreign_key: ForeignKeyId },
    Check { table: TableId, check: CheckId },
}

impl IssueTarget {
    /// Owning table, if the issue is not schema-wide.
    pub fn table(&self) -> Option<TableId> {
        match *self {
            IssueTarget::Schema => None,
            IssueTarget::Table { table }
            | IssueTarget::Column { table, .. }
            | IssueTarget::Index { table, .. }
            | IssueTarget::ForeignKey { table, .. }
            | IssueTarget::Check { table, .. } => Some(table),
        }
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub category: IssueCategory,
    pub severity: Severity,
    pub stage: Stage,
    pub target: IssueTarget,
    pub detail: String,
}

impl Issue {
    pub fn new(
        category: IssueCategory,
        stage: Stage,
        target: IssueTarget,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity: category.default_severity(),
            stage,
            target,
            detail: detail.into(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.severity.as_str(),
            self.category,
            self.detail
        )
    }
}
