//! Canonical schema model shared by every pipeline stage.
//!
//! - [`schema`]: the `Conv` aggregate, tables, columns, keys and expressions
//! - [`types`]: dialect tags, source and target type descriptors
//! - [`issue`]: non-fatal findings attached to model objects
//! - [`audit`]: run metadata carried alongside the model
//! - [`identifier`]: identifier validation and quoting

pub mod audit;
pub mod identifier;
pub mod issue;
pub mod schema;
pub mod types;

pub use audit::{Audit, MigrationType};
pub use issue::{Issue, IssueCategory, IssueTarget, Severity, Stage};
pub use schema::{
    CheckConstraint, CheckId, Column, ColumnId, Conv, Expression, ExpressionKind,
    ExpressionSlot, FkAction, FkPolicy, ForeignKey, ForeignKeyId, Index, IndexId, KeyPart,
    Table, TableId, VerificationStatus,
};
pub use types::{
    Confidence, SourceDialect, SourceType, TargetDialect, TargetKind, TargetType,
    MAX_BYTES_LENGTH, MAX_STRING_LENGTH,
};
