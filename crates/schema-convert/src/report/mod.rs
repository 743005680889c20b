//! Conversion report: a read-only summary of a model.
//!
//! [`Report::assemble`] never mutates the model and contains nothing that
//! is not derived from it, so the same model always yields the same report.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::core::{
    Audit, Confidence, Conv, ExpressionKind, IssueCategory, IssueTarget, Severity,
    SourceDialect, TargetDialect, VerificationStatus,
};
use crate::error::Result;

/// Object counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub tables: usize,
    pub columns: usize,
    pub indexes: usize,
    pub foreign_keys: usize,
    pub checks: usize,
    pub expressions_verified: usize,
    pub expressions_rejected: usize,
    pub expressions_unverified: usize,
    pub issues: usize,
    /// The run was aborted and the model is incomplete.
    pub partial: bool,
}

/// Columns per mapping confidence tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub exact: usize,
    pub lossy: usize,
    pub unsupported: usize,
    /// Columns the mapper has not seen.
    pub unmapped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticKey {
    pub table: String,
    pub column: String,
}

/// An expression that did not verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionEntry {
    /// `table.column` or `table.check`.
    pub object: String,
    pub kind: ExpressionKind,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall conversion quality of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    Ok,
    Poor,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Ok => "ok",
            Rating::Poor => "poor",
        }
    }

    /// Poor with any error; ok when warnings outnumber a third of the
    /// columns; good with any warning; excellent otherwise.
    fn from_counts(errors: usize, warnings: usize, columns: usize) -> Self {
        if errors > 0 {
            Rating::Poor
        } else if warnings * 3 > columns {
            Rating::Ok
        } else if warnings > 0 {
            Rating::Good
        } else {
            Rating::Excellent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub name: String,
    pub source_name: String,
    pub columns: usize,
    pub rating: Rating,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    /// Issue lines, `[severity] category: detail`.
    pub issues: Vec<String>,
}

/// Everything a reader needs to judge a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub source_dialect: SourceDialect,
    pub target_dialect: TargetDialect,
    pub summary: Summary,
    pub issues_by_category: BTreeMap<IssueCategory, usize>,
    pub issues_by_severity: BTreeMap<Severity, usize>,
    pub confidence: ConfidenceDistribution,
    pub synthetic_keys: Vec<SyntheticKey>,
    pub rejected_expressions: Vec<ExpressionEntry>,
    pub unverified_expressions: Vec<ExpressionEntry>,
    pub tables: Vec<TableReport>,
    /// Issues not attached to a table.
    pub schema_issues: Vec<String>,
    pub audit: Audit,
}

impl Report {
    /// Build the report for `conv`.
    pub fn assemble(conv: &Conv) -> Self {
        let mut summary = Summary {
            tables: conv.tables.len(),
            issues: conv.issues.len(),
            partial: conv.is_partial(),
            ..Summary::default()
        };
        let mut confidence = ConfidenceDistribution::default();
        let mut synthetic_keys = Vec::new();

        for table in conv.tables.values() {
            summary.columns += table.columns.len();
            summary.indexes += table.indexes.len();
            summary.foreign_keys += table.foreign_keys.len();
            summary.checks += table.checks.len();
            for column in &table.columns {
                match column.confidence {
                    Some(Confidence::Exact) => confidence.exact += 1,
                    Some(Confidence::Lossy) => confidence.lossy += 1,
                    Some(Confidence::Unsupported) => confidence.unsupported += 1,
                    None => confidence.unmapped += 1,
                }
                if column.synthetic {
                    synthetic_keys.push(SyntheticKey {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
            }
        }

        let mut rejected_expressions = Vec::new();
        let mut unverified_expressions = Vec::new();
        for (slot, expr) in conv.expressions() {
            let entry = ExpressionEntry {
                object: conv.describe(slot.issue_target()),
                kind: slot.kind(),
                source: expr.source.clone(),
                translated: expr.translated.clone(),
                message: expr.rejection.clone(),
            };
            match expr.status {
                VerificationStatus::Verified => summary.expressions_verified += 1,
                VerificationStatus::Rejected => {
                    summary.expressions_rejected += 1;
                    rejected_expressions.push(entry);
                }
                VerificationStatus::Unverified => {
                    summary.expressions_unverified += 1;
                    unverified_expressions.push(entry);
                }
            }
        }

        let mut issues_by_severity = BTreeMap::new();
        for issue in &conv.issues {
            *issues_by_severity.entry(issue.severity).or_insert(0) += 1;
        }

        let mut schema_issues = Vec::new();
        let mut per_table: BTreeMap<_, Vec<_>> = BTreeMap::new();
        for issue in &conv.issues {
            match issue.target {
                IssueTarget::Schema => schema_issues.push(issue.to_string()),
                target => {
                    if let Some(table) = target.table() {
                        per_table.entry(table).or_default().push(issue);
                    }
                }
            }
        }

        let tables = conv
            .tables
            .values()
            .map(|table| {
                let issues = per_table.get(&table.id).map(Vec::as_slice).unwrap_or(&[]);
                let count = |s: Severity| issues.iter().filter(|i| i.severity == s).count();
                let (errors, warnings, infos) = (
                    count(Severity::Error),
                    count(Severity::Warning),
                    count(Severity::Info),
                );
                TableReport {
                    name: table.name.clone(),
                    source_name: table.source_name.clone(),
                    columns: table.columns.len(),
                    rating: Rating::from_counts(errors, warnings, table.columns.len()),
                    errors,
                    warnings,
                    infos,
                    issues: issues.iter().map(|i| i.to_string()).collect(),
                }
            })
            .collect();

        Self {
            source_dialect: conv.source_dialect,
            target_dialect: conv.target_dialect,
            summary,
            issues_by_category: conv.issue_counts(),
            issues_by_severity,
            confidence,
            synthetic_keys,
            rejected_expressions,
            unverified_expressions,
            tables,
            schema_issues,
            audit: conv.audit.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text rendering for terminals and log files.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let s = &self.summary;
        let _ = writeln!(
            out,
            "Schema conversion report ({} -> {})",
            self.source_dialect,
            self.target_dialect.as_str()
        );
        let _ = writeln!(out, "Request: {}", self.audit.migration_request_id);
        if s.partial {
            let _ = writeln!(out, "WARNING: the run was aborted; this model is partial");
        }
        let _ = writeln!(
            out,
            "\n{} tables, {} columns, {} indexes, {} foreign keys, {} checks",
            s.tables, s.columns, s.indexes, s.foreign_keys, s.checks
        );
        let c = &self.confidence;
        let _ = writeln!(
            out,
            "Type mapping: {} exact, {} lossy, {} unsupported",
            c.exact, c.lossy, c.unsupported
        );
        let _ = writeln!(
            out,
            "Expressions: {} verified, {} rejected, {} unverified",
            s.expressions_verified, s.expressions_rejected, s.expressions_unverified
        );

        if !self.issues_by_category.is_empty() {
            let _ = writeln!(out, "\nIssues ({}):", s.issues);
            for (category, n) in &self.issues_by_category {
                let _ = writeln!(out, "  {:<24} {}", category.as_str(), n);
            }
        }

        if !self.synthetic_keys.is_empty() {
            let _ = writeln!(out, "\nSynthetic keys:");
            for key in &self.synthetic_keys {
                let _ = writeln!(out, "  {}.{}", key.table, key.column);
            }
        }

        if !self.rejected_expressions.is_empty() {
            let _ = writeln!(out, "\nRejected expressions:");
            for e in &self.rejected_expressions {
                let _ = writeln!(
                    out,
                    "  {}: {} ({})",
                    e.object,
                    e.source,
                    e.message.as_deref().unwrap_or("")
                );
            }
        }

        let _ = writeln!(out, "\nTables:");
        for t in &self.tables {
            let _ = writeln!(
                out,
                "  {:<32} {:<10} {} errors, {} warnings",
                t.name,
                t.rating.as_str(),
                t.errors,
                t.warnings
            );
        }
        for issue in &self.schema_issues {
            let _ = writeln!(out, "  {}", issue);
        }
        out
    }
}
