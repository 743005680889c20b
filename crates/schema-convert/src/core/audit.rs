//! Run metadata carried alongside the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::issue::IssueCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationType {
    SchemaOnly,
}

/// Identifiers, timings and issue counts of a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    /// Unique id of the request that produced the model (`schema-conv-<uuid>`).
    pub migration_request_id: String,

    pub migration_type: MigrationType,

    /// SHA-256 of the configuration used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_fingerprint: Option<String>,

    /// SHA-256 of the dump or export the schema was read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_digest: Option<String>,

    /// Bytes read from the source file.
    #[serde(default)]
    pub bytes_read: u64,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Session file this run resumed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<String>,

    /// Number of verification passes run over the model.
    #[serde(default)]
    pub verification_runs: u32,

    #[serde(default)]
    pub issue_counts: BTreeMap<IssueCategory, usize>,
}

impl Audit {
    pub fn new() -> Self {
        Self {
            migration_request_id: format!("schema-conv-{}", Uuid::new_v4()),
            migration_type: MigrationType::SchemaOnly,
            config_fingerprint: None,
            source_digest: None,
            bytes_read: 0,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            resumed_from: None,
            verification_runs: 0,
            issue_counts: BTreeMap::new(),
        }
    }

    /// Start a new request on a model loaded from a session.
    pub fn restart(&mut self, resumed_from: impl Into<String>) {
        self.migration_request_id = format!("schema-conv-{}", Uuid::new_v4());
        self.started_at = Utc::now();
        self.completed_at = None;
        self.duration_ms = None;
        self.resumed_from = Some(resumed_from.into());
    }

    /// Stamp completion time and the final issue counts.
    pub fn finish(&mut self, issue_counts: BTreeMap<IssueCategory, usize>) {
        let now = Utc::now();
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        self.completed_at = Some(now);
        self.issue_counts = issue_counts;
    }
}

impl Default for Audit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_format() {
        let audit = Audit::new();
        assert!(audit.migration_request_id.starts_with("schema-conv-"));
        assert_eq!(audit.migration_request_id.len(), "schema-conv-".len() + 36);
        assert_ne!(audit.migration_request_id, Audit::new().migration_request_id);
    }

    #[test]
    fn test_finish_sets_duration_and_counts() {
        let mut audit = Audit::new();
        let mut counts = BTreeMap::new();
        counts.insert(IssueCategory::LossyType, 2);
        audit.finish(counts);
        assert!(audit.completed_at.is_some());
        assert!(audit.duration_ms.is_some());
        assert_eq!(audit.issue_counts[&IssueCategory::LossyType], 2);
    }

    #[test]
    fn test_restart_records_session() {
        let mut audit = Audit::new();
        let first = audit.migration_request_id.clone();
        audit.finish(BTreeMap::new());
        audit.restart("out.session.json");
        assert_ne!(audit.migration_request_id, first);
        assert_eq!(audit.resumed_from.as_deref(), Some("out.session.json"));
        assert!(audit.completed_at.is_none());
    }
}
