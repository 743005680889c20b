//! Session snapshots for resuming a conversion without the source.
//!
//! A session file is a JSON envelope around the serialized model:
//!
//! ```json
//! {
//!   "format": "schema-convert/session",
//!   "version": 1,
//!   "saved_at": "2026-01-01T00:00:00Z",
//!   "partial": false,
//!   "tool_version": "0.1.0",
//!   "checksum": "<sha256 of conv>",
//!   "conv": { ... }
//! }
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::core::Conv;
use crate::error::{ConvertError, Result};

/// Envelope format tag.
pub const SESSION_FORMAT: &str = "schema-convert/session";

/// Newest envelope version this build reads and the one it writes.
pub const SESSION_VERSION: u32 = 1;

/// Envelope metadata, read without decoding the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHeader {
    pub format: String,
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub partial: bool,
    pub tool_version: String,
    /// SHA-256 of the canonical JSON encoding of `conv`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// A loaded session.
#[derive(Debug, Clone)]
pub struct Session {
    pub header: SessionHeader,
    pub conv: Conv,
}

/// Saves and loads session files.
pub struct SessionStore;

impl SessionStore {
    /// Save a complete model. Partial models are refused.
    pub fn save(conv: &Conv, path: impl AsRef<Path>) -> Result<()> {
        if conv.is_partial() {
            return Err(ConvertError::PartialSession(
                "model is incomplete (run was aborted); use save_partial to keep it".to_string(),
            ));
        }
        Self::write(conv, path.as_ref(), false)
    }

    /// Save a model flagged as partial.
    pub fn save_partial(conv: &Conv, path: impl AsRef<Path>) -> Result<()> {
        Self::write(conv, path.as_ref(), conv.is_partial())
    }

    fn write(conv: &Conv, path: &Path, partial: bool) -> Result<()> {
        let body = serde_json::to_value(conv)?;
        let header = SessionHeader {
            format: SESSION_FORMAT.to_string(),
            version: SESSION_VERSION,
            saved_at: Utc::now(),
            partial,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            checksum: Some(checksum(&body)?),
        };
        let mut envelope = serde_json::to_value(&header)?;
        if let Value::Object(map) = &mut envelope {
            map.insert("conv".to_string(), body);
        }
        let content = serde_json::to_string_pretty(&envelope)?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        info!(
            "Saved {}session with {} tables to {}",
            if partial { "partial " } else { "" },
            conv.tables.len(),
            path.display()
        );
        Ok(())
    }

    /// Load and validate a session file.
    pub fn load(path: impl AsRef<Path>) -> Result<Session> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let session = Self::decode(&content)?;
        info!(
            "Loaded session with {} tables from {}",
            session.conv.tables.len(),
            path.display()
        );
        Ok(session)
    }

    /// Decode a session from its JSON text.
    ///
    /// Checks run in order: JSON syntax, format tag, version, model
    /// decoding, checksum, then the model's structural invariants.
    pub fn decode(content: &str) -> Result<Session> {
        let mut envelope: Value = serde_json::from_str(content)
            .map_err(|e| ConvertError::CorruptSession(format!("not valid JSON: {}", e)))?;

        match envelope.get("format").and_then(Value::as_str) {
            Some(SESSION_FORMAT) => {}
            Some(other) => {
                return Err(ConvertError::CorruptSession(format!(
                    "unknown format '{}'",
                    other
                )))
            }
            None => {
                return Err(ConvertError::CorruptSession(
                    "missing format tag".to_string(),
                ))
            }
        }

        let version = envelope
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| ConvertError::CorruptSession("missing version".to_string()))?;
        if version > SESSION_VERSION as u64 {
            return Err(ConvertError::SchemaVersion {
                found: u32::try_from(version).unwrap_or(u32::MAX),
                supported: SESSION_VERSION,
            });
        }

        let body = match &mut envelope {
            Value::Object(map) => map.remove("conv"),
            _ => None,
        }
        .ok_or_else(|| ConvertError::CorruptSession("missing model".to_string()))?;

        let header: SessionHeader = serde_json::from_value(envelope)
            .map_err(|e| ConvertError::CorruptSession(format!("invalid header: {}", e)))?;

        match &header.checksum {
            Some(expected) if *expected != checksum(&body)? => {
                return Err(ConvertError::CorruptSession(
                    "checksum mismatch (file modified after save)".to_string(),
                ));
            }
            Some(_) => {}
            None => warn!("Session file has no checksum, integrity cannot be verified"),
        }

        let conv: Conv = serde_json::from_value(body)
            .map_err(|e| ConvertError::CorruptSession(format!("invalid model: {}", e)))?;
        conv.validate()?;

        if header.partial != conv.is_partial() {
            warn!(
                "Session partial flag ({}) disagrees with model contents",
                header.partial
            );
        }
        Ok(Session { header, conv })
    }
}

/// Hash of the canonical (key-sorted) JSON encoding.
fn checksum(body: &Value) -> Result<String> {
    let canonical = serde_json::to_string(body)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Column, IssueCategory, IssueTarget, KeyPart, Issue, SourceDialect, SourceType, Stage,
        Table, TargetDialect,
    };
    use tempfile::tempdir;

    fn sample() -> Conv {
        let mut conv = Conv::new(SourceDialect::Postgres, TargetDialect::GoogleSql);
        for name in ["orders", "customers"] {
            let id = conv.alloc_table_id();
            let mut table = Table::new(id, name);
            let col = conv.alloc_column_id();
            table.columns.push(Column::new(col, "id", SourceType::parse("integer")));
            table.primary_key = vec![KeyPart::asc(col)];
            conv.tables.insert(id, table);
        }
        conv
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.session.json");
        let conv = sample();
        SessionStore::save(&conv, &path).unwrap();
        let loaded = SessionStore::load(&path).unwrap();
        assert_eq!(loaded.conv, conv);
        assert!(!loaded.header.partial);
        assert_eq!(loaded.header.version, SESSION_VERSION);
    }

    #[test]
    fn test_partial_refused_unless_flagged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.json");
        let mut conv = sample();
        conv.add_issue(Issue::new(
            IssueCategory::Aborted,
            Stage::Reader,
            IssueTarget::Schema,
            "cancelled",
        ));
        assert!(matches!(
            SessionStore::save(&conv, &path),
            Err(ConvertError::PartialSession(_))
        ));
        assert!(!path.exists());

        SessionStore::save_partial(&conv, &path).unwrap();
        assert!(SessionStore::load(&path).unwrap().header.partial);
    }

    fn encoded() -> Value {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.json");
        SessionStore::save(&sample(), &path).unwrap();
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap()
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut v = encoded();
        v["version"] = Value::from(99);
        assert!(matches!(
            SessionStore::decode(&v.to_string()),
            Err(ConvertError::SchemaVersion { found: 99, supported: 1 })
        ));
    }

    #[test]
    fn test_corrupt_inputs() {
        assert!(matches!(
            SessionStore::decode("{not json"),
            Err(ConvertError::CorruptSession(_))
        ));

        let mut v = encoded();
        v["format"] = Value::from("something-else");
        assert!(matches!(
            SessionStore::decode(&v.to_string()),
            Err(ConvertError::CorruptSession(_))
        ));

        let mut v = encoded();
        v.as_object_mut().unwrap().remove("conv");
        assert!(matches!(
            SessionStore::decode(&v.to_string()),
            Err(ConvertError::CorruptSession(_))
        ));

        let mut v = encoded();
        v["conv"]["tables"]["1"]["name"] = Value::from("renamed");
        assert!(matches!(
            SessionStore::decode(&v.to_string()),
            Err(ConvertError::CorruptSession(_))
        ));
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut v = encoded();
        v.as_object_mut().unwrap().remove("checksum");
        v["conv"]["tables"]["1"]["primary_key"][0]["column"] = Value::from(999);
        assert!(matches!(
            SessionStore::decode(&v.to_string()),
            Err(ConvertError::CorruptSession(_))
        ));
    }
}
