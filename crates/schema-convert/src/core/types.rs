//! Dialect tags and type descriptors shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConvertError;

/// Largest declared length of a target `STRING(n)` column.
pub const MAX_STRING_LENGTH: u32 = 2_621_440;

/// Largest declared length of a target `BYTES(n)` column.
pub const MAX_BYTES_LENGTH: u32 = 10_485_760;

/// Supported source dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceDialect {
    #[serde(rename = "postgres")]
    Postgres,
    #[serde(rename = "mysql")]
    Mysql,
    #[serde(rename = "dynamodb")]
    DynamoDb,
}

impl SourceDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceDialect::Postgres => "postgres",
            SourceDialect::Mysql => "mysql",
            SourceDialect::DynamoDb => "dynamodb",
        }
    }
}

impl fmt::Display for SourceDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceDialect {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(SourceDialect::Postgres),
            "mysql" | "mariadb" => Ok(SourceDialect::Mysql),
            "dynamodb" | "dynamo" => Ok(SourceDialect::DynamoDb),
            other => Err(ConvertError::Config(format!(
                "unknown source dialect '{}'",
                other
            ))),
        }
    }
}

/// SQL dialects of the distributed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDialect {
    /// GoogleSQL: `INT64`, `STRING(MAX)`, backtick-quoted identifiers.
    GoogleSql,
    /// PostgreSQL interface: `bigint`, `varchar`, double-quoted identifiers.
    Postgresql,
}

impl TargetDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetDialect::GoogleSql => "google_sql",
            TargetDialect::Postgresql => "postgresql",
        }
    }
}

impl fmt::Display for TargetDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalised source type descriptor.
///
/// `raw` keeps the declaration exactly as read so reports can show it; the
/// other fields are derived from it by [`SourceType::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceType {
    /// Lower-cased base name with parameters removed (`"character varying"`).
    pub name: String,

    /// Numeric parameters: length, or precision and scale.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mods: Vec<i64>,

    /// Non-numeric parameters such as enum members or a spatial subtype.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    /// Array nesting depth (0 for scalars).
    #[serde(default, skip_serializing_if = "is_zero")]
    pub array_dims: u32,

    /// Declaration as written in the source.
    pub raw: String,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl SourceType {
    /// Parse a declaration such as `numeric(10,2)`, `int(11) unsigned`,
    /// `timestamp(3) with time zone`, `enum('a','b')` or `text[]`.
    pub fn parse(raw: &str) -> Self {
        let mut rest = raw.trim().to_string();
        let mut array_dims = 0;

        loop {
            let trimmed = rest.trim_end();
            if let Some(stripped) = trimmed.strip_suffix("[]") {
                array_dims += 1;
                rest = stripped.to_string();
            } else if trimmed.len() > 6 && trimmed.to_uppercase().ends_with(" ARRAY") {
                array_dims += 1;
                rest = trimmed[..trimmed.len() - 6].to_string();
            } else {
                break;
            }
        }

        let mut mods = Vec::new();
        let mut values = Vec::new();
        let mut name = rest.clone();

        if let (Some(open), Some(close)) = (rest.find('('), rest.rfind(')')) {
            if close > open {
                for part in split_params(&rest[open + 1..close]) {
                    let part = part.trim();
                    if part.is_empty() {
                        continue;
                    }
                    if let Ok(n) = part.parse::<i64>() {
                        mods.push(n);
                    } else if part.len() >= 2 && part.starts_with('\'') && part.ends_with('\'') {
                        values.push(part[1..part.len() - 1].replace("''", "'"));
                    } else {
                        values.push(part.to_string());
                    }
                }
                name = format!("{} {}", &rest[..open], &rest[close + 1..]);
            }
        }

        Self {
            name: normalize_words(&name),
            mods,
            values,
            array_dims,
            raw: raw.trim().to_string(),
        }
    }

    /// Descriptor for a type known only by name.
    pub fn simple(name: &str) -> Self {
        Self::parse(name)
    }

    /// Numeric parameter at `index`, if declared.
    pub fn modifier(&self, index: usize) -> Option<i64> {
        self.mods.get(index).copied()
    }

    /// The same type with one array level removed.
    pub fn element(&self) -> Self {
        let mut element = self.clone();
        element.array_dims = self.array_dims.saturating_sub(1);
        element
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn normalize_words(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a parameter list on commas that are not inside single quotes.
fn split_params(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if in_quote && chars.peek() == Some(&'\'') => {
                current.push_str("''");
                chars.next();
            }
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ',' if !in_quote => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Scalar kinds the target type system offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Bool,
    Int64,
    Float32,
    Float64,
    Numeric,
    String,
    Bytes,
    Date,
    Timestamp,
    Json,
}

/// Target type descriptor produced by the mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetType {
    /// Scalar kind (element kind for arrays).
    pub kind: TargetKind,

    /// Declared length for `STRING`/`BYTES`; `None` means `MAX`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Whether this is an `ARRAY<kind>`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub array: bool,
}

impl TargetType {
    pub fn scalar(kind: TargetKind) -> Self {
        Self {
            kind,
            length: None,
            array: false,
        }
    }

    /// `STRING(n)`, or `STRING(MAX)` when `length` is `None` or too large.
    pub fn string(length: Option<u32>) -> Self {
        Self {
            kind: TargetKind::String,
            length: length.filter(|n| *n > 0 && *n <= MAX_STRING_LENGTH),
            array: false,
        }
    }

    /// `BYTES(n)`, or `BYTES(MAX)` when `length` is `None` or too large.
    pub fn bytes(length: Option<u32>) -> Self {
        Self {
            kind: TargetKind::Bytes,
            length: length.filter(|n| *n > 0 && *n <= MAX_BYTES_LENGTH),
            array: false,
        }
    }

    pub fn into_array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Whether the target allows this type in a primary key.
    pub fn is_keyable(&self) -> bool {
        !self.array && self.kind != TargetKind::Json
    }

    /// Element type with the array flag cleared.
    pub fn element(&self) -> Self {
        Self {
            array: false,
            ..self.clone()
        }
    }

    /// Render the type for DDL in the given dialect.
    pub fn render(&self, dialect: TargetDialect) -> String {
        let scalar = match dialect {
            TargetDialect::GoogleSql => self.render_google(),
            TargetDialect::Postgresql => self.render_pg(),
        };
        match (self.array, dialect) {
            (false, _) => scalar,
            (true, TargetDialect::GoogleSql) => format!("ARRAY<{}>", scalar),
            (true, TargetDialect::Postgresql) => format!("{}[]", scalar),
        }
    }

    fn render_google(&self) -> String {
        let len = || {
            self.length
                .map(|n| n.to_string())
                .unwrap_or_else(|| "MAX".to_string())
        };
        match self.kind {
            TargetKind::Bool => "BOOL".to_string(),
            TargetKind::Int64 => "INT64".to_string(),
            TargetKind::Float32 => "FLOAT32".to_string(),
            TargetKind::Float64 => "FLOAT64".to_string(),
            TargetKind::Numeric => "NUMERIC".to_string(),
            TargetKind::String => format!("STRING({})", len()),
            TargetKind::Bytes => format!("BYTES({})", len()),
            TargetKind::Date => "DATE".to_string(),
            TargetKind::Timestamp => "TIMESTAMP".to_string(),
            TargetKind::Json => "JSON".to_string(),
        }
    }

    fn render_pg(&self) -> String {
        match self.kind {
            TargetKind::Bool => "boolean".to_string(),
            TargetKind::Int64 => "bigint".to_string(),
            TargetKind::Float32 => "real".to_string(),
            TargetKind::Float64 => "double precision".to_string(),
            TargetKind::Numeric => "numeric".to_string(),
            TargetKind::String => match self.length {
                Some(n) => format!("varchar({})", n),
                None => "text".to_string(),
            },
            TargetKind::Bytes => "bytea".to_string(),
            TargetKind::Date => "date".to_string(),
            TargetKind::Timestamp => "timestamptz".to_string(),
            TargetKind::Json => "jsonb".to_string(),
        }
    }
}

/// How faithfully a source type or constraint survives the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Exact,
    Lossy,
    Unsupported,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Exact => "exact",
            Confidence::Lossy => "lossy",
            Confidence::Unsupported => "unsupported",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_precision_and_scale() {
        let t = SourceType::parse("NUMERIC(10, 2)");
        assert_eq!(t.name, "numeric");
        assert_eq!(t.mods, vec![10, 2]);
        assert_eq!(t.raw, "NUMERIC(10, 2)");
    }

    #[test]
    fn test_parse_params_in_middle() {
        let t = SourceType::parse("timestamp(3) with time zone");
        assert_eq!(t.name, "timestamp with time zone");
        assert_eq!(t.mods, vec![3]);

        let t = SourceType::parse("int(11) unsigned");
        assert_eq!(t.name, "int unsigned");
        assert_eq!(t.modifier(0), Some(11));
    }

    #[test]
    fn test_parse_enum_values() {
        let t = SourceType::parse("enum('new','it''s','done')");
        assert_eq!(t.name, "enum");
        assert_eq!(t.values, vec!["new", "it's", "done"]);
        assert!(t.mods.is_empty());
    }

    #[test]
    fn test_parse_arrays() {
        let t = SourceType::parse("text[][]");
        assert_eq!(t.name, "text");
        assert_eq!(t.array_dims, 2);
        assert_eq!(t.element().array_dims, 1);

        let t = SourceType::parse("integer ARRAY");
        assert_eq!(t.name, "integer");
        assert_eq!(t.array_dims, 1);
    }

    #[test]
    fn test_parse_spatial_subtype() {
        let t = SourceType::parse("geometry(Point,4326)");
        assert_eq!(t.name, "geometry");
        assert_eq!(t.values, vec!["Point"]);
        assert_eq!(t.mods, vec![4326]);
    }

    #[test]
    fn test_render_google() {
        assert_eq!(
            TargetType::scalar(TargetKind::Int64).render(TargetDialect::GoogleSql),
            "INT64"
        );
        assert_eq!(
            TargetType::string(None).render(TargetDialect::GoogleSql),
            "STRING(MAX)"
        );
        assert_eq!(
            TargetType::string(Some(36)).render(TargetDialect::GoogleSql),
            "STRING(36)"
        );
        assert_eq!(
            TargetType::scalar(TargetKind::Int64)
                .into_array()
                .render(TargetDialect::GoogleSql),
            "ARRAY<INT64>"
        );
    }

    #[test]
    fn test_render_postgres_interface() {
        assert_eq!(
            TargetType::scalar(TargetKind::Int64).render(TargetDialect::Postgresql),
            "bigint"
        );
        assert_eq!(
            TargetType::string(Some(20)).render(TargetDialect::Postgresql),
            "varchar(20)"
        );
        assert_eq!(
            TargetType::string(None)
                .into_array()
                .render(TargetDialect::Postgresql),
            "text[]"
        );
    }

    #[test]
    fn test_string_length_clamped_to_max() {
        let t = TargetType::string(Some(MAX_STRING_LENGTH + 1));
        assert_eq!(t.length, None);
    }

    #[test]
    fn test_keyable() {
        assert!(TargetType::scalar(TargetKind::String).is_keyable());
        assert!(!TargetType::scalar(TargetKind::Json).is_keyable());
        assert!(!TargetType::scalar(TargetKind::Int64).into_array().is_keyable());
    }

    #[test]
    fn test_source_dialect_from_str() {
        assert_eq!("PostgreSQL".parse::<SourceDialect>().unwrap(), SourceDialect::Postgres);
        assert_eq!("dynamodb".parse::<SourceDialect>().unwrap(), SourceDialect::DynamoDb);
        assert!("oracle".parse::<SourceDialect>().is_err());
    }
}
