//! Hub-and-spoke canonical type system.
//!
//! Each source dialect converts its native types to a [`CanonicalType`]
//! (`ToCanonical`); the target converts canonical types to a
//! [`TargetType`] (`FromCanonical`). Adding a source dialect needs one
//! new spoke, not a new mapping table per target.
//!
//! ```text
//! Source type      →  CanonicalType   →  Target type
//!   numeric(10,2)  →  Decimal(10,2)   →  NUMERIC
//!   tinyint(1)     →  Boolean         →  BOOL
//! ```

use std::sync::Arc;

use crate::core::{Confidence, SourceDialect, SourceType, TargetType};

/// Canonical type representation shared by all dialects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalType {
    // ===== Boolean =====
    Boolean,

    // ===== Integer Types =====
    /// 8-bit unsigned integer (MySQL TINYINT UNSIGNED).
    UInt8,
    Int16,
    Int32,
    Int64,
    /// 64-bit unsigned integer (MySQL BIGINT UNSIGNED).
    UInt64,

    // ===== Floating Point =====
    Float32,
    Float64,

    // ===== Decimal/Numeric =====
    /// Exact decimal; `None` precision means unconstrained.
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    /// Money with fixed precision.
    Money,

    // ===== String Types =====
    /// Fixed-length character string.
    Char(u32),
    /// Variable-length character string; 0 means unlimited.
    Varchar(u32),
    Text,

    // ===== Binary Types =====
    Binary(u32),
    /// Variable-length binary data; 0 means unlimited.
    Varbinary(u32),
    Blob,

    // ===== Date/Time Types =====
    Date,
    Time,
    TimeTz,
    /// Date and time without timezone.
    DateTime,
    /// Date and time with timezone.
    DateTimeTz,
    Interval,
    /// MySQL YEAR.
    Year,

    // ===== Special Types =====
    Uuid,
    Json,
    /// Binary JSON (PostgreSQL jsonb).
    JsonBinary,
    Xml,

    // ===== Bit Strings =====
    Bit(u32),
    VarBit(u32),

    // ===== Network Types =====
    InetAddr,
    CidrAddr,
    MacAddr,

    // ===== Geometric Types =====
    Point,
    Line,
    Polygon,
    Geometry,
    Geography,

    // ===== Full-Text Search =====
    TsVector,
    TsQuery,

    // ===== Range Types =====
    /// Range over the named element type (`int4range`, `tstzrange`, ...).
    Range(String),

    // ===== Collections =====
    Array(Box<CanonicalType>),
    /// MySQL ENUM with its members.
    Enum(Vec<String>),
    /// MySQL SET with its members.
    Set(Vec<String>),

    // ===== Fallback =====
    /// Type with no canonical equivalent; holds the original name.
    Unknown(String),
}

impl std::fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanonicalType::Decimal {
                precision: Some(p),
                scale,
            } => write!(f, "Decimal({},{})", p, scale.unwrap_or(0)),
            CanonicalType::Decimal { precision: None, .. } => write!(f, "Decimal"),
            CanonicalType::Char(n) => write!(f, "Char({})", n),
            CanonicalType::Varchar(n) => write!(f, "Varchar({})", n),
            CanonicalType::Binary(n) => write!(f, "Binary({})", n),
            CanonicalType::Varbinary(n) => write!(f, "Varbinary({})", n),
            CanonicalType::Bit(n) => write!(f, "Bit({})", n),
            CanonicalType::VarBit(n) => write!(f, "VarBit({})", n),
            CanonicalType::Range(name) => write!(f, "Range({})", name),
            CanonicalType::Array(inner) => write!(f, "Array({})", inner),
            CanonicalType::Enum(vals) => write!(f, "Enum({:?})", vals),
            CanonicalType::Set(vals) => write!(f, "Set({:?})", vals),
            CanonicalType::Unknown(name) => write!(f, "Unknown({})", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Result of converting a native type to canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTypeInfo {
    /// The canonical type representation.
    pub canonical_type: CanonicalType,
    /// Whether information was lost in the conversion to canonical.
    pub is_lossy: bool,
    /// Warning message if the conversion is lossy.
    pub warning: Option<String>,
    /// Set when several canonical types would fit and one was picked.
    pub ambiguity: Option<String>,
}

impl CanonicalTypeInfo {
    /// Create a lossless canonical type conversion.
    pub fn lossless(canonical_type: CanonicalType) -> Self {
        Self {
            canonical_type,
            is_lossy: false,
            warning: None,
            ambiguity: None,
        }
    }

    /// Create a lossy canonical type conversion with a warning.
    pub fn lossy(canonical_type: CanonicalType, warning: impl Into<String>) -> Self {
        Self {
            canonical_type,
            is_lossy: true,
            warning: Some(warning.into()),
            ambiguity: None,
        }
    }

    /// Create a lossless conversion that records the choice made.
    pub fn ambiguous(canonical_type: CanonicalType, note: impl Into<String>) -> Self {
        Self {
            ambiguity: Some(note.into()),
            ..Self::lossless(canonical_type)
        }
    }
}

/// Result of mapping a type to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    /// Target type descriptor.
    pub target_type: TargetType,
    /// Confidence tier of the mapping.
    pub confidence: Confidence,
    /// Explanation for lossy or unsupported mappings.
    pub note: Option<String>,
    /// Explanation when the source type was ambiguous.
    pub ambiguity: Option<String>,
}

impl TypeMapping {
    /// Create an exact type mapping.
    pub fn exact(target_type: TargetType) -> Self {
        Self {
            target_type,
            confidence: Confidence::Exact,
            note: None,
            ambiguity: None,
        }
    }

    /// Create a lossy type mapping with a note.
    pub fn lossy(target_type: TargetType, note: impl Into<String>) -> Self {
        Self {
            target_type,
            confidence: Confidence::Lossy,
            note: Some(note.into()),
            ambiguity: None,
        }
    }

    /// Create a nearest-fit fallback for a type the target cannot represent.
    pub fn unsupported(target_type: TargetType, note: impl Into<String>) -> Self {
        Self {
            target_type,
            confidence: Confidence::Unsupported,
            note: Some(note.into()),
            ambiguity: None,
        }
    }
}

/// Convert native source types to canonical types.
pub trait ToCanonical: Send + Sync {
    /// Source dialect handled by this converter.
    fn dialect(&self) -> SourceDialect;

    /// Convert a parsed source type to canonical form.
    fn to_canonical(&self, source: &SourceType) -> CanonicalTypeInfo;
}

/// Convert canonical types to target types.
#[allow(clippy::wrong_self_convention)]
pub trait FromCanonical: Send + Sync {
    /// Name of the target type system.
    fn target_name(&self) -> &str;

    /// Convert a canonical type to a target mapping.
    fn from_canonical(&self, canonical: &CanonicalType) -> TypeMapping;
}

/// Maps a source type descriptor to a target type descriptor.
pub trait TypeMapper: Send + Sync {
    fn source_dialect(&self) -> SourceDialect;

    fn map_type(&self, source: &SourceType) -> TypeMapping;
}

/// Type mapper that chains `ToCanonical` and `FromCanonical`.
pub struct ComposedMapper {
    /// Converts source types to canonical.
    source_converter: Arc<dyn ToCanonical>,
    /// Converts canonical types to target.
    target_converter: Arc<dyn FromCanonical>,
}

impl ComposedMapper {
    pub fn new(
        source_converter: Arc<dyn ToCanonical>,
        target_converter: Arc<dyn FromCanonical>,
    ) -> Self {
        Self {
            source_converter,
            target_converter,
        }
    }
}

impl std::fmt::Debug for ComposedMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedMapper")
            .field("source", &self.source_converter.dialect())
            .field("target", &self.target_converter.target_name())
            .finish()
    }
}

impl TypeMapper for ComposedMapper {
    fn source_dialect(&self) -> SourceDialect {
        self.source_converter.dialect()
    }

    fn map_type(&self, source: &SourceType) -> TypeMapping {
        // Step 1: Source type → Canonical
        let canonical_info = self.source_converter.to_canonical(source);

        // Step 2: Canonical → Target type
        let mut mapping = self
            .target_converter
            .from_canonical(&canonical_info.canonical_type);

        if canonical_info.is_lossy && mapping.confidence == Confidence::Exact {
            mapping.confidence = Confidence::Lossy;
        }
        mapping.note = match (canonical_info.warning, mapping.note) {
            (Some(src), Some(tgt)) => Some(format!("{} {}", src, tgt)),
            (src, tgt) => src.or(tgt),
        };
        mapping.ambiguity = canonical_info.ambiguity;
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TargetKind;

    #[test]
    fn test_canonical_type_display() {
        assert_eq!(format!("{}", CanonicalType::Int32), "Int32");
        assert_eq!(
            format!(
                "{}",
                CanonicalType::Decimal {
                    precision: Some(10),
                    scale: Some(2)
                }
            ),
            "Decimal(10,2)"
        );
        assert_eq!(
            format!("{}", CanonicalType::Array(Box::new(CanonicalType::Int32))),
            "Array(Int32)"
        );
    }

    #[test]
    fn test_canonical_type_info_constructors() {
        let info = CanonicalTypeInfo::lossless(CanonicalType::Int32);
        assert!(!info.is_lossy);
        assert!(info.warning.is_none());

        let info = CanonicalTypeInfo::lossy(CanonicalType::Json, "binary features unavailable");
        assert!(info.is_lossy);
        assert_eq!(info.warning.as_deref(), Some("binary features unavailable"));

        let info = CanonicalTypeInfo::ambiguous(CanonicalType::Boolean, "tinyint(1)");
        assert!(!info.is_lossy);
        assert!(info.ambiguity.is_some());
    }

    struct MockToCanonical;
    impl ToCanonical for MockToCanonical {
        fn dialect(&self) -> SourceDialect {
            SourceDialect::Postgres
        }

        fn to_canonical(&self, source: &SourceType) -> CanonicalTypeInfo {
            match source.name.as_str() {
                "int" => CanonicalTypeInfo::lossless(CanonicalType::Int32),
                "jsonb" => CanonicalTypeInfo::lossy(CanonicalType::Json, "JSONB operators lost."),
                "flag" => CanonicalTypeInfo::ambiguous(CanonicalType::Boolean, "guessed"),
                _ => CanonicalTypeInfo::lossless(CanonicalType::Text),
            }
        }
    }

    struct MockFromCanonical;
    impl FromCanonical for MockFromCanonical {
        fn target_name(&self) -> &str {
            "mock"
        }

        fn from_canonical(&self, canonical: &CanonicalType) -> TypeMapping {
            match canonical {
                CanonicalType::Int32 => TypeMapping::exact(TargetType::scalar(TargetKind::Int64)),
                CanonicalType::Json => TypeMapping::exact(TargetType::scalar(TargetKind::Json)),
                CanonicalType::Boolean => TypeMapping::exact(TargetType::scalar(TargetKind::Bool)),
                _ => TypeMapping::unsupported(TargetType::string(None), "Unsupported type"),
            }
        }
    }

    fn mapper() -> ComposedMapper {
        ComposedMapper::new(Arc::new(MockToCanonical), Arc::new(MockFromCanonical))
    }

    #[test]
    fn test_composed_mapper_exact() {
        let mapping = mapper().map_type(&SourceType::parse("int"));
        assert_eq!(mapping.target_type, TargetType::scalar(TargetKind::Int64));
        assert_eq!(mapping.confidence, Confidence::Exact);
        assert!(mapping.note.is_none());
    }

    #[test]
    fn test_composed_mapper_lossy_from_source() {
        let mapping = mapper().map_type(&SourceType::parse("jsonb"));
        assert_eq!(mapping.confidence, Confidence::Lossy);
        assert!(mapping.note.unwrap().contains("JSONB"));
    }

    #[test]
    fn test_composed_mapper_keeps_unsupported_and_ambiguity() {
        let mapping = mapper().map_type(&SourceType::parse("text"));
        assert_eq!(mapping.confidence, Confidence::Unsupported);

        let mapping = mapper().map_type(&SourceType::parse("flag"));
        assert_eq!(mapping.ambiguity.as_deref(), Some("guessed"));
        assert_eq!(mapping.confidence, Confidence::Exact);
    }
}
