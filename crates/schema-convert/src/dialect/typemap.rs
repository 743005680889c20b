//! Per-dialect spokes of the canonical type hub and the target spoke.

use std::sync::Arc;

use super::canonical::{
    CanonicalType, CanonicalTypeInfo, ComposedMapper, FromCanonical, ToCanonical, TypeMapping,
};
use crate::core::{SourceDialect, SourceType, TargetKind, TargetType};

/// Largest NUMERIC precision the target stores exactly.
pub const NUMERIC_MAX_PRECISION: u32 = 38;

/// Largest NUMERIC scale the target stores exactly.
pub const NUMERIC_MAX_SCALE: u32 = 9;

/// Build the composed mapper for a source dialect.
pub fn mapper_for(dialect: SourceDialect) -> ComposedMapper {
    let source: Arc<dyn ToCanonical> = match dialect {
        SourceDialect::Postgres => Arc::new(PostgresToCanonical),
        SourceDialect::Mysql => Arc::new(MysqlToCanonical),
        SourceDialect::DynamoDb => Arc::new(DynamoToCanonical),
    };
    ComposedMapper::new(source, Arc::new(SpannerFromCanonical))
}

fn length_mod(source: &SourceType, default: u32) -> u32 {
    source
        .modifier(0)
        .filter(|n| *n > 0)
        .map(|n| n.min(u32::MAX as i64) as u32)
        .unwrap_or(default)
}

/// Wrap the element conversion in `Array` for array-typed sources.
fn array_of(inner: CanonicalTypeInfo) -> CanonicalTypeInfo {
    CanonicalTypeInfo {
        canonical_type: CanonicalType::Array(Box::new(inner.canonical_type)),
        ..inner
    }
}

// =============================================================================
// PostgreSQL → Canonical
// =============================================================================

/// PostgreSQL to canonical type converter.
pub struct PostgresToCanonical;

impl ToCanonical for PostgresToCanonical {
    fn dialect(&self) -> SourceDialect {
        SourceDialect::Postgres
    }

    fn to_canonical(&self, source: &SourceType) -> CanonicalTypeInfo {
        if source.array_dims > 0 {
            return array_of(self.to_canonical(&source.element()));
        }
        // Underscore-prefixed internal array names (_int4)
        if let Some(base) = source.name.strip_prefix('_') {
            let mut element = source.clone();
            element.name = base.to_string();
            return array_of(self.to_canonical(&element));
        }

        match source.name.as_str() {
            // Boolean
            "bool" | "boolean" => CanonicalTypeInfo::lossless(CanonicalType::Boolean),

            // Integer types
            "int2" | "smallint" | "smallserial" | "serial2" => {
                CanonicalTypeInfo::lossless(CanonicalType::Int16)
            }
            "int4" | "integer" | "int" | "serial" | "serial4" => {
                CanonicalTypeInfo::lossless(CanonicalType::Int32)
            }
            "int8" | "bigint" | "bigserial" | "serial8" | "oid" => {
                CanonicalTypeInfo::lossless(CanonicalType::Int64)
            }

            // Floating point
            "float4" | "real" => CanonicalTypeInfo::lossless(CanonicalType::Float32),
            "float8" | "double precision" => CanonicalTypeInfo::lossless(CanonicalType::Float64),
            "float" => match source.modifier(0) {
                Some(p) if p <= 24 => CanonicalTypeInfo::lossless(CanonicalType::Float32),
                _ => CanonicalTypeInfo::lossless(CanonicalType::Float64),
            },

            // Decimal/numeric
            "numeric" | "decimal" => CanonicalTypeInfo::lossless(CanonicalType::Decimal {
                precision: source.modifier(0).map(|p| p.max(0) as u32),
                scale: source
                    .modifier(0)
                    .map(|_| source.modifier(1).unwrap_or(0).max(0) as u32),
            }),
            "money" => CanonicalTypeInfo::lossless(CanonicalType::Money),

            // String types
            "char" | "character" | "bpchar" => {
                CanonicalTypeInfo::lossless(CanonicalType::Char(length_mod(source, 1)))
            }
            "varchar" | "character varying" => {
                CanonicalTypeInfo::lossless(CanonicalType::Varchar(length_mod(source, 0)))
            }
            "text" | "citext" => CanonicalTypeInfo::lossless(CanonicalType::Text),
            "name" => CanonicalTypeInfo::lossless(CanonicalType::Varchar(63)),

            // Binary types
            "bytea" => CanonicalTypeInfo::lossless(CanonicalType::Blob),

            // Date/time types
            "date" => CanonicalTypeInfo::lossless(CanonicalType::Date),
            "time" | "time without time zone" => CanonicalTypeInfo::lossless(CanonicalType::Time),
            "timetz" | "time with time zone" => CanonicalTypeInfo::lossless(CanonicalType::TimeTz),
            "timestamp" | "timestamp without time zone" => {
                CanonicalTypeInfo::lossless(CanonicalType::DateTime)
            }
            "timestamptz" | "timestamp with time zone" => {
                CanonicalTypeInfo::lossless(CanonicalType::DateTimeTz)
            }
            "interval" => CanonicalTypeInfo::lossless(CanonicalType::Interval),

            // Special types
            "uuid" => CanonicalTypeInfo::lossless(CanonicalType::Uuid),
            "json" => CanonicalTypeInfo::lossless(CanonicalType::Json),
            "jsonb" => CanonicalTypeInfo::lossless(CanonicalType::JsonBinary),
            "xml" => CanonicalTypeInfo::lossless(CanonicalType::Xml),

            // Bit strings
            "bit" => CanonicalTypeInfo::lossless(CanonicalType::Bit(length_mod(source, 1))),
            "varbit" | "bit varying" => {
                CanonicalTypeInfo::lossless(CanonicalType::VarBit(length_mod(source, 0)))
            }

            // Network types
            "inet" => CanonicalTypeInfo::lossless(CanonicalType::InetAddr),
            "cidr" => CanonicalTypeInfo::lossless(CanonicalType::CidrAddr),
            "macaddr" | "macaddr8" => CanonicalTypeInfo::lossless(CanonicalType::MacAddr),

            // Geometric types
            "point" => CanonicalTypeInfo::lossless(CanonicalType::Point),
            "line" | "lseg" => CanonicalTypeInfo::lossless(CanonicalType::Line),
            "box" | "path" | "polygon" | "circle" => {
                CanonicalTypeInfo::lossless(CanonicalType::Polygon)
            }
            "geometry" => CanonicalTypeInfo::lossless(CanonicalType::Geometry),
            "geography" => CanonicalTypeInfo::lossless(CanonicalType::Geography),

            // Full-text search
            "tsvector" => CanonicalTypeInfo::lossless(CanonicalType::TsVector),
            "tsquery" => CanonicalTypeInfo::lossless(CanonicalType::TsQuery),

            // Range types
            "int4range" | "int8range" | "numrange" | "tsrange" | "tstzrange" | "daterange" => {
                CanonicalTypeInfo::lossless(CanonicalType::Range(source.name.clone()))
            }

            // User-defined enum, resolved by the reader from CREATE TYPE ... AS ENUM
            "enum" => CanonicalTypeInfo::lossless(CanonicalType::Enum(source.values.clone())),

            // Default fallback
            _ => CanonicalTypeInfo::lossy(
                CanonicalType::Unknown(source.raw.clone()),
                format!("Unknown PostgreSQL type '{}'.", source.raw),
            ),
        }
    }
}

// =============================================================================
// MySQL → Canonical
// =============================================================================

/// MySQL to canonical type converter.
pub struct MysqlToCanonical;

impl ToCanonical for MysqlToCanonical {
    fn dialect(&self) -> SourceDialect {
        SourceDialect::Mysql
    }

    fn to_canonical(&self, source: &SourceType) -> CanonicalTypeInfo {
        let words: Vec<&str> = source.name.split_whitespace().collect();
        let unsigned = words.contains(&"unsigned");
        let base = words
            .iter()
            .filter(|w| !matches!(**w, "unsigned" | "signed" | "zerofill"))
            .copied()
            .collect::<Vec<_>>()
            .join(" ");

        match base.as_str() {
            // MySQL declares BOOLEAN as TINYINT(1); a bare TINYINT(1) is
            // usually a flag but can hold -128..127.
            "bool" | "boolean" => CanonicalTypeInfo::lossless(CanonicalType::Boolean),
            "tinyint" if source.modifier(0) == Some(1) => CanonicalTypeInfo::ambiguous(
                CanonicalType::Boolean,
                "TINYINT(1) treated as boolean; values other than 0 and 1 would not survive.",
            ),

            // Integer types
            "tinyint" if unsigned => CanonicalTypeInfo::lossless(CanonicalType::UInt8),
            "tinyint" | "smallint" => CanonicalTypeInfo::lossless(CanonicalType::Int16),
            "mediumint" => CanonicalTypeInfo::lossless(CanonicalType::Int32),
            "int" | "integer" if unsigned => CanonicalTypeInfo::lossless(CanonicalType::Int64),
            "int" | "integer" => CanonicalTypeInfo::lossless(CanonicalType::Int32),
            "bigint" if unsigned => CanonicalTypeInfo::lossless(CanonicalType::UInt64),
            "bigint" => CanonicalTypeInfo::lossless(CanonicalType::Int64),

            // Floating point
            "float" => match source.modifier(0) {
                Some(p) if p > 24 => CanonicalTypeInfo::lossless(CanonicalType::Float64),
                _ => CanonicalTypeInfo::lossless(CanonicalType::Float32),
            },
            "double" | "double precision" | "real" => {
                CanonicalTypeInfo::lossless(CanonicalType::Float64)
            }

            // Decimal/numeric: MySQL defaults to DECIMAL(10,0)
            "decimal" | "numeric" | "dec" | "fixed" => {
                CanonicalTypeInfo::lossless(CanonicalType::Decimal {
                    precision: Some(source.modifier(0).unwrap_or(10).max(0) as u32),
                    scale: Some(source.modifier(1).unwrap_or(0).max(0) as u32),
                })
            }

            // String types
            "char" => CanonicalTypeInfo::lossless(CanonicalType::Char(length_mod(source, 1))),
            "varchar" => CanonicalTypeInfo::lossless(CanonicalType::Varchar(length_mod(source, 0))),
            "tinytext" | "text" | "mediumtext" | "longtext" => {
                CanonicalTypeInfo::lossless(CanonicalType::Text)
            }

            // Binary types
            "binary" => CanonicalTypeInfo::lossless(CanonicalType::Binary(length_mod(source, 1))),
            "varbinary" => {
                CanonicalTypeInfo::lossless(CanonicalType::Varbinary(length_mod(source, 0)))
            }
            "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                CanonicalTypeInfo::lossless(CanonicalType::Blob)
            }

            // Date/time types; TIMESTAMP is stored in UTC
            "date" => CanonicalTypeInfo::lossless(CanonicalType::Date),
            "time" => CanonicalTypeInfo::lossless(CanonicalType::Time),
            "datetime" => CanonicalTypeInfo::lossless(CanonicalType::DateTime),
            "timestamp" => CanonicalTypeInfo::lossless(CanonicalType::DateTimeTz),
            "year" => CanonicalTypeInfo::lossless(CanonicalType::Year),

            // JSON
            "json" => CanonicalTypeInfo::lossless(CanonicalType::Json),

            // Bit
            "bit" => match length_mod(source, 1) {
                1 => CanonicalTypeInfo::lossless(CanonicalType::Boolean),
                n => CanonicalTypeInfo::lossless(CanonicalType::Bit(n)),
            },

            // ENUM and SET
            "enum" => CanonicalTypeInfo::lossless(CanonicalType::Enum(source.values.clone())),
            "set" => CanonicalTypeInfo::lossless(CanonicalType::Set(source.values.clone())),

            // Spatial types
            "geometry" | "point" | "linestring" | "polygon" | "multipoint" | "multilinestring"
            | "multipolygon" | "geometrycollection" => {
                CanonicalTypeInfo::lossless(CanonicalType::Geometry)
            }

            // Default fallback
            _ => CanonicalTypeInfo::lossy(
                CanonicalType::Unknown(source.raw.clone()),
                format!("Unknown MySQL type '{}'.", source.raw),
            ),
        }
    }
}

// =============================================================================
// DynamoDB → Canonical
// =============================================================================

/// DynamoDB attribute type converter.
///
/// Source type names are the attribute type descriptors (`S`, `N`, `B`,
/// `BOOL`, `SS`, `NS`, `BS`, `L`, `M`).
pub struct DynamoToCanonical;

impl ToCanonical for DynamoToCanonical {
    fn dialect(&self) -> SourceDialect {
        SourceDialect::DynamoDb
    }

    fn to_canonical(&self, source: &SourceType) -> CanonicalTypeInfo {
        let number = CanonicalType::Decimal {
            precision: None,
            scale: None,
        };
        match source.name.as_str() {
            "s" => CanonicalTypeInfo::lossless(CanonicalType::Text),
            "n" => CanonicalTypeInfo::lossless(number),
            "b" => CanonicalTypeInfo::lossless(CanonicalType::Blob),
            "bool" => CanonicalTypeInfo::lossless(CanonicalType::Boolean),
            "ss" => CanonicalTypeInfo::lossless(CanonicalType::Array(Box::new(
                CanonicalType::Text,
            ))),
            "ns" => CanonicalTypeInfo::lossless(CanonicalType::Array(Box::new(number))),
            "bs" => CanonicalTypeInfo::lossless(CanonicalType::Array(Box::new(
                CanonicalType::Blob,
            ))),
            "l" | "m" => CanonicalTypeInfo::lossless(CanonicalType::Json),
            _ => CanonicalTypeInfo::lossy(
                CanonicalType::Unknown(source.raw.clone()),
                format!("Unknown DynamoDB attribute type '{}'.", source.raw),
            ),
        }
    }
}

// =============================================================================
// Canonical → target
// =============================================================================

/// Canonical to distributed-target type converter.
pub struct SpannerFromCanonical;

impl FromCanonical for SpannerFromCanonical {
    fn target_name(&self) -> &str {
        "spanner"
    }

    fn from_canonical(&self, canonical: &CanonicalType) -> TypeMapping {
        let scalar = TargetType::scalar;
        match canonical {
            CanonicalType::Boolean => TypeMapping::exact(scalar(TargetKind::Bool)),
            CanonicalType::UInt8
            | CanonicalType::Int16
            | CanonicalType::Int32
            | CanonicalType::Int64
            | CanonicalType::Year => TypeMapping::exact(scalar(TargetKind::Int64)),
            CanonicalType::UInt64 => TypeMapping::lossy(
                scalar(TargetKind::Numeric),
                "Unsigned 64-bit values exceed INT64; stored as NUMERIC.",
            ),
            CanonicalType::Float32 => TypeMapping::exact(scalar(TargetKind::Float32)),
            CanonicalType::Float64 => TypeMapping::exact(scalar(TargetKind::Float64)),

            CanonicalType::Decimal {
                precision: Some(p),
                scale,
            } => {
                let s = scale.unwrap_or(0);
                if *p <= NUMERIC_MAX_PRECISION && s <= NUMERIC_MAX_SCALE && s <= *p {
                    TypeMapping::exact(scalar(TargetKind::Numeric))
                } else {
                    TypeMapping::lossy(
                        scalar(TargetKind::Numeric),
                        format!(
                            "DECIMAL({},{}) exceeds NUMERIC precision {} / scale {}.",
                            p, s, NUMERIC_MAX_PRECISION, NUMERIC_MAX_SCALE
                        ),
                    )
                }
            }
            CanonicalType::Decimal { precision: None, .. } => TypeMapping::lossy(
                scalar(TargetKind::Numeric),
                format!(
                    "Unconstrained numeric stored as NUMERIC; values beyond precision {} / scale {} are rounded.",
                    NUMERIC_MAX_PRECISION, NUMERIC_MAX_SCALE
                ),
            ),
            CanonicalType::Money => TypeMapping::exact(scalar(TargetKind::Numeric)),

            CanonicalType::Char(n) | CanonicalType::Varchar(n) => {
                TypeMapping::exact(TargetType::string(Some(*n).filter(|n| *n > 0)))
            }
            CanonicalType::Text => TypeMapping::exact(TargetType::string(None)),
            CanonicalType::Binary(n) | CanonicalType::Varbinary(n) => {
                TypeMapping::exact(TargetType::bytes(Some(*n).filter(|n| *n > 0)))
            }
            CanonicalType::Blob => TypeMapping::exact(TargetType::bytes(None)),

            CanonicalType::Date => TypeMapping::exact(scalar(TargetKind::Date)),
            CanonicalType::DateTimeTz => TypeMapping::exact(scalar(TargetKind::Timestamp)),
            CanonicalType::DateTime => TypeMapping::lossy(
                scalar(TargetKind::Timestamp),
                "Timestamp without time zone is stored as TIMESTAMP and interpreted as UTC.",
            ),
            CanonicalType::Time | CanonicalType::TimeTz => TypeMapping::lossy(
                TargetType::string(None),
                "Time of day has no target type; stored as text.",
            ),
            CanonicalType::Interval => TypeMapping::lossy(
                TargetType::string(None),
                "Interval has no target type; stored as text.",
            ),

            CanonicalType::Uuid => TypeMapping::exact(TargetType::string(Some(36))),
            CanonicalType::Json | CanonicalType::JsonBinary => {
                TypeMapping::exact(scalar(TargetKind::Json))
            }
            CanonicalType::Xml => TypeMapping::lossy(
                TargetType::string(None),
                "XML stored as text; document validation is lost.",
            ),

            CanonicalType::Bit(1) => TypeMapping::exact(scalar(TargetKind::Bool)),
            CanonicalType::Bit(n) | CanonicalType::VarBit(n) => TypeMapping::lossy(
                TargetType::bytes(Some(n.div_ceil(8)).filter(|n| *n > 0)),
                "Bit string stored as bytes.",
            ),

            CanonicalType::InetAddr | CanonicalType::CidrAddr | CanonicalType::MacAddr => {
                TypeMapping::lossy(
                    TargetType::string(None),
                    "Network address stored as text; address operators are lost.",
                )
            }

            CanonicalType::Enum(values) => TypeMapping::lossy(
                TargetType::string(None),
                format!(
                    "ENUM stored as STRING; allowed values ({}) are not enforced.",
                    values.join(", ")
                ),
            ),
            CanonicalType::Set(values) => TypeMapping::lossy(
                TargetType::string(None).into_array(),
                format!(
                    "SET stored as ARRAY<STRING>; allowed values ({}) are not enforced.",
                    values.join(", ")
                ),
            ),

            CanonicalType::Array(inner) => {
                if matches!(**inner, CanonicalType::Array(_)) {
                    return TypeMapping::unsupported(
                        TargetType::string(None),
                        "Multi-dimensional arrays are not supported; stored as text.",
                    );
                }
                let element = self.from_canonical(inner);
                if element.target_type.array {
                    return TypeMapping::unsupported(
                        TargetType::string(None),
                        format!("Array of {} is not supported; stored as text.", inner),
                    );
                }
                TypeMapping {
                    target_type: element.target_type.into_array(),
                    ..element
                }
            }

            CanonicalType::Point
            | CanonicalType::Line
            | CanonicalType::Polygon
            | CanonicalType::Geometry
            | CanonicalType::Geography => TypeMapping::unsupported(
                TargetType::string(None),
                "Spatial type has no target equivalent; stored as its text encoding.",
            ),
            CanonicalType::TsVector | CanonicalType::TsQuery => TypeMapping::unsupported(
                TargetType::string(None),
                "Full-text search type has no target equivalent; stored as text.",
            ),
            CanonicalType::Range(name) => TypeMapping::unsupported(
                TargetType::string(None),
                format!("Range type '{}' has no target equivalent; stored as text.", name),
            ),
            CanonicalType::Unknown(name) => TypeMapping::unsupported(
                TargetType::string(None),
                format!("No mapping for '{}'; stored as text.", name),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Confidence, TargetDialect};
    use crate::dialect::TypeMapper;

    fn map(dialect: SourceDialect, ty: &str) -> TypeMapping {
        mapper_for(dialect).map_type(&SourceType::parse(ty))
    }

    fn google(m: &TypeMapping) -> String {
        m.target_type.render(TargetDialect::GoogleSql)
    }

    #[test]
    fn test_postgres_integers_exact() {
        for ty in ["int", "integer", "bigint", "smallint", "serial", "int4"] {
            let m = map(SourceDialect::Postgres, ty);
            assert_eq!(google(&m), "INT64", "{}", ty);
            assert_eq!(m.confidence, Confidence::Exact, "{}", ty);
        }
    }

    #[test]
    fn test_decimal_within_limits_is_exact() {
        let m = map(SourceDialect::Postgres, "DECIMAL(10,2)");
        assert_eq!(google(&m), "NUMERIC");
        assert_eq!(m.confidence, Confidence::Exact);
        assert!(m.note.is_none());
    }

    #[test]
    fn test_decimal_beyond_limits_is_lossy() {
        let m = map(SourceDialect::Postgres, "numeric(40,2)");
        assert_eq!(m.confidence, Confidence::Lossy);
        let m = map(SourceDialect::Postgres, "numeric(20,12)");
        assert_eq!(m.confidence, Confidence::Lossy);
        let m = map(SourceDialect::Postgres, "numeric");
        assert_eq!(m.confidence, Confidence::Lossy);
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            google(&map(SourceDialect::Postgres, "character varying(20)")),
            "STRING(20)"
        );
        assert_eq!(google(&map(SourceDialect::Postgres, "text")), "STRING(MAX)");
        assert_eq!(google(&map(SourceDialect::Postgres, "uuid")), "STRING(36)");
        assert_eq!(google(&map(SourceDialect::Mysql, "varchar(255)")), "STRING(255)");
    }

    #[test]
    fn test_timestamps() {
        let m = map(SourceDialect::Postgres, "timestamp with time zone");
        assert_eq!(google(&m), "TIMESTAMP");
        assert_eq!(m.confidence, Confidence::Exact);

        let m = map(SourceDialect::Postgres, "timestamp(6) without time zone");
        assert_eq!(google(&m), "TIMESTAMP");
        assert_eq!(m.confidence, Confidence::Lossy);

        let m = map(SourceDialect::Mysql, "timestamp");
        assert_eq!(m.confidence, Confidence::Exact);
    }

    #[test]
    fn test_spatial_falls_back_to_string() {
        let m = map(SourceDialect::Postgres, "geometry(Point,4326)");
        assert_eq!(google(&m), "STRING(MAX)");
        assert_eq!(m.confidence, Confidence::Unsupported);
        assert!(m.note.is_some());

        let m = map(SourceDialect::Mysql, "polygon");
        assert_eq!(m.confidence, Confidence::Unsupported);
    }

    #[test]
    fn test_unknown_type_falls_back() {
        let m = map(SourceDialect::Postgres, "hstore");
        assert_eq!(google(&m), "STRING(MAX)");
        assert_eq!(m.confidence, Confidence::Unsupported);
    }

    #[test]
    fn test_arrays() {
        let m = map(SourceDialect::Postgres, "integer[]");
        assert_eq!(google(&m), "ARRAY<INT64>");
        assert_eq!(m.confidence, Confidence::Exact);

        let m = map(SourceDialect::Postgres, "text[][]");
        assert_eq!(google(&m), "STRING(MAX)");
        assert_eq!(m.confidence, Confidence::Unsupported);
    }

    #[test]
    fn test_mysql_tinyint_one_is_ambiguous_bool() {
        let m = map(SourceDialect::Mysql, "tinyint(1)");
        assert_eq!(google(&m), "BOOL");
        assert!(m.ambiguity.is_some());

        let m = map(SourceDialect::Mysql, "tinyint(4)");
        assert_eq!(google(&m), "INT64");
        assert!(m.ambiguity.is_none());
    }

    #[test]
    fn test_mysql_unsigned() {
        let m = map(SourceDialect::Mysql, "bigint(20) unsigned");
        assert_eq!(google(&m), "NUMERIC");
        assert_eq!(m.confidence, Confidence::Lossy);

        let m = map(SourceDialect::Mysql, "int(10) unsigned");
        assert_eq!(google(&m), "INT64");
        assert_eq!(m.confidence, Confidence::Exact);
    }

    #[test]
    fn test_mysql_enum_and_set() {
        let m = map(SourceDialect::Mysql, "enum('a','b')");
        assert_eq!(google(&m), "STRING(MAX)");
        assert_eq!(m.confidence, Confidence::Lossy);
        assert!(m.note.unwrap().contains("a, b"));

        let m = map(SourceDialect::Mysql, "set('x','y')");
        assert_eq!(google(&m), "ARRAY<STRING(MAX)>");
    }

    #[test]
    fn test_dynamodb_attribute_types() {
        assert_eq!(google(&map(SourceDialect::DynamoDb, "S")), "STRING(MAX)");
        assert_eq!(google(&map(SourceDialect::DynamoDb, "BOOL")), "BOOL");
        assert_eq!(google(&map(SourceDialect::DynamoDb, "SS")), "ARRAY<STRING(MAX)>");
        assert_eq!(google(&map(SourceDialect::DynamoDb, "M")), "JSON");
        let m = map(SourceDialect::DynamoDb, "N");
        assert_eq!(google(&m), "NUMERIC");
        assert_eq!(m.confidence, Confidence::Lossy);
    }

    #[test]
    fn test_bit_strings() {
        assert_eq!(google(&map(SourceDialect::Postgres, "bit(1)")), "BOOL");
        let m = map(SourceDialect::Postgres, "bit(12)");
        assert_eq!(google(&m), "BYTES(2)");
        assert_eq!(m.confidence, Confidence::Lossy);
    }

    #[test]
    fn test_postgres_interface_rendering() {
        let m = map(SourceDialect::Postgres, "bigint[]");
        assert_eq!(m.target_type.render(TargetDialect::Postgresql), "bigint[]");
        let m = map(SourceDialect::Postgres, "varchar(10)");
        assert_eq!(m.target_type.render(TargetDialect::Postgresql), "varchar(10)");
    }
}
