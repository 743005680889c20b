//! Type mapping between source dialects and the target type system.
//!
//! Mappers are selected by source dialect tag:
//!
//! ```rust,ignore
//! let mapper = dialect::mapper_for(SourceDialect::Postgres);
//! let mapping = mapper.map_type(&SourceType::parse("numeric(10,2)"));
//! assert_eq!(mapping.target_type.render(TargetDialect::GoogleSql), "NUMERIC");
//! ```

mod canonical;
mod typemap;

pub use canonical::{
    CanonicalType, CanonicalTypeInfo, ComposedMapper, FromCanonical, ToCanonical, TypeMapper,
    TypeMapping,
};
pub use typemap::{
    mapper_for, DynamoToCanonical, MysqlToCanonical, PostgresToCanonical, SpannerFromCanonical,
    NUMERIC_MAX_PRECISION, NUMERIC_MAX_SCALE,
};
