//! Source schema readers.
//!
//! Each reader describes the source schema to a [`SchemaBuilder`], which owns
//! identifier allocation, namespace flattening and foreign-key resolution.

mod builder;
mod dump;
mod dynamodb;
mod postgres;
mod splitter;

pub use builder::{
    is_sequence_default, CheckDraft, ColumnDraft, ForeignKeyDraft, IndexDraft, SchemaBuilder,
    TableDraft,
};
pub use dump::DumpReader;
pub use dynamodb::{DynamoDbReader, DOMINANT_TYPE_THRESHOLD};
pub use postgres::PostgresReader;
pub use splitter::{split_statements, RawStatement};

use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::core::SourceDialect;
use crate::error::{ConvertError, Result};

/// Trait for source schema readers.
#[async_trait]
pub trait SchemaReader: Send {
    /// Dialect this reader understands.
    fn dialect(&self) -> SourceDialect;

    /// Describe every table to `builder`. Readers check
    /// [`SchemaBuilder::should_stop`] between tables.
    async fn read(&mut self, builder: &mut SchemaBuilder) -> Result<()>;
}

/// Select the reader for a source configuration.
pub fn open_reader(config: &SourceConfig) -> Result<Box<dyn SchemaReader>> {
    match (config.dialect, &config.dump, &config.connection) {
        (SourceDialect::DynamoDb, Some(path), _) => Ok(Box::new(DynamoDbReader::new(path))),
        (dialect, Some(path), _) => Ok(Box::new(DumpReader::new(dialect, path)?)),
        (SourceDialect::Postgres, None, Some(conn)) => {
            Ok(Box::new(PostgresReader::new(conn.clone())))
        }
        (dialect, None, _) => Err(ConvertError::Config(format!(
            "no readable source configured for {}",
            dialect
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_open_reader_by_dialect() {
        let config = SourceConfig {
            dialect: SourceDialect::DynamoDb,
            dump: Some(PathBuf::from("export.json")),
            connection: None,
        };
        assert_eq!(open_reader(&config).unwrap().dialect(), SourceDialect::DynamoDb);

        let config = SourceConfig {
            dialect: SourceDialect::Mysql,
            dump: Some(PathBuf::from("dump.sql")),
            connection: None,
        };
        assert_eq!(open_reader(&config).unwrap().dialect(), SourceDialect::Mysql);

        let config = SourceConfig {
            dialect: SourceDialect::Mysql,
            dump: None,
            connection: None,
        };
        assert!(open_reader(&config).is_err());
    }
}
