//! # schema-convert
//!
//! Schema conversion engine: reads a source database schema, maps it onto
//! a distributed SQL target and reports everything that did not translate
//! exactly.
//!
//! - **Sources**: PostgreSQL and MySQL schema dumps, live PostgreSQL,
//!   DynamoDB table exports
//! - **Targets**: GoogleSQL or PostgreSQL-interface DDL
//! - **Verification** of defaults, generated columns and checks against a
//!   live planning endpoint, without side effects
//! - **Sessions**: versioned snapshots to resume without the source
//!
//! ## Example
//!
//! ```rust,no_run
//! use schema_convert::{Config, Converter, OutputPaths};
//!
//! #[tokio::main]
//! async fn main() -> schema_convert::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let prefix = config.output_prefix();
//!     let converter = Converter::new(config);
//!     let mut conv = converter.convert_from_source().await?;
//!     let report = converter.persist(&mut conv, &OutputPaths::from_prefix(&prefix))?;
//!     println!("{}", report.render_text());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod pg;
pub mod report;
pub mod source;
pub mod state;
pub mod verify;

// Re-exports for convenient access
pub use config::{Config, ConversionConfig, NameCollisionPolicy, SourceConfig, TargetConfig};
pub use core::{Conv, Issue, IssueCategory, SourceDialect, TargetDialect};
pub use ddl::DdlEmitter;
pub use error::{ConvertError, Result};
pub use mapper::Mapper;
pub use orchestrator::{Converter, OutputPaths};
pub use report::Report;
pub use source::{SchemaBuilder, SchemaReader};
pub use state::{Session, SessionStore};
pub use verify::{ExpressionVerifier, VerificationChannel, VerificationRequest, Verdict};
