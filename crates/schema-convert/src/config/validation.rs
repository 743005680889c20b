//! Configuration validation.

use super::{Config, ConnectionConfig, VerifierConfig};
use crate::core::identifier::validate_identifier;
use crate::core::{SourceDialect, TargetDialect};
use crate::error::{ConvertError, Result};
use crate::pg::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    match (&config.source.dump, &config.source.connection) {
        (Some(_), Some(_)) => {
            return Err(ConvertError::Config(
                "source.dump and source.connection are mutually exclusive".into(),
            ))
        }
        (None, None) => {
            return Err(ConvertError::Config(
                "one of source.dump or source.connection is required".into(),
            ))
        }
        (Some(path), None) if path.as_os_str().is_empty() => {
            return Err(ConvertError::Config("source.dump cannot be empty".into()))
        }
        (None, Some(conn)) => {
            if config.source.dialect != SourceDialect::Postgres {
                return Err(ConvertError::Config(format!(
                    "source.connection is only supported for postgres, got '{}'",
                    config.source.dialect
                )));
            }
            validate_connection("source.connection", conn)?;
            if conn.schemas.is_empty() {
                return Err(ConvertError::Config(
                    "source.connection.schemas must list at least one schema".into(),
                ));
            }
        }
        _ => {}
    }

    // Target validation
    match &config.target.verifier {
        Some(VerifierConfig::Postgres(conn)) => {
            // The wire-protocol verifier plans PostgreSQL-interface SQL only
            if config.target.dialect != TargetDialect::Postgresql {
                return Err(ConvertError::Config(format!(
                    "target.verifier kind 'postgres' requires target.dialect postgresql, got '{}'",
                    config.target.dialect.as_str()
                )));
            }
            validate_connection("target.verifier", conn)?
        }
        Some(VerifierConfig::Http { url }) => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConvertError::Config(format!(
                    "target.verifier.url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }
        None => {}
    }
    if config.target.timeout_secs == 0 {
        return Err(ConvertError::Config(
            "target.timeout_secs must be at least 1".into(),
        ));
    }

    // Conversion config validation - only check if explicitly set
    if let Some(0) = config.conversion.verify_workers {
        return Err(ConvertError::Config(
            "conversion.verify_workers must be at least 1".into(),
        ));
    }
    validate_identifier(&config.conversion.synthetic_key_column).map_err(|e| {
        ConvertError::Config(format!("conversion.synthetic_key_column: {}", e))
    })?;

    Ok(())
}

fn validate_connection(field: &str, conn: &ConnectionConfig) -> Result<()> {
    if conn.host.is_empty() {
        return Err(ConvertError::Config(format!("{}.host is required", field)));
    }
    if conn.database.is_empty() {
        return Err(ConvertError::Config(format!(
            "{}.database is required",
            field
        )));
    }
    if conn.user.is_empty() {
        return Err(ConvertError::Config(format!("{}.user is required", field)));
    }
    SslMode::parse(&conn.ssl_mode)?;
    Ok(())
}
