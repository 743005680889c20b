//! Identifier validation and quoting for generated DDL and check queries.
//!
//! Identifiers cannot be bound as parameters, so every name that reaches
//! generated SQL is validated and quoted here.

use crate::core::types::TargetDialect;
use crate::error::{ConvertError, Result};

/// Maximum identifier length accepted by the target.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier.
///
/// Rejects empty names, names containing null bytes and names longer than
/// the target allows.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConvertError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(ConvertError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(ConvertError::Config(format!(
            "Identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// ```ignore
/// assert_eq!(quote_pg("users")?, "\"users\"");
/// assert_eq!(quote_pg("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a GoogleSQL identifier with backticks.
///
/// GoogleSQL escapes embedded backticks with a backslash.
pub fn quote_google(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!(
        "`{}`",
        name.replace('\\', "\\\\").replace('`', "\\`")
    ))
}

/// Quote an identifier for the given target dialect.
pub fn quote_ident(dialect: TargetDialect, name: &str) -> Result<String> {
    match dialect {
        TargetDialect::GoogleSql => quote_google(name),
        TargetDialect::Postgresql => quote_pg(name),
    }
}

/// Quote a list of identifiers and join them with `", "`.
pub fn quote_list<'a>(
    dialect: TargetDialect,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<String> {
    let quoted = names
        .into_iter()
        .map(|n| quote_ident(dialect, n))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// Quote a string literal using SQL single-quote doubling.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
