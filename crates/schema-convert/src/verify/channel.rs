//! Request/response protocol with the target's planning endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::identifier::quote_ident;
use crate::core::{ExpressionKind, TargetDialect, TargetKind, TargetType};
use crate::error::Result;

/// A translated expression to be checked by the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub dialect: TargetDialect,

    /// Translated expression text.
    pub text: String,

    pub kind: ExpressionKind,

    /// Type the expression must produce: the column type for defaults and
    /// generated columns, `BOOL` for checks.
    pub expected_type: TargetType,

    /// Owning table name.
    pub table: String,

    /// Columns the expression may reference, with their target types.
    pub columns: Vec<(String, TargetType)>,
}

impl VerificationRequest {
    /// Planning-only check query.
    ///
    /// The owning table is stood in for by a derived table of typed NULLs,
    /// so the check never reads or writes a real table:
    ///
    /// ```text
    /// SELECT CAST((`price` > 0) AS BOOL)
    /// FROM (SELECT CAST(NULL AS NUMERIC) AS `price`) AS `orders` WHERE FALSE
    /// ```
    pub fn check_query(&self) -> Result<String> {
        let q = |name: &str| quote_ident(self.dialect, name);
        let columns = if self.columns.is_empty() {
            format!("SELECT 1 AS {}", q("_check")?)
        } else {
            let list = self
                .columns
                .iter()
                .map(|(name, ty)| {
                    Ok(format!(
                        "CAST(NULL AS {}) AS {}",
                        ty.render(self.dialect),
                        q(name)?
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            format!("SELECT {}", list.join(", "))
        };
        let never = match self.dialect {
            TargetDialect::GoogleSql => "FALSE",
            TargetDialect::Postgresql => "false",
        };
        Ok(format!(
            "SELECT CAST(({}) AS {}) FROM ({}) AS {} WHERE {}",
            self.text,
            self.expected_type.render(self.dialect),
            columns,
            q(&self.table)?,
            never
        ))
    }

    /// Expected type for a check constraint.
    pub fn boolean() -> TargetType {
        TargetType::scalar(TargetKind::Bool)
    }
}

/// Target's answer to a verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// The target refused the expression; `message` is its error text.
    Rejected { message: String },
}

/// A connection to something that can compile or plan target SQL.
///
/// `check` must never have a persistent side effect on the target.
/// Transport failures are returned as errors; a refusal is a [`Verdict`].
#[async_trait]
pub trait VerificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, request: &VerificationRequest) -> Result<Verdict>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(dialect: TargetDialect) -> VerificationRequest {
        VerificationRequest {
            dialect,
            text: "price > 0".to_string(),
            kind: ExpressionKind::Check,
            expected_type: VerificationRequest::boolean(),
            table: "orders".to_string(),
            columns: vec![
                ("id".to_string(), TargetType::scalar(TargetKind::Int64)),
                ("price".to_string(), TargetType::scalar(TargetKind::Numeric)),
            ],
        }
    }

    #[test]
    fn test_check_query_google() {
        assert_eq!(
            request(TargetDialect::GoogleSql).check_query().unwrap(),
            "SELECT CAST((price > 0) AS BOOL) FROM (SELECT CAST(NULL AS INT64) AS `id`, \
             CAST(NULL AS NUMERIC) AS `price`) AS `orders` WHERE FALSE"
        );
    }

    #[test]
    fn test_check_query_postgres() {
        assert_eq!(
            request(TargetDialect::Postgresql).check_query().unwrap(),
            "SELECT CAST((price > 0) AS boolean) FROM (SELECT CAST(NULL AS bigint) AS \"id\", \
             CAST(NULL AS numeric) AS \"price\") AS \"orders\" WHERE false"
        );
    }

    #[test]
    fn test_check_query_without_columns() {
        let mut req = request(TargetDialect::GoogleSql);
        req.columns.clear();
        req.text = "GENERATE_UUID()".to_string();
        req.expected_type = TargetType::string(Some(36));
        assert!(req
            .check_query()
            .unwrap()
            .starts_with("SELECT CAST((GENERATE_UUID()) AS STRING(36)) FROM (SELECT 1 AS `_check`)"));
    }
}
