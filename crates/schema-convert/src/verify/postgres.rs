//! Verification against a PostgreSQL-protocol endpoint.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tracing::debug;

use super::channel::{VerificationChannel, VerificationRequest, Verdict};
use crate::config::ConnectionConfig;
use crate::error::{ConvertError, Result};

/// Checks expressions by preparing the check query.
///
/// A prepared statement is parsed and analysed by the server but never
/// executed, so the target is left untouched. The statement is closed when
/// the handle drops.
pub struct PgPlanChannel {
    pool: Pool,
}

impl PgPlanChannel {
    pub async fn connect(conn: &ConnectionConfig, max_size: usize) -> Result<Self> {
        let pool = crate::pg::connect(conn, max_size, "verifier").await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationChannel for PgPlanChannel {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn check(&self, request: &VerificationRequest) -> Result<Verdict> {
        let sql = request.check_query()?;
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| ConvertError::TargetUnavailable(e.to_string()))?;

        debug!("Preparing check query: {}", sql);
        match client.prepare(&sql).await {
            Ok(_) => Ok(Verdict::Accepted),
            Err(e) => match e.as_db_error() {
                Some(db) => Ok(Verdict::Rejected {
                    message: format!("{}: {}", db.code().code(), db.message()),
                }),
                None => Err(ConvertError::TargetUnavailable(e.to_string())),
            },
        }
    }
}
