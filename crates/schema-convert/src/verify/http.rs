//! Verification against an HTTP planning endpoint.
//!
//! The endpoint receives the check query as JSON and answers
//! `{"accepted": bool, "message": "..."}`. It must only compile the query.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::channel::{VerificationChannel, VerificationRequest, Verdict};
use crate::core::{ExpressionKind, TargetDialect};
use crate::error::{ConvertError, Result};

pub struct HttpPlanChannel {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct PlanRequest<'a> {
    dialect: TargetDialect,
    kind: ExpressionKind,
    expression: &'a str,
    sql: String,
}

#[derive(Deserialize)]
struct PlanResponse {
    accepted: bool,
    #[serde(default)]
    message: Option<String>,
}

impl HttpPlanChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConvertError::Config(format!("HTTP verifier client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl VerificationChannel for HttpPlanChannel {
    fn name(&self) -> &str {
        "http"
    }

    async fn check(&self, request: &VerificationRequest) -> Result<Verdict> {
        let body = PlanRequest {
            dialect: request.dialect,
            kind: request.kind,
            expression: &request.text,
            sql: request.check_query()?,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ConvertError::TargetUnavailable(format!("{}: {}", self.url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ConvertError::TargetUnavailable(format!(
                "{} returned {}: {}",
                self.url, status, text
            )));
        }

        let answer: PlanResponse = response
            .json()
            .await
            .map_err(|e| ConvertError::TargetUnavailable(format!("invalid response: {}", e)))?;
        if answer.accepted {
            Ok(Verdict::Accepted)
        } else {
            Ok(Verdict::Rejected {
                message: answer
                    .message
                    .unwrap_or_else(|| "rejected without detail".to_string()),
            })
        }
    }
}
