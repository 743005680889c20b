//! Expression verification against the live target.
//!
//! Every default, generated and check expression is translated to the
//! target dialect and submitted to a [`VerificationChannel`] for a
//! compile-only check:
//!
//! - accepted: the expression becomes `Verified` with the translated text
//! - refused: it becomes `Rejected` with the target's message and an
//!   `expression-rejected` issue
//! - no channel, timeout or transport failure: it stays `Unverified` with a
//!   `verification-skipped` issue
//!
//! Requests run concurrently up to the worker limit. Results are applied by
//! the awaiting task one at a time once requests settle, so no model lock
//! spans a network call.

mod channel;
mod http;
mod postgres;
mod translate;

pub use channel::{VerificationChannel, VerificationRequest, Verdict};
pub use http::HttpPlanChannel;
pub use postgres::PgPlanChannel;
pub use translate::Translator;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{TargetConfig, VerifierConfig};
use crate::core::{
    Conv, ExpressionKind, ExpressionSlot, Issue, IssueCategory, IssueTarget, Stage, TargetType,
};
use crate::error::Result;

/// Outcome counts of one verification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySummary {
    pub verified: usize,
    pub rejected: usize,
    pub skipped: usize,
}

/// Open the channel described by `target.verifier`.
///
/// Returns `Ok(None)` when no verifier is configured.
pub async fn open_channel(
    target: &TargetConfig,
    workers: usize,
) -> Result<Option<Arc<dyn VerificationChannel>>> {
    match &target.verifier {
        None => Ok(None),
        Some(VerifierConfig::Postgres(conn)) => {
            let channel = PgPlanChannel::connect(conn, workers).await?;
            Ok(Some(Arc::new(channel)))
        }
        Some(VerifierConfig::Http { url }) => {
            let channel = HttpPlanChannel::new(url, Duration::from_secs(target.timeout_secs))?;
            Ok(Some(Arc::new(channel)))
        }
    }
}

/// Runs verification over every expression in a model.
pub struct ExpressionVerifier {
    channel: Option<Arc<dyn VerificationChannel>>,
    workers: usize,
    timeout: Duration,
    cancel: CancellationToken,
    unavailable: Option<String>,
}

impl ExpressionVerifier {
    pub fn new(
        channel: Option<Arc<dyn VerificationChannel>>,
        workers: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            channel,
            workers: workers.max(1),
            timeout,
            cancel: CancellationToken::new(),
            unavailable: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reason recorded on skipped expressions when there is no channel.
    pub fn with_unavailable_reason(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    /// Verify every expression in `conv`.
    ///
    /// Previous verdicts are reset first, so a second run re-checks
    /// everything against the current target.
    pub async fn verify(&self, conv: &mut Conv) -> Result<VerifySummary> {
        conv.clear_issues(Stage::Verifier);
        let slots: Vec<ExpressionSlot> = conv.expressions().into_iter().map(|(s, _)| s).collect();
        for slot in &slots {
            if let Some(expr) = conv.expression_mut(*slot) {
                expr.reset();
            }
        }
        conv.audit.verification_runs += 1;

        let mut summary = VerifySummary::default();
        if slots.is_empty() {
            return Ok(summary);
        }

        let Some(channel) = self.channel.clone() else {
            let reason = self
                .unavailable
                .clone()
                .unwrap_or_else(|| "no verification endpoint configured".to_string());
            warn!("Skipping verification of {} expressions: {}", slots.len(), reason);
            for slot in slots {
                let target = slot.issue_target();
                let detail = format!("{}: not verified ({})", conv.describe(target), reason);
                conv.add_issue(Issue::new(
                    IssueCategory::VerificationSkipped,
                    Stage::Verifier,
                    target,
                    detail,
                ));
                summary.skipped += 1;
            }
            return Ok(summary);
        };

        let requests = build_requests(conv, &slots);
        info!(
            "Verifying {} expressions via {} ({} workers)",
            requests.len(),
            channel.name(),
            self.workers
        );

        let order: Vec<ExpressionSlot> = requests.iter().map(|(slot, _)| *slot).collect();
        let timeout = self.timeout;
        let cancel = self.cancel.clone();
        let mut pending = stream::iter(requests.into_iter().enumerate())
            .map(|(position, (_, request))| {
                let channel = channel.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (position, request, None);
                    }
                    let outcome = tokio::time::timeout(timeout, channel.check(&request)).await;
                    (position, request, Some(outcome))
                }
            })
            .buffer_unordered(self.workers);

        let mut outcomes = Vec::with_capacity(order.len());
        let mut aborted = false;
        while let Some(outcome) = pending.next().await {
            outcomes.push(outcome);
            if self.cancel.is_cancelled() {
                aborted = true;
                break;
            }
        }
        drop(pending);

        // Completion order varies; apply in model order. Requests dropped or
        // never started because of cancellation are reported as skipped.
        outcomes.sort_by_key(|(position, ..)| *position);
        let mut outcomes = outcomes.into_iter().peekable();
        let mut cancelled = 0;
        for (position, &slot) in order.iter().enumerate() {
            let target = slot.issue_target();
            let described = conv.describe(target);
            let finished = match outcomes.next_if(|(p, ..)| *p == position) {
                Some((_, request, Some(outcome))) => Some((request, outcome)),
                _ => None,
            };
            let Some((request, outcome)) = finished else {
                conv.add_issue(Issue::new(
                    IssueCategory::VerificationSkipped,
                    Stage::Verifier,
                    target,
                    format!("{}: not verified (cancelled)", described),
                ));
                summary.skipped += 1;
                cancelled += 1;
                continue;
            };
            match outcome {
                Ok(Ok(Verdict::Accepted)) => {
                    if let Some(expr) = conv.expression_mut(slot) {
                        expr.mark_verified(request.text)?;
                        summary.verified += 1;
                    }
                }
                Ok(Ok(Verdict::Rejected { message })) => {
                    if let Some(expr) = conv.expression_mut(slot) {
                        expr.mark_rejected(request.text, message.clone())?;
                        summary.rejected += 1;
                    }
                    conv.add_issue(Issue::new(
                        IssueCategory::ExpressionRejected,
                        Stage::Verifier,
                        target,
                        format!("{} rejected by target: {}", described, message),
                    ));
                }
                Ok(Err(e)) => {
                    conv.add_issue(Issue::new(
                        IssueCategory::VerificationSkipped,
                        Stage::Verifier,
                        target,
                        format!("{}: not verified ({})", described, e),
                    ));
                    summary.skipped += 1;
                }
                Err(_) => {
                    conv.add_issue(Issue::new(
                        IssueCategory::VerificationSkipped,
                        Stage::Verifier,
                        target,
                        format!(
                            "{}: not verified (timed out after {}s)",
                            described,
                            timeout.as_secs()
                        ),
                    ));
                    summary.skipped += 1;
                }
            }
        }

        if aborted {
            warn!("Verification cancelled");
            conv.add_issue(Issue::new(
                IssueCategory::Aborted,
                Stage::Verifier,
                IssueTarget::Schema,
                format!(
                    "Verification cancelled after {} of {} expressions",
                    order.len() - cancelled,
                    order.len()
                ),
            ));
        }

        info!(
            "Verification finished: {} verified, {} rejected, {} skipped",
            summary.verified, summary.rejected, summary.skipped
        );
        Ok(summary)
    }
}

/// Translate each expression and attach the owning table's type context.
fn build_requests(
    conv: &Conv,
    slots: &[ExpressionSlot],
) -> Vec<(ExpressionSlot, VerificationRequest)> {
    let translator = Translator::new(conv.source_dialect, conv.target_dialect);
    let mut requests = Vec::with_capacity(slots.len());

    for &slot in slots {
        let (Some(table), Some(expr)) = (conv.table(slot.table()), conv.expression(slot)) else {
            continue;
        };
        let expected_type = match slot {
            ExpressionSlot::Check { .. } => VerificationRequest::boolean(),
            ExpressionSlot::Default { column, .. } | ExpressionSlot::Generated { column, .. } => {
                match table.column(column).and_then(|c| c.target_type.clone()) {
                    Some(ty) => ty,
                    None => TargetType::string(None),
                }
            }
        };
        let columns = table
            .columns
            .iter()
            .filter_map(|c| c.target_type.clone().map(|t| (c.name.clone(), t)))
            .collect();
        let kind: ExpressionKind = slot.kind();

        requests.push((
            slot,
            VerificationRequest {
                dialect: conv.target_dialect,
                text: translator.translate(&expr.source, table),
                kind,
                expected_type,
                table: table.name.clone(),
                columns,
            },
        ));
    }
    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        CheckConstraint, Column, Expression, KeyPart, SourceDialect, SourceType, Table,
        TargetDialect, VerificationStatus,
    };
    use crate::error::ConvertError;
    use crate::mapper::Mapper;
    use async_trait::async_trait;

    /// Rejects any expression containing `~`; fails transport on `@@`.
    struct FakeChannel;

    #[async_trait]
    impl VerificationChannel for FakeChannel {
        fn name(&self) -> &str {
            "fake"
        }

        async fn check(&self, request: &VerificationRequest) -> Result<Verdict> {
            if request.text.contains("@@") {
                return Err(ConvertError::TargetUnavailable("connection reset".into()));
            }
            if request.text.contains('~') {
                return Ok(Verdict::Rejected {
                    message: "Syntax error: Illegal input character \"~\"".into(),
                });
            }
            Ok(Verdict::Accepted)
        }
    }

    fn model(checks: &[&str]) -> Conv {
        let mut conv = Conv::new(SourceDialect::Postgres, TargetDialect::GoogleSql);
        let table_id = conv.alloc_table_id();
        let mut table = Table::new(table_id, "products");
        let id = conv.alloc_column_id();
        table.columns.push(Column::new(id, "id", SourceType::parse("integer")));
        let price = conv.alloc_column_id();
        table
            .columns
            .push(Column::new(price, "price", SourceType::parse("numeric(10,2)")));
        table.primary_key = vec![KeyPart::asc(id)];
        for text in checks {
            let check_id = conv.alloc_check_id();
            table.checks.push(CheckConstraint {
                id: check_id,
                name: format!("ck{}", check_id.0),
                expr: Expression::new(*text),
            });
        }
        conv.tables.insert(table_id, table);
        Mapper::new(conv.source_dialect, "synth_id").map(&mut conv);
        conv
    }

    fn statuses(conv: &Conv) -> Vec<VerificationStatus> {
        conv.expressions().iter().map(|(_, e)| e.status).collect()
    }

    fn verifier() -> ExpressionVerifier {
        ExpressionVerifier::new(Some(Arc::new(FakeChannel)), 2, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_accepted_and_rejected() {
        let mut conv = model(&["price > 0", "price ~ '^[0-9]'"]);
        let summary = verifier().verify(&mut conv).await.unwrap();
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.rejected, 1);

        let exprs = conv.expressions();
        assert_eq!(exprs[0].1.status, VerificationStatus::Verified);
        assert_eq!(exprs[0].1.translated.as_deref(), Some("`price` > 0"));
        assert_eq!(exprs[1].1.status, VerificationStatus::Rejected);
        assert!(exprs[1].1.rejection.as_deref().unwrap().contains("Illegal input"));
        assert_eq!(conv.issue_counts()[&IssueCategory::ExpressionRejected], 1);
        assert_eq!(conv.audit.verification_runs, 1);
    }

    #[tokio::test]
    async fn test_rerun_resets_and_is_idempotent() {
        let mut conv = model(&["price > 0", "price ~ 'x'"]);
        let v = verifier();
        v.verify(&mut conv).await.unwrap();
        let first_issues = conv.issues.clone();
        v.verify(&mut conv).await.unwrap();
        assert_eq!(conv.issues, first_issues);
        assert_eq!(conv.audit.verification_runs, 2);
    }

    #[tokio::test]
    async fn test_no_channel_skips_everything() {
        let mut conv = model(&["price > 0", "price < 100"]);
        let summary = ExpressionVerifier::new(None, 4, Duration::from_secs(1))
            .with_unavailable_reason("connection refused")
            .verify(&mut conv)
            .await
            .unwrap();
        assert_eq!(summary.skipped, 2);
        assert!(statuses(&conv)
            .iter()
            .all(|s| *s == VerificationStatus::Unverified));
        let skipped: Vec<_> = conv
            .issues
            .iter()
            .filter(|i| i.category == IssueCategory::VerificationSkipped)
            .collect();
        assert_eq!(skipped.len(), 2);
        assert!(skipped[0].detail.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_unverified() {
        let mut conv = model(&["price > 0", "price @@ 'x'"]);
        let summary = verifier().verify(&mut conv).await.unwrap();
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(statuses(&conv)[1], VerificationStatus::Unverified);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut conv = model(&["price > 0", "price < 10"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = verifier().with_cancel(cancel).verify(&mut conv).await.unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(conv.issue_counts()[&IssueCategory::Aborted], 1);
        assert_eq!(conv.issue_counts()[&IssueCategory::VerificationSkipped], 2);
        assert!(conv
            .issues
            .iter()
            .filter(|i| i.category == IssueCategory::VerificationSkipped)
            .all(|i| i.detail.contains("not verified (cancelled)")));
        assert!(conv.is_partial());
    }
}
