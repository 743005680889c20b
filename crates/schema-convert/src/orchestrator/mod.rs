//! Conversion orchestration: Reader -> Mapper -> Verifier, then persistence.
//!
//! Stages run strictly in sequence; each needs the complete output of the
//! previous one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::Conv;
use crate::ddl::DdlEmitter;
use crate::error::{ConvertError, Result};
use crate::mapper::Mapper;
use crate::report::Report;
use crate::source::{open_reader, SchemaBuilder, SchemaReader};
use crate::state::SessionStore;
use crate::verify::{open_channel, ExpressionVerifier, VerificationChannel, VerifySummary};

/// Files written by [`Converter::persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub session: PathBuf,
    pub ddl: PathBuf,
    pub report: PathBuf,
}

impl OutputPaths {
    /// `<prefix>.session.json`, `<prefix>.ddl.sql`, `<prefix>.report.json`.
    pub fn from_prefix(prefix: &str) -> Self {
        Self {
            session: PathBuf::from(format!("{}.session.json", prefix)),
            ddl: PathBuf::from(format!("{}.ddl.sql", prefix)),
            report: PathBuf::from(format!("{}.report.json", prefix)),
        }
    }
}

/// Runs conversions for one configuration.
pub struct Converter {
    config: Config,
    cancel: CancellationToken,
    channel: Option<Arc<dyn VerificationChannel>>,
}

impl Converter {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            channel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Use `channel` instead of opening `target.verifier`.
    pub fn with_verification_channel(mut self, channel: Arc<dyn VerificationChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read the configured source, map it and verify its expressions.
    pub async fn convert_from_source(&self) -> Result<Conv> {
        let mut reader = open_reader(&self.config.source)?;
        self.convert_with_reader(reader.as_mut()).await
    }

    /// Like [`convert_from_source`](Self::convert_from_source) with a
    /// caller-supplied reader.
    pub async fn convert_with_reader(&self, reader: &mut dyn SchemaReader) -> Result<Conv> {
        info!("Phase 1: Reading {} schema", reader.dialect());
        let mut builder = SchemaBuilder::new(
            reader.dialect(),
            self.config.target.dialect,
            self.config.conversion.name_collision,
            self.cancel.clone(),
        );
        builder.audit_mut().config_fingerprint = Some(self.config.hash());
        reader.read(&mut builder).await?;
        let mut conv = builder.finish();
        info!("Read {} tables", conv.tables.len());

        info!("Phase 2: Mapping types and constraints");
        Mapper::new(conv.source_dialect, &self.config.conversion.synthetic_key_column)
            .map(&mut conv);

        if conv.is_partial() {
            warn!("Model is partial; skipping verification");
            return Ok(conv);
        }

        info!("Phase 3: Verifying expressions");
        self.verify(&mut conv).await?;
        Ok(conv)
    }

    /// Resume from a session file: load it and re-verify its expressions.
    pub async fn convert_from_session(&self, path: impl AsRef<Path>) -> Result<Conv> {
        let path = path.as_ref();
        let session = SessionStore::load(path)?;
        if session.header.partial || session.conv.is_partial() {
            return Err(ConvertError::PartialSession(format!(
                "{} holds a partial model and cannot be resumed",
                path.display()
            )));
        }

        let mut conv = session.conv;
        conv.audit.restart(path.display().to_string());
        conv.audit.config_fingerprint = Some(self.config.hash());
        if conv.target_dialect != self.config.target.dialect {
            warn!(
                "Session was mapped for {}; keeping it (config says {})",
                conv.target_dialect.as_str(),
                self.config.target.dialect.as_str()
            );
        }

        info!("Verifying expressions of resumed session");
        self.verify(&mut conv).await?;
        Ok(conv)
    }

    /// Run the verifier. An unreachable target degrades to skipped checks.
    pub async fn verify(&self, conv: &mut Conv) -> Result<VerifySummary> {
        let workers = self.config.conversion.get_verify_workers();
        let timeout = Duration::from_secs(self.config.target.timeout_secs);

        let mut unavailable = None;
        let channel = match &self.channel {
            Some(channel) => Some(channel.clone()),
            None => match open_channel(&self.config.target, workers).await {
                Ok(channel) => channel,
                Err(e) => {
                    warn!("Verification target unavailable: {}", e);
                    unavailable = Some(e.to_string());
                    None
                }
            },
        };

        let mut verifier =
            ExpressionVerifier::new(channel, workers, timeout).with_cancel(self.cancel.clone());
        if let Some(reason) = unavailable {
            verifier = verifier.with_unavailable_reason(reason);
        }
        verifier.verify(conv).await
    }

    /// Finalize the audit and write the session, DDL and report files.
    ///
    /// A partial model's session is written only when
    /// `conversion.allow_partial_save` is set.
    pub fn persist(&self, conv: &mut Conv, outputs: &OutputPaths) -> Result<Report> {
        conv.audit.finish(conv.issue_counts());

        if !conv.is_partial() {
            SessionStore::save(conv, &outputs.session)?;
        } else if self.config.conversion.allow_partial_save {
            SessionStore::save_partial(conv, &outputs.session)?;
        } else {
            warn!(
                "Not saving partial model to {} (allow_partial_save is off)",
                outputs.session.display()
            );
        }

        let ddl = DdlEmitter::new(conv).emit(conv)?;
        std::fs::write(&outputs.ddl, ddl)?;
        info!("Wrote DDL to {}", outputs.ddl.display());

        let report = Report::assemble(conv);
        std::fs::write(&outputs.report, report.to_json()?)?;
        info!("Wrote report to {}", outputs.report.display());
        Ok(report)
    }
}
