//! Configuration type definitions with auto-tuning based on system resources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use sysinfo::System;
use tracing::info;

use crate::core::{SourceDialect, TargetDialect};

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            total_memory_gb: sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0),
            cpu_cores: sys.cpus().len().max(1),
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the source schema comes from.
    pub source: SourceConfig,

    /// Target dialect and verification endpoint.
    #[serde(default)]
    pub target: TargetConfig,

    /// Conversion behavior.
    #[serde(default)]
    pub conversion: ConversionConfig,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.conversion = self.conversion.with_auto_tuning(&resources);
        self
    }
}

/// Source schema configuration: a dump file or a live connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source dialect.
    pub dialect: SourceDialect,

    /// Path to a schema dump (SQL) or table export (JSON for DynamoDB).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump: Option<PathBuf>,

    /// Live database connection (PostgreSQL only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,
}

/// PostgreSQL wire-protocol connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never serialized.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Schemas to read (default: `public`). Ignored for verifiers.
    #[serde(default = "default_schemas")]
    pub schemas: Vec<String>,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schemas", &self.schemas)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target SQL dialect (default: google_sql).
    #[serde(default = "default_target_dialect")]
    pub dialect: TargetDialect,

    /// Endpoint used to verify expressions. Absent means verification is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<VerifierConfig>,

    /// Per-request verification timeout in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            dialect: default_target_dialect(),
            verifier: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Expression verification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifierConfig {
    /// A PostgreSQL-protocol endpoint; expressions are prepared, never executed.
    Postgres(ConnectionConfig),
    /// A verification-only HTTP endpoint accepting JSON requests.
    Http { url: String },
}

/// How flattened namespaces resolve duplicate table names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCollisionPolicy {
    /// Rename the later table to `<namespace>_<name>` and record an issue.
    #[default]
    Rename,
    /// Fail the conversion.
    Error,
    /// Keep the first table, drop the later one and record an issue.
    Skip,
}

/// Conversion behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Table name collision policy (default: rename).
    #[serde(default)]
    pub name_collision: NameCollisionPolicy,

    /// Name of the surrogate key added to tables without a primary key.
    #[serde(default = "default_synthetic_key_column")]
    pub synthetic_key_column: String,

    /// Concurrent verification requests. Auto-tuned based on CPU cores if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_workers: Option<usize>,

    /// Write a session file even when the run was cancelled (default: false).
    #[serde(default)]
    pub allow_partial_save: bool,

    /// Prefix for output files (default: derived from the source).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_prefix: Option<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            name_collision: NameCollisionPolicy::default(),
            synthetic_key_column: default_synthetic_key_column(),
            verify_workers: None,
            allow_partial_save: false,
            output_prefix: None,
        }
    }
}

impl ConversionConfig {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        // Verification calls are network-bound: two per core, 2-16 range
        if self.verify_workers.is_none() {
            let workers = (resources.cpu_cores * 2).clamp(2, 16);
            self.verify_workers = Some(workers);
        }

        info!("Auto-tuned config: verify_workers={}", self.get_verify_workers());
        self
    }

    pub fn get_verify_workers(&self) -> usize {
        self.verify_workers.unwrap_or(4)
    }
}

// Default value functions for serde
fn default_pg_port() -> u16 {
    5432
}

fn default_schemas() -> Vec<String> {
    vec!["public".to_string()]
}

fn default_require() -> String {
    "require".to_string()
}

fn default_target_dialect() -> TargetDialect {
    TargetDialect::GoogleSql
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_synthetic_key_column() -> String {
    "synth_id".to_string()
}
