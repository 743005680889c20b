//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// SHA-256 fingerprint of the configuration, recorded in the audit.
    /// Passwords are not part of the fingerprint.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Output file prefix: configured, else the dump file stem, else the database name.
    pub fn output_prefix(&self) -> String {
        if let Some(prefix) = &self.conversion.output_prefix {
            return prefix.clone();
        }
        if let Some(stem) = self
            .source
            .dump
            .as_ref()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
        {
            return stem.to_string();
        }
        match &self.source.connection {
            Some(conn) => conn.database.clone(),
            None => "schema".to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Build a tokio-postgres config.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .password(&self.password)
            .application_name("schema-convert");
        pg_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SourceDialect, TargetDialect};

    const DUMP_YAML: &str = r#"
source:
  dialect: mysql
  dump: /tmp/shop.sql
target:
  dialect: postgresql
  verifier:
    kind: http
    url: http://localhost:9010/verify
conversion:
  name_collision: skip
"#;

    #[test]
    fn test_from_yaml_dump_source() {
        let config = Config::from_yaml(DUMP_YAML).unwrap();
        assert_eq!(config.source.dialect, SourceDialect::Mysql);
        assert_eq!(config.target.dialect, TargetDialect::Postgresql);
        assert_eq!(config.target.timeout_secs, 10);
        assert_eq!(config.conversion.name_collision, NameCollisionPolicy::Skip);
        assert_eq!(config.conversion.synthetic_key_column, "synth_id");
        assert!(matches!(
            config.target.verifier,
            Some(VerifierConfig::Http { .. })
        ));
        assert_eq!(config.output_prefix(), "shop");
    }

    #[test]
    fn test_from_yaml_live_source_and_pg_verifier() {
        let yaml = r#"
source:
  dialect: postgres
  connection:
    host: db.internal
    database: app
    user: reader
    password: secret
    ssl_mode: disable
target:
  dialect: postgresql
  verifier:
    kind: postgres
    host: target.internal
    database: checks
    user: checker
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let conn = config.source.connection.as_ref().unwrap();
        assert_eq!(conn.port, 5432);
        assert_eq!(conn.schemas, vec!["public"]);
        assert_eq!(config.target.dialect, TargetDialect::Postgresql);
        match config.target.verifier {
            Some(VerifierConfig::Postgres(ref c)) => assert_eq!(c.host, "target.internal"),
            ref other => panic!("unexpected verifier {:?}", other),
        }
        assert_eq!(config.output_prefix(), "app");
    }

    #[test]
    fn test_hash_is_stable_and_excludes_password() {
        let a = Config::from_yaml(DUMP_YAML).unwrap();
        let b = Config::from_yaml(DUMP_YAML).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);

        let mut c = a.clone();
        c.conversion.allow_partial_save = true;
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_auto_tuning_fills_workers_only_when_unset() {
        let resources = SystemResources {
            total_memory_gb: 16.0,
            cpu_cores: 4,
        };
        let tuned = ConversionConfig::default().with_auto_tuning(&resources);
        assert_eq!(tuned.verify_workers, Some(8));

        let explicit = ConversionConfig {
            verify_workers: Some(3),
            ..Default::default()
        };
        assert_eq!(explicit.with_auto_tuning(&resources).verify_workers, Some(3));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, crate::error::ConvertError::Io(_)));
    }
}
