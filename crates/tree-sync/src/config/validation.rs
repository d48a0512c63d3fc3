//! Configuration validation.

use super::Config;
use crate::core::identifier::{validate_identifier, TableAllowList};
use crate::core::ColumnRole;
use crate::drivers::SslMode;
use crate::error::{Result, SyncError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Target validation
    if config.target.host.is_empty() {
        return Err(SyncError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(SyncError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(SyncError::Config("target.user is required".into()));
    }
    if config.target.port == 0 {
        return Err(SyncError::Config("target.port must be non-zero".into()));
    }
    validate_identifier(&config.target.schema).map_err(in_field("target.schema"))?;
    SslMode::parse(&config.target.ssl_mode)?;

    // Tables must be distinct and allow-listed
    let sync = &config.sync;
    let allow = TableAllowList::new(&sync.allowed_tables)?;
    for (field, table) in [
        ("sync.original_table", &sync.original_table),
        ("sync.staging_table", &sync.staging_table),
    ] {
        allow
            .resolve(&config.target.schema, table)
            .map_err(in_field(field))?;
    }
    if sync.original_table == sync.staging_table {
        return Err(SyncError::Config(
            "sync.original_table and sync.staging_table must differ".into(),
        ));
    }

    if let Some(0) = sync.workers {
        return Err(SyncError::Config("sync.workers must be at least 1".into()));
    }

    let p = &sync.partitioning;
    if p.enabled {
        if p.bucket_width <= 0 {
            return Err(SyncError::Config(
                "sync.partitioning.bucket_width must be positive".into(),
            ));
        }
        if p.end_year < p.start_year {
            return Err(SyncError::Config(
                "sync.partitioning.end_year must not be before start_year".into(),
            ));
        }
    }

    if sync.protected_prefix.is_empty() {
        return Err(SyncError::Config(
            "sync.protected_prefix must not be empty".into(),
        ));
    }

    sync.columns.validate()?;

    if let Some(rule) = &sync.prune {
        match sync.columns.column(&rule.column) {
            Some(c) if c.role == ColumnRole::Synced => {}
            _ => {
                return Err(SyncError::Config(format!(
                    "sync.prune.column: '{}' is not a synced column",
                    rule.column
                )))
            }
        }
    }

    Ok(())
}

/// Prefix a configuration error with the field it came from.
fn in_field(field: &'static str) -> impl Fn(SyncError) -> SyncError {
    move |e| match e {
        SyncError::Config(msg) => SyncError::Config(format!("{}: {}", field, msg)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PruneRule, SyncConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "giessdenkiez".to_string(),
                user: "postgres".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                ssl_mode: "disable".to_string(),
            },
            sync: SyncConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_target_host() {
        let mut config = valid_config();
        config.target.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.target.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_table_not_in_allow_list() {
        let mut config = valid_config();
        config.sync.staging_table = "pg_authid".to_string();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("sync.staging_table"), "{}", err);
    }

    #[test]
    fn test_malicious_table_name() {
        let mut config = valid_config();
        config.sync.original_table = "trees; DROP TABLE trees".to_string();
        config.sync.allowed_tables.push(config.sync.original_table.clone());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_table_twice() {
        let mut config = valid_config();
        config.sync.staging_table = "trees".to_string();
        assert!(validate(&config).unwrap_err().to_string().contains("must differ"));
    }

    #[test]
    fn test_zero_workers() {
        let mut config = valid_config();
        config.sync.workers = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_partitioning_only_checked_when_enabled() {
        let mut config = valid_config();
        config.sync.partitioning.bucket_width = 0;
        assert!(validate(&config).is_err());
        config.sync.partitioning.enabled = false;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_prune_column_must_be_synced() {
        let mut config = valid_config();
        config.sync.prune = Some(PruneRule {
            column: "watered".into(),
            value: "yes".into(),
        });
        assert!(validate(&config).is_err());
        config.sync.prune = None;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_456"));
    }

    #[test]
    fn test_target_config_password_not_serialized() {
        let mut config = valid_config();
        config.target.password = "super_secret".to_string();
        let json = serde_json::to_string(&config.target).unwrap();
        assert!(!json.contains("super_secret"), "Password was serialized: {}", json);
    }
}
