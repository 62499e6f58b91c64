//! Configuration loading and validation for the pinger
//!
//! This module parses a TOML configuration into a `schema::PingerConfig`,
//! applies defaults (via serde defaults on the schema type), and performs
//! strict validation with field-path error messages.
//!
//! ```toml
//! intervalSecs = 20
//! timeoutSecs = 10
//!
//! [[destinations]]
//! tenantId = "hawkular"
//! environmentId = "test"
//! resourceId = "hawkular-site"
//! url = "http://hawkular.github.io"
//! httpMethod = "HEAD"
//! ```

use crate::ping::HttpMethod;
use crate::{CoreError, Result};
use reqwest::Url;
use schema::{PingDestination, PingerConfig};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Validate the configuration, reporting the first offending field
pub fn validate_config(config: &PingerConfig) -> Result<()> {
    if config.interval_secs == 0 {
        return Err(CoreError::ValidationError(
            "intervalSecs: must be > 0".to_string(),
        ));
    }
    if config.timeout_secs == 0 {
        return Err(CoreError::ValidationError(
            "timeoutSecs: must be > 0".to_string(),
        ));
    }
    if config.max_concurrent_pings == 0 {
        return Err(CoreError::ValidationError(
            "maxConcurrentPings: must be > 0".to_string(),
        ));
    }
    if config.cycle_deadline_secs < config.timeout_secs {
        return Err(CoreError::ValidationError(format!(
            "cycleDeadlineSecs: must be >= timeoutSecs ({})",
            config.timeout_secs
        )));
    }
    if config.publish_timeout_secs == 0 {
        return Err(CoreError::ValidationError(
            "publishTimeoutSecs: must be > 0".to_string(),
        ));
    }
    if config.user_agent.trim().is_empty() {
        return Err(CoreError::ValidationError(
            "userAgent: cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for (i, destination) in config.destinations.iter().enumerate() {
        validate_destination(i, destination)?;
        if !seen.insert(destination) {
            return Err(CoreError::ValidationError(format!(
                "destinations[{}]: duplicate destination '{}'",
                i, destination
            )));
        }
    }

    debug!("Configuration validated successfully");
    Ok(())
}

fn validate_destination(index: usize, destination: &PingDestination) -> Result<()> {
    if destination.tenant_id.trim().is_empty() {
        return Err(CoreError::ValidationError(format!(
            "destinations[{}].tenantId: cannot be empty",
            index
        )));
    }
    if destination.resource_id.trim().is_empty() {
        return Err(CoreError::ValidationError(format!(
            "destinations[{}].resourceId: cannot be empty",
            index
        )));
    }

    let url = Url::parse(destination.url.trim()).map_err(|e| {
        CoreError::ValidationError(format!(
            "destinations[{}].url: invalid URL '{}': {}",
            index, destination.url, e
        ))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CoreError::ValidationError(format!(
            "destinations[{}].url: scheme must be http or https, found '{}'",
            index,
            url.scheme()
        )));
    }

    HttpMethod::parse(&destination.http_method).map_err(|_| {
        CoreError::ValidationError(format!(
            "destinations[{}].httpMethod: must be GET, HEAD or POST, found '{}'",
            index, destination.http_method
        ))
    })?;

    Ok(())
}

/// Load the configuration from a TOML file path
pub fn load_config_from_toml_path(path: impl AsRef<Path>) -> Result<PingerConfig> {
    let data = fs::read_to_string(&path).map_err(|e| {
        CoreError::ConfigurationError(format!("Failed to read config {:?}: {}", path.as_ref(), e))
    })?;
    load_config_from_toml_str(&data)
}

/// Load the configuration from a TOML string
pub fn load_config_from_toml_str(input: &str) -> Result<PingerConfig> {
    let config: PingerConfig = toml::from_str(input)
        .map_err(|e| CoreError::ConfigurationError(format!("TOML parse error: {}", e)))?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn valid_config() -> String {
        r#"
        intervalSecs = 30
        timeoutSecs = 5
        maxConcurrentPings = 4

        [[destinations]]
        tenantId = "hawkular"
        environmentId = "test"
        resourceId = "site"
        url = "http://hawkular.github.io"

        [[destinations]]
        tenantId = "hawkular"
        environmentId = "test"
        resourceId = "site-head"
        url = "https://hawkular.github.io"
        httpMethod = "head"
        "#
        .to_string()
    }

    #[test]
    fn parses_and_validates_valid_config() {
        let cfg = load_config_from_toml_str(&valid_config()).expect("should parse");
        assert_eq!(cfg.interval(), Duration::from_secs(30));
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.max_concurrent_pings, 4);
        // Unset fields keep their defaults
        assert_eq!(cfg.cycle_deadline_secs, 15);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.destinations.len(), 2);
        assert_eq!(cfg.destinations[0].http_method, "GET");
        assert_eq!(cfg.destinations[1].http_method, "head");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = load_config_from_toml_str("").expect("defaults are valid");
        assert_eq!(cfg, PingerConfig::default());
    }

    #[test]
    fn errors_on_zero_interval() {
        let err = load_config_from_toml_str("intervalSecs = 0").unwrap_err();
        assert_eq!(err.code(), "CORE002");
        assert!(err.to_string().contains("intervalSecs: must be > 0"));
    }

    #[test]
    fn errors_on_deadline_shorter_than_timeout() {
        let err = load_config_from_toml_str("timeoutSecs = 10\ncycleDeadlineSecs = 5").unwrap_err();
        assert!(err.to_string().contains("cycleDeadlineSecs"));
    }

    #[test]
    fn errors_on_zero_publish_timeout() {
        let err = load_config_from_toml_str("publishTimeoutSecs = 0").unwrap_err();
        assert_eq!(err.code(), "CORE002");
        assert!(err.to_string().contains("publishTimeoutSecs: must be > 0"));
    }

    #[test]
    fn errors_on_zero_concurrency() {
        let err = load_config_from_toml_str("maxConcurrentPings = 0").unwrap_err();
        assert!(err.to_string().contains("maxConcurrentPings"));
    }

    #[test]
    fn errors_on_bad_destination_fields() {
        let cases = [
            (r#"tenantId = """#, "destinations[0].tenantId"),
            (r#"resourceId = " ""#, "destinations[0].resourceId"),
            (r#"url = "not a url""#, "destinations[0].url: invalid URL"),
            (r#"url = "ftp://example.com""#, "scheme must be http or https"),
            (r#"httpMethod = "DELETE""#, "destinations[0].httpMethod"),
        ];
        for (field, expected) in cases {
            let mut table = toml::Table::new();
            for (key, value) in [
                ("tenantId", "t"),
                ("environmentId", "e"),
                ("resourceId", "r"),
                ("url", "http://example.com"),
            ] {
                table.insert(key.to_string(), toml::Value::String(value.to_string()));
            }
            let overrides: toml::Table = toml::from_str(field).unwrap();
            for (key, value) in overrides {
                table.insert(key, value);
            }

            let mut root = toml::Table::new();
            root.insert(
                "destinations".to_string(),
                toml::Value::Array(vec![toml::Value::Table(table)]),
            );
            let input = toml::to_string(&toml::Value::Table(root)).unwrap();

            let err = load_config_from_toml_str(&input).unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "expected '{}' in '{}'",
                expected,
                err
            );
        }
    }

    #[test]
    fn errors_on_duplicate_destination() {
        let input = r#"
        [[destinations]]
        tenantId = "t"
        environmentId = "e"
        resourceId = "r"
        url = "http://example.com"

        [[destinations]]
        tenantId = "t"
        environmentId = "e"
        resourceId = "r"
        url = "http://example.com"
        "#;
        let err = load_config_from_toml_str(input).unwrap_err();
        assert!(err.to_string().contains("destinations[1]: duplicate destination"));
    }

    #[test]
    fn errors_on_malformed_toml() {
        let err = load_config_from_toml_str("intervalSecs = [").unwrap_err();
        assert_eq!(err.code(), "CORE001");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(valid_config().as_bytes()).unwrap();

        let cfg = load_config_from_toml_path(file.path()).unwrap();
        assert_eq!(cfg.destinations.len(), 2);
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from_toml_path(dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(err.code(), "CORE001");
        assert!(err.to_string().contains("Failed to read config"));
    }
}
