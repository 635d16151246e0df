//! Configuration loader
//!
//! Loads a [`CircuitConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes a few well-known paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Every successfully parsed config is validated before it is returned.
//!
//! ## Environment Variables
//! - `CIRCUIT_MAX_FAIL`: failures tolerated per window (required)
//! - `CIRCUIT_RESET_TIMEOUT_SECS`: base open wait in seconds (required)
//! - `CIRCUIT_TIME_UNIT_SECS`: sliding window width in seconds (required)
//! - `CIRCUIT_BACKOFF_CAP_SECS`: backoff ceiling in seconds (optional)
//! - `CIRCUIT_USE_JITTER`: randomise the open wait (default `true`)
//! - `CIRCUIT_LOG_LEVEL`: default filter directive (default `info`)
//! - `CIRCUIT_LOG_JSON`: JSON log lines (default `false`)
//!
//! ## File Locations
//! When no path is given the loader probes, in order, `./circuit.toml`,
//! `./circuit.json`, `./config.toml` and `./config.json`, then the same names
//! next to the running executable.

use std::path::{Path, PathBuf};

use circuit_common::utils::parse_secs;

use super::schema::{BreakerConfig, CircuitConfig, LoggingConfig};
use crate::error::{ConfigError, ConfigResult};

const CONFIG_FILE_NAMES: [&str; 4] = ["circuit.toml", "circuit.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns a [`ConfigError`] if neither the environment nor any config file
/// yields a valid configuration.
pub fn load() -> ConfigResult<CircuitConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns [`ConfigError::MissingEnv`] when a required variable is absent and
/// [`ConfigError::Invalid`] when a value does not parse or fails validation.
pub fn load_from_env() -> ConfigResult<CircuitConfig> {
    let max_fail = env_var("CIRCUIT_MAX_FAIL")?.trim().parse::<u32>().map_err(|e| {
        ConfigError::invalid(format!("Invalid CIRCUIT_MAX_FAIL: {e}"))
    })?;
    let reset_timeout = env_secs("CIRCUIT_RESET_TIMEOUT_SECS")?;
    let time_unit = env_secs("CIRCUIT_TIME_UNIT_SECS")?;
    let backoff_cap = match std::env::var("CIRCUIT_BACKOFF_CAP_SECS") {
        Ok(raw) if !raw.trim().is_empty() => Some(parse_secs(&raw).map_err(|e| {
            ConfigError::invalid(format!("Invalid CIRCUIT_BACKOFF_CAP_SECS: {e}"))
        })?),
        _ => None,
    };
    let use_jitter = env_bool("CIRCUIT_USE_JITTER", true);

    let logging = LoggingConfig {
        level: std::env::var("CIRCUIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        json: env_bool("CIRCUIT_LOG_JSON", false),
    };

    let config = CircuitConfig {
        breaker: BreakerConfig { max_fail, reset_timeout, time_unit, backoff_cap, use_jitter },
        logging,
    };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the locations listed in the module docs.
/// The format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns a [`ConfigError`] if the file is missing, unreadable, malformed or
/// fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> ConfigResult<CircuitConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound(p));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ConfigError::invalid("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content, picking the format from `path`.
///
/// # Errors
/// Returns [`ConfigError::Parse`] for malformed content and
/// [`ConfigError::Invalid`] for unsupported extensions.
pub fn parse_config(contents: &str, path: &Path) -> ConfigResult<CircuitConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "TOML", message: e.to_string() }),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "JSON", message: e.to_string() }),
        other => Err(ConfigError::invalid(format!("Unsupported config format: {other}"))),
    }
}

/// Probe well-known paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> ConfigResult<String> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnv(key.to_string()))
}

/// Get required environment variable holding seconds
fn env_secs(key: &str) -> ConfigResult<std::time::Duration> {
    let raw = env_var(key)?;
    parse_secs(&raw).map_err(|e| ConfigError::invalid(format!("Invalid {key}: {e}")))
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;

    use once_cell::sync::Lazy;
    use tempfile::Builder;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ENV_KEYS: [&str; 7] = [
        "CIRCUIT_MAX_FAIL",
        "CIRCUIT_RESET_TIMEOUT_SECS",
        "CIRCUIT_TIME_UNIT_SECS",
        "CIRCUIT_BACKOFF_CAP_SECS",
        "CIRCUIT_USE_JITTER",
        "CIRCUIT_LOG_LEVEL",
        "CIRCUIT_LOG_JSON",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    fn write_temp(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("CIRCUIT_TEST_BOOL_YES", "YES");
        std::env::set_var("CIRCUIT_TEST_BOOL_OFF", "off");
        std::env::remove_var("CIRCUIT_TEST_BOOL_MISSING");

        assert!(env_bool("CIRCUIT_TEST_BOOL_YES", false));
        assert!(!env_bool("CIRCUIT_TEST_BOOL_OFF", true));
        assert!(env_bool("CIRCUIT_TEST_BOOL_MISSING", true));
        assert!(!env_bool("CIRCUIT_TEST_BOOL_MISSING", false));

        std::env::remove_var("CIRCUIT_TEST_BOOL_YES");
        std::env::remove_var("CIRCUIT_TEST_BOOL_OFF");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CIRCUIT_MAX_FAIL", "2");
        std::env::set_var("CIRCUIT_RESET_TIMEOUT_SECS", "10");
        std::env::set_var("CIRCUIT_TIME_UNIT_SECS", "0.5");
        std::env::set_var("CIRCUIT_BACKOFF_CAP_SECS", "64");
        std::env::set_var("CIRCUIT_USE_JITTER", "false");
        std::env::set_var("CIRCUIT_LOG_LEVEL", "debug");
        std::env::set_var("CIRCUIT_LOG_JSON", "1");

        let result = load_from_env();
        clear_env();

        let config = result.expect("Should load config from env vars");
        assert_eq!(config.breaker.max_fail, 2);
        assert_eq!(config.breaker.reset_timeout, Duration::from_secs(10));
        assert_eq!(config.breaker.time_unit, Duration::from_millis(500));
        assert_eq!(config.breaker.backoff_cap, Some(Duration::from_secs(64)));
        assert!(!config.breaker.use_jitter);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CIRCUIT_MAX_FAIL", "2");
        let result = load_from_env();
        clear_env();

        match result {
            Err(ConfigError::MissingEnv(key)) => assert_eq!(key, "CIRCUIT_RESET_TIMEOUT_SECS"),
            other => panic!("expected MissingEnv, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_env_invalid_values() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CIRCUIT_MAX_FAIL", "many");
        std::env::set_var("CIRCUIT_RESET_TIMEOUT_SECS", "10");
        std::env::set_var("CIRCUIT_TIME_UNIT_SECS", "60");
        assert!(matches!(load_from_env(), Err(ConfigError::Invalid { .. })));

        std::env::set_var("CIRCUIT_MAX_FAIL", "0");
        let result = load_from_env();
        clear_env();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })), "validation must run");
    }

    #[test]
    fn test_load_from_file_toml() {
        let file = write_temp(
            r#"
[breaker]
max_fail = 4
reset_timeout = 2.5
time_unit = 30
use_jitter = false

[logging]
level = "warn"
"#,
            ".toml",
        );

        let config = load_from_file(Some(file.path().to_path_buf())).expect("valid TOML");
        assert_eq!(config.breaker.max_fail, 4);
        assert_eq!(config.breaker.reset_timeout, Duration::from_millis(2500));
        assert_eq!(config.breaker.time_unit, Duration::from_secs(30));
        assert!(!config.breaker.use_jitter);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_from_file_json() {
        let file = write_temp(
            r#"{ "breaker": { "max_fail": 7, "backoff_cap": 120 } }"#,
            ".json",
        );

        let config = load_from_file(Some(file.path().to_path_buf())).expect("valid JSON");
        assert_eq!(config.breaker.max_fail, 7);
        assert_eq!(config.breaker.backoff_cap, Some(Duration::from_secs(120)));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/circuit.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let file = write_temp(r#"{ "breaker": "#, ".json");
        let result = load_from_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::Parse { format: "JSON", .. })));
    }

    #[test]
    fn test_load_from_file_rejects_invalid_policy() {
        let file = write_temp("[breaker]\nmax_fail = 0\n", ".toml");
        let result = load_from_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("breaker: {}", Path::new("circuit.yaml"));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
