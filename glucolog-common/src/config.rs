//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Service configuration file, located in the root folder
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// SQLite database file, located in the root folder
pub const DATABASE_FILE_NAME: &str = "glucolog.db";
/// Persisted LibreLinkUp credential, located in the root folder
pub const TOKEN_FILE_NAME: &str = "token.json";

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "GLUCOLOG_ROOT_FOLDER";

/// Service configuration
///
/// Loaded from `config.toml` under the root folder; individual values can
/// be overridden with `GLUCOLOG_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Seconds slept after each completed ingestion cycle
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// LibreLinkUp remote API settings
    #[serde(default)]
    pub libre: LibreConfig,
}

/// LibreLinkUp remote API settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibreConfig {
    /// Base URL of the LibreLinkUp API
    #[serde(default)]
    pub host: String,
    /// Account email used for authentication
    #[serde(default)]
    pub email: String,
    /// Account password used for authentication
    #[serde(default)]
    pub password: String,
    /// Patient connection id queried for graph data
    #[serde(default)]
    pub patient_id: String,
}

fn default_bind_address() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `GLUCOLOG_ROOT_FOLDER` environment variable
/// 3. `root_folder` key in the per-user config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: Per-user config file
    if let Some(config_path) = user_config_path() {
        if let Ok(contents) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&contents) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent default
    default_root_folder()
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("glucolog").join(CONFIG_FILE_NAME))
}

fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("glucolog"))
        .unwrap_or_else(|| PathBuf::from("./glucolog_data"))
}

/// Path of the database file under the root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Path of the persisted credential file under the root folder
pub fn token_path(root_folder: &Path) -> PathBuf {
    root_folder.join(TOKEN_FILE_NAME)
}

/// Load service configuration from the root folder
///
/// A missing config file is not an error (defaults plus environment
/// overrides may be sufficient); missing LibreLinkUp settings are, since
/// the ingestion loop cannot run without them.
pub fn load_service_config(root_folder: &Path) -> Result<ServiceConfig> {
    let config_path = root_folder.join(CONFIG_FILE_NAME);

    let mut config: ServiceConfig = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", config_path.display(), e)))?
    } else {
        warn!(
            "No config file at {}, using defaults and environment",
            config_path.display()
        );
        toml::from_str("").map_err(|e| Error::Config(e.to_string()))?
    };

    apply_env_overrides(&mut config)?;
    validate(&config)?;

    Ok(config)
}

fn apply_env_overrides(config: &mut ServiceConfig) -> Result<()> {
    if let Ok(value) = std::env::var("GLUCOLOG_BIND_ADDRESS") {
        config.bind_address = value;
    }
    if let Ok(value) = std::env::var("GLUCOLOG_POLL_INTERVAL_SECS") {
        config.poll_interval_secs = value
            .parse()
            .map_err(|_| Error::Config(format!("invalid GLUCOLOG_POLL_INTERVAL_SECS: {value}")))?;
    }
    if let Ok(value) = std::env::var("GLUCOLOG_LIBRE_HOST") {
        config.libre.host = value;
    }
    if let Ok(value) = std::env::var("GLUCOLOG_LIBRE_EMAIL") {
        config.libre.email = value;
    }
    if let Ok(value) = std::env::var("GLUCOLOG_LIBRE_PASSWORD") {
        config.libre.password = value;
    }
    if let Ok(value) = std::env::var("GLUCOLOG_LIBRE_PATIENT_ID") {
        config.libre.patient_id = value;
    }
    Ok(())
}

fn validate(config: &ServiceConfig) -> Result<()> {
    let libre = &config.libre;
    let missing: Vec<&str> = [
        ("libre.host", &libre.host),
        ("libre.email", &libre.email),
        ("libre.password", &libre.password),
        ("libre.patient_id", &libre.patient_id),
    ]
    .iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| *name)
    .collect();

    if !missing.is_empty() {
        return Err(Error::Config(format!(
            "LibreLinkUp not configured: missing {}. Set them in config.toml \
             under the root folder or via GLUCOLOG_LIBRE_* environment variables.",
            missing.join(", ")
        )));
    }

    if config.poll_interval_secs == 0 {
        return Err(Error::Config(
            "poll_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: &[&str] = &[
        "GLUCOLOG_BIND_ADDRESS",
        "GLUCOLOG_POLL_INTERVAL_SECS",
        "GLUCOLOG_LIBRE_HOST",
        "GLUCOLOG_LIBRE_EMAIL",
        "GLUCOLOG_LIBRE_PASSWORD",
        "GLUCOLOG_LIBRE_PATIENT_ID",
        ROOT_FOLDER_ENV,
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn write_config(dir: &Path, contents: &str) {
        std::fs::write(dir.join(CONFIG_FILE_NAME), contents).unwrap();
    }

    const FULL_CONFIG: &str = r#"
        bind_address = "0.0.0.0:9000"
        poll_interval_secs = 30

        [libre]
        host = "https://api.libreview.example"
        email = "user@example.com"
        password = "hunter2"
        patient_id = "abc-123"
    "#;

    #[test]
    #[serial]
    fn test_load_full_config() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), FULL_CONFIG);

        let config = load_service_config(dir.path()).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.libre.host, "https://api.libreview.example");
        assert_eq!(config.libre.patient_id, "abc-123");
    }

    #[test]
    #[serial]
    fn test_defaults_applied_when_omitted() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
            [libre]
            host = "https://api.libreview.example"
            email = "user@example.com"
            password = "hunter2"
            patient_id = "abc-123"
            "#,
        );

        let config = load_service_config(dir.path()).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:8000");
        assert_eq!(config.poll_interval_secs, 60);
    }

    #[test]
    #[serial]
    fn test_env_overrides_toml() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), FULL_CONFIG);

        std::env::set_var("GLUCOLOG_POLL_INTERVAL_SECS", "120");
        std::env::set_var("GLUCOLOG_LIBRE_PATIENT_ID", "env-id");
        let config = load_service_config(dir.path()).unwrap();
        clear_env();

        assert_eq!(config.poll_interval_secs, 120);
        assert_eq!(config.libre.patient_id, "env-id");
        // Untouched values keep their TOML settings
        assert_eq!(config.libre.email, "user@example.com");
    }

    #[test]
    #[serial]
    fn test_missing_libre_settings_rejected() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "bind_address = \"127.0.0.1:8000\"\n");

        let err = load_service_config(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("libre.host"));
    }

    #[test]
    #[serial]
    fn test_root_folder_priority() {
        clear_env();

        // CLI argument wins over everything
        std::env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
        let cli = PathBuf::from("/tmp/from-cli");
        assert_eq!(resolve_root_folder(Some(&cli)), cli);

        // Environment variable wins when no CLI argument
        assert_eq!(
            resolve_root_folder(None),
            PathBuf::from("/tmp/from-env")
        );
        clear_env();
    }
}
