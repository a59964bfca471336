//! Service configuration: built-in defaults, overlaid by a YAML file, overlaid by
//! `CARDBRIDGE__SECTION__KEY` environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use cardbridge_acl_engine::EngineConfig;
use cardbridge_dispatcher::DispatcherConfig;

const ENV_PREFIX: &str = "CARDBRIDGE__";
const LOCAL_CONFIG: &str = "config/cardbridge.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    pub store: StoreConfig,
    pub engine: EngineConfig,
    pub dispatcher: DispatcherConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file holding the legacy tables.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/acs.db"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory polled for `*.json` request files.
    pub inbox: PathBuf,
    /// Directory receiving `<id>.status.json` reports.
    pub outbox: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            inbox: PathBuf::from("data/inbox"),
            outbox: PathBuf::from("data/outbox"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    /// When set, logs also go to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: BridgeConfig,
    /// File the values came from, if one existed.
    pub path: Option<PathBuf>,
}

/// Explicit path first, then `config/cardbridge.yaml`, then the user config directory.
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|dir| dir.join("cardbridge").join("config.yaml"))
}

pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let path = resolve_path(explicit).filter(|path| path.exists());
    if let (Some(requested), None) = (explicit, &path) {
        return Err(ConfigError::Io {
            path: requested.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
        });
    }
    let config = load_from(path.as_deref(), env::vars())?;
    Ok(LoadedConfig { config, path })
}

/// Merges defaults, the optional file and the given environment.
pub fn load_from(
    path: Option<&Path>,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<BridgeConfig, ConfigError> {
    let mut merged = serde_json::to_value(BridgeConfig::default())
        .map_err(|err| ConfigError::Invalid(err.to_string()))?;

    if let Some(path) = path {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
            .map_err(|err| ConfigError::Invalid(format!("{}: {err}", path.display())))?;
        let file_value =
            serde_json::to_value(yaml).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if !file_value.is_null() {
            merge(&mut merged, file_value);
        }
    }

    for (key, raw) in vars {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_ascii_lowercase())
            .collect();
        if segments.is_empty() {
            continue;
        }
        set_path(&mut merged, &segments, parse_env_value(&raw));
    }

    serde_json::from_value(merged).map_err(|err| ConfigError::Invalid(err.to_string()))
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn set_path(root: &mut Value, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut cursor = root;
    for segment in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        let Value::Object(map) = cursor else {
            return;
        };
        cursor = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    if let Value::Object(map) = cursor {
        map.insert(last.clone(), value);
    }
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use serial_test::serial;

    fn no_env() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn defaults_without_file() {
        let config = load_from(None, no_env()).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.engine.location_group.0, 3);
        assert_eq!(config.engine.barrier.attempts, 30);
        assert_eq!(config.dispatcher.poll_interval, Duration::from_secs(60));
    }

    #[test]
    fn file_overrides_defaults_and_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardbridge.yaml");
        fs::write(
            &path,
            "engine:\n  default_permission: Tenant\n  barrier:\n    interval: 2s\ndispatcher:\n  poll_interval: 5m\n",
        )
        .unwrap();

        let config = load_from(
            Some(path.as_path()),
            vec![
                ("CARDBRIDGE__ENGINE__BARRIER__ATTEMPTS".to_string(), "4".to_string()),
                ("CARDBRIDGE__DISPATCHER__POLL_INTERVAL".to_string(), "30s".to_string()),
                ("CARDBRIDGE__LOGGING__JSON".to_string(), "true".to_string()),
                ("UNRELATED".to_string(), "x".to_string()),
            ],
        )
        .unwrap();

        assert_eq!(config.engine.default_permission, "Tenant");
        assert_eq!(config.engine.barrier.interval, Duration::from_secs(2));
        assert_eq!(config.engine.barrier.attempts, 4);
        assert_eq!(config.dispatcher.poll_interval, Duration::from_secs(30));
        assert!(config.logging.json);
        assert_eq!(config.engine.correlation_field, "ID");
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = load_from(
            None,
            vec![(
                "CARDBRIDGE__ENGINE__BARRIER__INTERVAL".to_string(),
                "eventually".to_string(),
            )],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    #[serial]
    fn load_reads_process_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "store:\n  path: /var/lib/cardbridge/acs.db\n").unwrap();

        env::set_var("CARDBRIDGE__INGEST__INBOX", "/srv/inbox");
        let loaded = load(Some(path.as_path()));
        env::remove_var("CARDBRIDGE__INGEST__INBOX");

        let loaded = loaded.unwrap();
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(
            loaded.config.store.path,
            PathBuf::from("/var/lib/cardbridge/acs.db")
        );
        assert_eq!(loaded.config.ingest.inbox, PathBuf::from("/srv/inbox"));
    }

    #[test]
    #[serial]
    fn explicit_missing_file_is_an_error() {
        let err = load(Some(Path::new("/nonexistent/cardbridge.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
