//! Configuration loader and validator for the scheduling daemon.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub availability: Availability,
    #[serde(default)]
    pub ordering: Ordering,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub scan_interval_ms: u64,
    pub cache_ttl_seconds: u64,
}

/// Availability scan settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Availability {
    /// How many days ahead the daemon's overbooking scan looks.
    pub horizon_days: u32,
}

/// Explicit priority ordering for availability board collections. Names
/// listed here sort first, in list order; everything else falls back to
/// alphabetical.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ordering {
    #[serde(default)]
    pub folders: Vec<String>,
    #[serde(default)]
    pub departments: Vec<String>,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.scan_interval_ms == 0 {
        return Err(ConfigError::Invalid("app.scan_interval_ms must be > 0"));
    }
    if cfg.app.cache_ttl_seconds == 0 {
        return Err(ConfigError::Invalid("app.cache_ttl_seconds must be > 0"));
    }
    if cfg.availability.horizon_days == 0 {
        return Err(ConfigError::Invalid("availability.horizon_days must be > 0"));
    }
    Ok(())
}

/// Example YAML shipped with the repository.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  scan_interval_ms: 30000
  cache_ttl_seconds: 30

availability:
  horizon_days: 30

ordering:
  folders:
    - "Audio"
    - "Lighting"
    - "Video"
  departments:
    - "Stage"
    - "Rigging"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.ordering.folders[0], "Audio");
    }

    #[test]
    fn ordering_is_optional() {
        let yaml = r#"
app:
  data_dir: "./data"
  scan_interval_ms: 1000
  cache_ttl_seconds: 10
availability:
  horizon_days: 7
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert!(cfg.ordering.folders.is_empty());
        assert!(cfg.ordering.departments.is_empty());
    }

    #[test]
    fn invalid_scan_interval() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.scan_interval_ms = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("scan_interval_ms")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_cache_ttl() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.cache_ttl_seconds = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_horizon() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.availability.horizon_days = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.availability.horizon_days, 30);
    }
}
