//! Configuration file handling for the nadi shipper.
//!
//! The configuration lives under a top-level `nadi` key, either in YAML
//! (`nadi.yaml`, the default) or in TOML (`[nadi]` table in a `.toml` file).
//! Durations use humantime notation (`30s`, `1m`, `500ms`).
//!
//! # Example
//!
//! ```no_run
//! use nadi_config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("nadi.yaml")).expect("load config");
//! println!("shipping {} to {}", config.storage.display(), config.endpoint);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Default configuration file name
pub const CONFIG_FILE: &str = "nadi.yaml";

/// Environment variable overriding `apiKey`
pub const ENV_API_KEY: &str = "NADI_API_KEY";
/// Environment variable overriding `token`
pub const ENV_TOKEN: &str = "NADI_TOKEN";
/// Environment variable overriding `endpoint`
pub const ENV_ENDPOINT: &str = "NADI_ENDPOINT";

/// What the shipment loop does after a pass that delivered nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdlePolicy {
    /// Stop once a pass makes no successful delivery.
    #[default]
    Exit,
    /// Keep polling the directory until shutdown is requested.
    Poll,
}

/// Complete shipper configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShipperConfig {
    /// Base URL of the ingestion API; endpoint names are appended to it
    pub endpoint: String,
    /// Bearer credential
    pub api_key: String,
    /// Value of the `Nadi-Token` header
    pub token: String,
    /// Watched directory holding the JSON documents
    pub storage: PathBuf,
    /// Keep source files after a successful delivery
    pub persistent: bool,
    /// Failed attempts tolerated before a file is marked failed
    pub max_tries: u32,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Value of the `Accept` header
    pub accept: String,
    /// Location of the delivery tracker snapshot
    pub tracker_file: PathBuf,
    /// Sleep between shipment passes
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    /// Behaviour after an idle pass
    pub idle: IdlePolicy,
    /// Save the tracker after every reconciled file instead of once per pass
    pub checkpoint_each_file: bool,
    /// File name suffix selecting the documents to ship
    pub suffix: String,
}

fn default_max_tries() -> u32 { 3 }
fn default_timeout() -> Duration { Duration::from_secs(30) }
fn default_accept() -> String { "application/vnd.nadi.v1+json".to_string() }
fn default_tracker_file() -> PathBuf { PathBuf::from("tracker.json") }
fn default_check_interval() -> Duration { Duration::from_secs(10) }
fn default_suffix() -> String { ".json".to_string() }

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            token: String::new(),
            storage: PathBuf::new(),
            persistent: false,
            max_tries: default_max_tries(),
            timeout: default_timeout(),
            accept: default_accept(),
            tracker_file: default_tracker_file(),
            check_interval: default_check_interval(),
            idle: IdlePolicy::default(),
            checkpoint_each_file: false,
            suffix: default_suffix(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ConfigDocument {
    nadi: ShipperConfig,
}

/// On-disk format of a configuration file, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

impl ShipperConfig {
    /// Apply `NADI_*` environment overrides; non-empty values win over the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty(ENV_API_KEY) {
            self.api_key = v;
        }
        if let Some(v) = non_empty(ENV_TOKEN) {
            self.token = v;
        }
        if let Some(v) = non_empty(ENV_ENDPOINT) {
            self.endpoint = v;
        }
    }

    /// Reject configurations the shipper cannot operate with.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            bail!("nadi.endpoint must be set");
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            bail!("nadi.endpoint must be an http(s) URL, got {endpoint}");
        }
        if self.api_key.trim().is_empty() {
            bail!("nadi.apiKey must be set (or provide {ENV_API_KEY})");
        }
        if self.storage.as_os_str().is_empty() {
            bail!("nadi.storage must point at the directory to ship from");
        }
        if self.tracker_file.as_os_str().is_empty() {
            bail!("nadi.trackerFile must not be empty");
        }
        if self.timeout.is_zero() {
            bail!("nadi.timeout must be greater than zero");
        }
        if self.suffix.is_empty() {
            bail!("nadi.suffix must not be empty");
        }
        Ok(())
    }
}

/// Parse configuration text without touching the environment.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<ShipperConfig> {
    let doc: ConfigDocument = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content).context("invalid YAML configuration")?,
        ConfigFormat::Toml => toml::from_str(content).context("invalid TOML configuration")?,
    };
    Ok(doc.nadi)
}

/// Load, override from the environment, and validate a configuration file.
pub fn load_config(path: &Path) -> Result<ShipperConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content, ConfigFormat::from_path(path))
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config.apply_env_overrides();
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;

    Ok(config)
}

/// Save configuration to a file, in the format implied by its extension
pub fn save_config(path: &Path, config: &ShipperConfig) -> Result<()> {
    let doc = ConfigDocument {
        nadi: config.clone(),
    };
    let content = match ConfigFormat::from_path(path) {
        ConfigFormat::Yaml => serde_yaml::to_string(&doc).context("failed to serialize config to YAML")?,
        ConfigFormat::Toml => toml::to_string_pretty(&doc).context("failed to serialize config to TOML")?,
    };

    std::fs::write(path, content)
        .with_context(|| format!("failed to write config file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    fn valid_config() -> ShipperConfig {
        ShipperConfig {
            endpoint: "https://nadi.example/api".to_string(),
            api_key: "key".to_string(),
            token: "tok".to_string(),
            storage: PathBuf::from("/var/log/nadi"),
            ..ShipperConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let config = ShipperConfig::default();
        assert_eq!(config.max_tries, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.check_interval, Duration::from_secs(10));
        assert_eq!(config.accept, "application/vnd.nadi.v1+json");
        assert_eq!(config.tracker_file, PathBuf::from("tracker.json"));
        assert_eq!(config.idle, IdlePolicy::Exit);
        assert_eq!(config.suffix, ".json");
        assert!(!config.persistent);
        assert!(!config.checkpoint_each_file);
    }

    #[test]
    fn parse_yaml_with_camel_case_keys() {
        let content = r#"
nadi:
  endpoint: https://nadi.example/api/
  apiKey: secret-key
  token: app-token
  storage: /var/log/nadi
  persistent: true
  maxTries: 5
  timeout: 1m
  accept: application/vnd.nadi.v1+json
  trackerFile: /var/lib/nadi/tracker.json
  checkInterval: 500ms
  idle: poll
"#;
        let config = parse_config(content, ConfigFormat::Yaml).expect("parse");

        assert_eq!(config.endpoint, "https://nadi.example/api/");
        assert_eq!(config.api_key, "secret-key");
        assert_eq!(config.token, "app-token");
        assert_eq!(config.storage, PathBuf::from("/var/log/nadi"));
        assert!(config.persistent);
        assert_eq!(config.max_tries, 5);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.tracker_file, PathBuf::from("/var/lib/nadi/tracker.json"));
        assert_eq!(config.check_interval, Duration::from_millis(500));
        assert_eq!(config.idle, IdlePolicy::Poll);
    }

    #[test]
    fn parse_toml_table() {
        let content = r#"
[nadi]
endpoint = "http://localhost:8080"
apiKey = "k"
storage = "spool"
checkpointEachFile = true
"#;
        let config = parse_config(content, ConfigFormat::Toml).expect("parse");
        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.storage, PathBuf::from("spool"));
        assert!(config.checkpoint_each_file);
        assert_eq!(config.max_tries, 3); // default
    }

    #[test]
    fn parse_rejects_bad_duration() {
        let content = "nadi:\n  endpoint: http://x\n  timeout: soon\n";
        assert!(parse_config(content, ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("nadi.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("nadi.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("nadi.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("nadi")), ConfigFormat::Yaml);
    }

    #[test]
    fn validate_accepts_complete_config() {
        valid_config().validate().expect("valid");
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let mut c = valid_config();
        c.endpoint.clear();
        assert!(c.validate().is_err());

        let mut c = valid_config();
        c.endpoint = "ftp://nadi.example".to_string();
        assert!(c.validate().is_err());

        let mut c = valid_config();
        c.api_key = "  ".to_string();
        assert!(c.validate().is_err());

        let mut c = valid_config();
        c.storage = PathBuf::new();
        assert!(c.validate().is_err());

        let mut c = valid_config();
        c.timeout = Duration::ZERO;
        assert!(c.validate().is_err());
    }

    #[test]
    fn overrides_replace_only_non_empty_values() {
        let mut c = valid_config();
        c.apply_overrides(|key| match key {
            ENV_API_KEY => Some("from-env".to_string()),
            ENV_TOKEN => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(c.api_key, "from-env");
        assert_eq!(c.token, "tok");
        assert_eq!(c.endpoint, "https://nadi.example/api");
    }

    #[test]
    #[serial]
    fn load_config_applies_environment() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "nadi:\n  endpoint: https://nadi.example\n  storage: spool\n",
        )
        .expect("write");

        temp_env::with_vars(
            [(ENV_API_KEY, Some("env-key")), (ENV_ENDPOINT, None::<&str>), (ENV_TOKEN, None)],
            || {
                let config = load_config(&path).expect("load");
                assert_eq!(config.api_key, "env-key");
            },
        );
    }

    #[test]
    #[serial]
    fn load_config_fails_validation_without_key() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "nadi:\n  endpoint: https://nadi.example\n  storage: spool\n",
        )
        .expect("write");

        temp_env::with_vars_unset([ENV_API_KEY, ENV_TOKEN, ENV_ENDPOINT], || {
            let err = load_config(&path).expect_err("missing api key");
            assert!(format!("{err:#}").contains("apiKey"));
        });
    }

    #[test]
    fn load_missing_config_is_an_error() {
        let td = tempdir().expect("tempdir");
        assert!(load_config(&td.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn save_and_parse_roundtrip_in_both_formats() {
        let td = tempdir().expect("tempdir");
        let config = valid_config();

        for name in ["nadi.yaml", "nadi.toml"] {
            let path = td.path().join(name);
            save_config(&path, &config).expect("save");
            let content = std::fs::read_to_string(&path).expect("read");
            let parsed = parse_config(&content, ConfigFormat::from_path(&path)).expect("parse");
            assert_eq!(parsed, config);
        }
    }
}
