//! `thumbcache.toml`: the service settings.
//!
//! The defaults form the bottom layer and the user's file is laid over it,
//! so a file only names the keys it changes.
//!
//! ```toml
//! [cache]
//! enabled = true             # Memoize encoded output
//! expiration_minutes = 20    # Entry lifetime
//! distinguish_style = false  # Key on anchor/background/ratios too
//!
//! [images]
//! max_dimension = 1600       # Longer-edge bound for save-for-web
//! target_directory = "Images/"
//!
//! [source]
//! root = "."                 # Directory source identifiers resolve against
//! # temp_dir = "uploads"     # Where uploads wait before save-for-web
//! missing = "placeholder"    # "placeholder" or "error"
//!
//! [processing]
//! max_processes = 4          # Max parallel batch workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use toml::Value;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Validation(String),
}

/// Looked up in the working directory unless `--config` says otherwise.
pub const CONFIG_FILENAME: &str = "thumbcache.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub cache: CacheConfig,
    /// Settings for save-for-web.
    pub images: ImagesConfig,
    /// Where sources come from and what happens when one is missing.
    pub source: SourceConfig,
    pub processing: ProcessingConfig,
}

impl ServiceConfig {
    /// Reject values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (
                self.cache.expiration_minutes == 0,
                "cache.expiration_minutes must be at least 1",
            ),
            (
                self.images.max_dimension == 0,
                "images.max_dimension must be at least 1",
            ),
            (
                self.processing.max_processes == Some(0),
                "processing.max_processes must be at least 1",
            ),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(ConfigError::Validation(message.to_string())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    pub expiration_minutes: u64,
    /// Include anchor, background colour, crop ratios and Raw bounds in the
    /// cache key. Off by default: requests differing only in those share an
    /// entry.
    pub distinguish_style: bool,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.expiration_minutes * 60)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expiration_minutes: 20,
            distinguish_style: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Longer-edge bound applied by save-for-web.
    pub max_dimension: u32,
    /// Directory (within the store) that save-for-web writes into.
    pub target_directory: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1600,
            target_directory: "Images/".to_string(),
        }
    }
}

/// What to do when a source identifier resolves to nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSource {
    /// Render the grey placeholder at the requested size.
    #[default]
    Placeholder,
    /// Report [`Error::SourceNotFound`](crate::Error::SourceNotFound).
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub root: String,
    /// Separate directory for uploads; defaults to `root`.
    pub temp_dir: Option<String>,
    pub missing: MissingSource,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            temp_dir: None,
            missing: MissingSource::Placeholder,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Upper bound on batch worker threads. `None` means one per core.
    pub max_processes: Option<usize>,
}

impl ProcessingConfig {
    /// Worker count for the batch pool, never more than the machine has.
    pub fn worker_threads(&self) -> usize {
        let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        match self.max_processes {
            Some(limit) => limit.min(cores),
            None => cores,
        }
    }
}

// =============================================================================
// Layered loading: stock defaults, then the user's file on top
// =============================================================================

/// [`ServiceConfig::default`] as a TOML table, the bottom layer.
pub fn defaults_table() -> Value {
    Value::try_from(ServiceConfig::default()).expect("default config serializes to TOML")
}

/// Lay `top` over `bottom`. Tables combine per key, at any depth; any other
/// value in `top` wins outright.
pub fn layer(bottom: Value, top: Value) -> Value {
    match (bottom, top) {
        (Value::Table(mut merged), Value::Table(upper)) => {
            for (key, value) in upper {
                let combined = match merged.remove(&key) {
                    Some(lower) => layer(lower, value),
                    None => value,
                };
                merged.insert(key, combined);
            }
            Value::Table(merged)
        }
        (_, top) => top,
    }
}

/// Parse the user's file. `Ok(None)` when there is no file at `path`.
pub fn read_overrides(path: &Path) -> Result<Option<Value>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(toml::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Stack `overrides` (if any) on the defaults, deserialize and validate.
pub fn from_layers(overrides: Option<Value>) -> Result<ServiceConfig, ConfigError> {
    let value = match overrides {
        Some(top) => layer(defaults_table(), top),
        None => defaults_table(),
    };
    let config: ServiceConfig = value.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    from_layers(read_overrides(path)?)
}

/// Every key with its default and a short explanation; printed by
/// `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# thumbcache.toml
#
# Every key below is shown with its default. Delete whatever you do not
# want to change; misspelled keys are reported as errors.

# ---------------------------------------------------------------------------
# Transform cache
# ---------------------------------------------------------------------------
[cache]
# Memoize encoded derivatives in memory.
enabled = true

# Minutes an entry stays valid. Expired entries are dropped on lookup.
expiration_minutes = 20

# Key the cache on anchor, background colour, crop ratios and Raw bounds as
# well as size/mode/format. When false, two requests that differ only in
# those share one entry (and one of them gets the other's image).
distinguish_style = false

# ---------------------------------------------------------------------------
# Web uploads (save-for-web)
# ---------------------------------------------------------------------------
[images]
# Uploads larger than this on their longer edge are scaled down.
max_dimension = 1600

# Directory within the store that prepared uploads are written to.
target_directory = "Images/"

# ---------------------------------------------------------------------------
# Sources
# ---------------------------------------------------------------------------
[source]
# Directory that source identifiers are resolved against.
root = "."

# Directory holding uploads waiting for save-for-web. Defaults to root.
# temp_dir = "uploads"

# "placeholder" renders a grey image of the requested size when a source is
# missing; "error" reports the missing source instead.
missing = "placeholder"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Upper bound on batch worker threads. Left unset, one per CPU core.
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> Result<ServiceConfig, toml::de::Error> {
        toml::from_str(text)
    }

    fn write_config(text: &str) -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, text).unwrap();
        (tmp, path)
    }

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(20 * 60));
        assert!(!config.cache.distinguish_style);
        assert_eq!(config.images.max_dimension, 1600);
        assert_eq!(config.images.target_directory, "Images/");
        assert_eq!(config.source.root, ".");
        assert_eq!(config.source.missing, MissingSource::Placeholder);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn sparse_file_keeps_other_defaults() {
        let config = parse("[cache]\nexpiration_minutes = 5\n").unwrap();
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert!(config.cache.enabled);
        assert_eq!(config.images, ImagesConfig::default());
    }

    #[test]
    fn missing_source_policy_is_lowercase() {
        let config = parse("[source]\nmissing = \"error\"\n").unwrap();
        assert_eq!(config.source.missing, MissingSource::Error);
        assert!(parse("[source]\nmissing = \"Error\"\n").is_err());
        assert!(parse("[source]\nmissing = \"ignore\"\n").is_err());
    }

    #[test]
    fn misspelled_keys_and_sections_fail() {
        let err = parse("[cache]\nexpiraton_minutes = 5\n").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
        assert!(parse("[caches]\nenabled = true\n").is_err());
    }

    // =========================================================================
    // layer
    // =========================================================================

    #[test]
    fn layer_replaces_scalars() {
        let bottom: Value = toml::from_str("n = 1\nkeep = \"a\"").unwrap();
        let top: Value = toml::from_str("n = 2").unwrap();
        let merged = layer(bottom, top);
        assert_eq!(merged["n"].as_integer(), Some(2));
        assert_eq!(merged["keep"].as_str(), Some("a"));
    }

    #[test]
    fn layer_descends_into_tables() {
        let merged = layer(
            defaults_table(),
            toml::from_str("[source]\nroot = \"/srv\"").unwrap(),
        );
        let source = &merged["source"];
        assert_eq!(source["root"].as_str(), Some("/srv"));
        assert_eq!(source["missing"].as_str(), Some("placeholder"));
        assert!(merged.get("cache").is_some());
    }

    #[test]
    fn defaults_table_round_trips() {
        let config: ServiceConfig = defaults_table().try_into().unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    // =========================================================================
    // validate
    // =========================================================================

    #[test]
    fn zero_values_are_rejected() {
        assert!(ServiceConfig::default().validate().is_ok());

        let mut config = ServiceConfig::default();
        config.cache.expiration_minutes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = ServiceConfig::default();
        config.images.max_dimension = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn worker_threads_never_exceed_cores() {
        let one = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(one.worker_threads(), 1);

        let huge = ProcessingConfig {
            max_processes: Some(100_000),
        };
        assert_eq!(huge.worker_threads(), ProcessingConfig::default().worker_threads());
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn absent_file_means_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let (_tmp, path) = write_config(
            r#"
[cache]
distinguish_style = true

[source]
root = "/srv/images"
temp_dir = "/srv/uploads"

[processing]
max_processes = 2
"#,
        );
        let config = load_config(&path).unwrap();
        assert!(config.cache.distinguish_style);
        assert_eq!(config.cache.expiration_minutes, 20);
        assert_eq!(config.source.root, "/srv/images");
        assert_eq!(config.source.temp_dir.as_deref(), Some("/srv/uploads"));
        assert_eq!(config.processing.max_processes, Some(2));
    }

    #[test]
    fn load_errors_are_classified() {
        let (_a, broken) = write_config("this is not [valid toml");
        assert!(matches!(load_config(&broken), Err(ConfigError::Toml(_))));

        let (_b, typo) = write_config("[images]\nmax_dimensions = 800\n");
        assert!(matches!(load_config(&typo), Err(ConfigError::Toml(_))));

        let (_c, zero) = write_config("[images]\nmax_dimension = 0\n");
        assert!(matches!(load_config(&zero), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn from_layers_without_overrides_is_default() {
        assert_eq!(from_layers(None).unwrap(), ServiceConfig::default());
    }

    // =========================================================================
    // stock_config_toml
    // =========================================================================

    #[test]
    fn stock_file_parses_to_defaults() {
        let text = stock_config_toml();
        assert_eq!(parse(text).unwrap(), ServiceConfig::default());
        for section in ["[cache]", "[images]", "[source]", "[processing]"] {
            assert!(text.contains(section), "missing {section}");
        }
    }
}
