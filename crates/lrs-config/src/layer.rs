//! Raw settings layers.
//!
//! A layer is a flat map of setting names to unparsed string values. Names are
//! matched case-insensitively and ignore `_` and `-`, so `WebRoot`, `web_root`
//! and the environment variable `LIVERELOAD_WEB_ROOT` all address the same key.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Prefix for settings read from the process environment.
pub const ENV_PREFIX: &str = "LIVERELOAD_";

/// One source of raw settings.
///
/// A layer loaded from a file remembers the file's directory; relative paths
/// it supplies are resolved against that directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsLayer {
    values: BTreeMap<String, String>,
    base_dir: Option<PathBuf>,
}

impl SettingsLayer {
    /// Create an empty layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The documented default for every setting.
    #[must_use]
    pub fn defaults() -> Self {
        Self::from_pairs([
            (crate::keys::LIVE_RELOAD_ENABLED, "true"),
            (crate::keys::USE_SSL, "false"),
            (crate::keys::SHOW_URLS, "false"),
            (crate::keys::OPEN_BROWSER, "false"),
            (crate::keys::DEFAULT_FILES, crate::DEFAULT_FILES),
            (crate::keys::HOST, crate::DEFAULT_HOST),
            (crate::keys::PORT, "5000"),
            (crate::keys::DEBOUNCE_MS, "200"),
        ])
    }

    /// Build a layer from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut layer = Self::new();
        for (key, value) in pairs {
            layer.set(key.as_ref(), value);
        }
        layer
    }

    /// Build a layer from environment-style variables.
    ///
    /// Only variables starting with `prefix` are kept; the prefix is stripped.
    /// Variables whose name or value is not valid Unicode are skipped.
    pub fn from_env_vars<I, K, V>(vars: I, prefix: &str) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut layer = Self::new();
        for (name, value) in vars {
            let (Ok(name), Ok(value)) = (name.into().into_string(), value.into().into_string())
            else {
                continue;
            };
            if let Some(key) = name.strip_prefix(prefix)
                && !key.is_empty()
            {
                layer.set(key, value);
            }
        }
        layer
    }

    /// Read the layer from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_vars(std::env::vars_os(), ENV_PREFIX)
    }

    /// Parse a persisted TOML settings document.
    ///
    /// Scalars are stringified and arrays are joined with `,`. Nested tables
    /// are not settings and are skipped.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        let mut layer = Self::new();

        for (key, value) in table {
            match scalar_to_string(&value) {
                Some(raw) => layer.set(&key, raw),
                None => match value {
                    toml::Value::Array(items) => {
                        let joined = items
                            .iter()
                            .filter_map(scalar_to_string)
                            .collect::<Vec<_>>()
                            .join(",");
                        layer.set(&key, joined);
                    }
                    _ => tracing::debug!(key = %key, "Ignoring non-scalar setting"),
                },
            }
        }

        Ok(layer)
    }

    /// Load a persisted settings file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut layer = Self::from_toml_str(&content)?;
        layer.base_dir = path.parent().map(Path::to_path_buf);
        Ok(layer)
    }

    /// Resolve relative paths from this layer against `dir`.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Directory relative paths from this layer are resolved against.
    #[must_use]
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Set a raw value, replacing any previous one.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    /// Raw value for a key, if this layer defines it.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    /// Number of settings in this layer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether this layer defines no settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}
