//! Configuration resolution for the live-reload server.
//!
//! Settings come from several [`SettingsLayer`]s, lowest priority first:
//!
//! 1. Built-in defaults ([`SettingsLayer::defaults`])
//! 2. The persisted `livereload.toml` file (auto-discovered in parent directories)
//! 3. The process environment (`LIVERELOAD_*` variables)
//! 4. Command-line overrides
//!
//! [`resolve_layers`] merges them into one immutable [`Configuration`]. Resolution
//! never fails: malformed values fall back to their documented default.
//!
//! ## Value Parsing
//!
//! - Logical settings accept `true`, `1` and `yes` (case-insensitive) as true.
//!   Anything else, including garbage, is false.
//! - `Port` falls back to 5000 when it is not a valid non-zero port number.
//! - List settings (`Extensions`, `DefaultFiles`) are split on `,` and `;`.

mod layer;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use layer::{ENV_PREFIX, SettingsLayer};

/// Setting names.
pub mod keys {
    /// Enable the live-reload channel and HTML injection.
    pub const LIVE_RELOAD_ENABLED: &str = "LiveReloadEnabled";
    /// Route renderer pages through the pluggable renderer.
    pub const USE_RENDERER: &str = "UseRenderer";
    /// Legacy alias for [`USE_RENDERER`].
    pub const USE_RAZOR: &str = "UseRazor";
    /// Directory served as the site root.
    pub const WEB_ROOT: &str = "WebRoot";
    /// Extensions that trigger a reload when changed.
    pub const EXTENSIONS: &str = "Extensions";
    /// Serve over HTTPS.
    pub const USE_SSL: &str = "UseSsl";
    /// Log every request URL.
    pub const SHOW_URLS: &str = "ShowUrls";
    /// Open a browser window on start.
    pub const OPEN_BROWSER: &str = "OpenBrowser";
    /// Default documents for directory requests.
    pub const DEFAULT_FILES: &str = "DefaultFiles";
    /// Listening port.
    pub const PORT: &str = "Port";
    /// Listening host.
    pub const HOST: &str = "Host";
    /// PEM certificate used when `UseSsl` is on.
    pub const CERT_FILE: &str = "CertFile";
    /// PEM private key used when `UseSsl` is on.
    pub const KEY_FILE: &str = "KeyFile";
    /// Debounce window in milliseconds.
    pub const DEBOUNCE_MS: &str = "DebounceMs";
}

/// Persisted configuration filename to search for.
pub const CONFIG_FILENAME: &str = "livereload.toml";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default listening host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default debounce window in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Default watched extensions.
pub const DEFAULT_EXTENSIONS: &str = ".css,.js,.htm,.html";

/// Default documents for directory requests.
pub const DEFAULT_FILES: &str = "index.html,default.htm,default.html";

/// Page extension handled by the renderer.
pub const RENDERER_EXTENSION: &str = ".rhtml";

/// Resolved server configuration.
///
/// Produced once at startup and shared read-only with every component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    /// Absolute directory served as the site root.
    pub web_root: PathBuf,
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Serve over HTTPS.
    pub use_tls: bool,
    /// PEM certificate for TLS.
    pub cert_file: Option<PathBuf>,
    /// PEM private key for TLS.
    pub key_file: Option<PathBuf>,
    /// Lower-cased extensions with a leading dot, in configured order.
    pub watched_extensions: Vec<String>,
    /// Default documents tried in order for directory requests.
    pub default_file_names: Vec<String>,
    /// Whether live reload is enabled.
    pub live_reload_enabled: bool,
    /// Whether request URLs are logged.
    pub show_request_urls: bool,
    /// Whether a browser should be opened on start.
    pub open_browser_on_start: bool,
    /// Whether renderer pages are routed through the renderer.
    pub renderer_enabled: bool,
    /// Debounce window for change events.
    pub debounce: Duration,
}

impl Configuration {
    /// URL scheme the server listens with.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.use_tls { "https" } else { "http" }
    }

    /// Browser-facing URL of the site root.
    #[must_use]
    pub fn site_url(&self) -> String {
        let host = match self.host.as_str() {
            "127.0.0.1" | "::1" | "0.0.0.0" | "::" | "localhost" => "localhost",
            other => other,
        };
        format!("{}://{host}:{}", self.scheme(), self.port)
    }

    /// Address string suitable for socket binding.
    #[must_use]
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Configuration error.
///
/// Only raised while loading a persisted settings file; resolution itself
/// never fails.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Resolve defaults, persisted config, and environment into a configuration.
///
/// `cwd` is the fallback web root and the base for relative paths.
#[must_use]
pub fn resolve(
    defaults: &SettingsLayer,
    persisted: &SettingsLayer,
    environment: &SettingsLayer,
    cwd: &Path,
) -> Configuration {
    resolve_layers(&[defaults, persisted, environment], cwd)
}

/// Resolve any number of layers, later layers taking precedence.
#[must_use]
pub fn resolve_layers(layers: &[&SettingsLayer], cwd: &Path) -> Configuration {
    let settings = Layered(layers);

    let renderer_enabled = settings.logical(keys::USE_RENDERER)
        || (settings.get(keys::USE_RENDERER).is_none() && settings.logical(keys::USE_RAZOR));

    let watched_extensions = match settings.non_empty(keys::EXTENSIONS) {
        Some(raw) => parse_extensions(raw),
        None => Vec::new(),
    };
    let watched_extensions = if watched_extensions.is_empty() {
        default_extensions(renderer_enabled)
    } else {
        watched_extensions
    };

    let default_file_names = settings
        .non_empty(keys::DEFAULT_FILES)
        .map(parse_list)
        .filter(|list| !list.is_empty())
        .unwrap_or_else(|| parse_list(DEFAULT_FILES));

    Configuration {
        web_root: resolve_web_root(settings.path(keys::WEB_ROOT, cwd), cwd),
        host: settings
            .non_empty(keys::HOST)
            .map_or_else(|| DEFAULT_HOST.to_owned(), |h| h.trim().to_owned()),
        port: parse_port(settings.get(keys::PORT)),
        use_tls: settings.logical(keys::USE_SSL),
        cert_file: settings.path(keys::CERT_FILE, cwd),
        key_file: settings.path(keys::KEY_FILE, cwd),
        watched_extensions,
        default_file_names,
        live_reload_enabled: settings.logical(keys::LIVE_RELOAD_ENABLED),
        show_request_urls: settings.logical(keys::SHOW_URLS),
        open_browser_on_start: settings.logical(keys::OPEN_BROWSER),
        renderer_enabled,
        debounce: Duration::from_millis(parse_debounce_ms(settings.get(keys::DEBOUNCE_MS))),
    }
}

/// Parse a logical setting.
///
/// `true`, `1` and `yes` (case-insensitive, surrounding whitespace ignored)
/// are true; every other value is false.
#[must_use]
pub fn parse_logical(raw: &str) -> bool {
    let value = raw.trim();
    ["true", "1", "yes"]
        .iter()
        .any(|accepted| value.eq_ignore_ascii_case(accepted))
}

/// Parse the port setting, falling back to [`DEFAULT_PORT`].
#[must_use]
pub fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|p| p.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .unwrap_or(DEFAULT_PORT)
}

fn parse_debounce_ms(raw: Option<&str>) -> u64 {
    raw.and_then(|ms| ms.trim().parse::<u64>().ok())
        .filter(|ms| *ms != 0)
        .unwrap_or(DEFAULT_DEBOUNCE_MS)
}

/// Split a `,`/`;` separated list, dropping empty entries.
#[must_use]
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parse an extension list into lower-cased, dot-prefixed, unique entries.
#[must_use]
pub fn parse_extensions(raw: &str) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    for item in parse_list(raw) {
        let ext = item.trim_start_matches('*').to_lowercase();
        let ext = if ext.starts_with('.') {
            ext
        } else {
            format!(".{ext}")
        };
        if ext.len() > 1 && !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }
    extensions
}

fn default_extensions(renderer_enabled: bool) -> Vec<String> {
    let mut extensions = Vec::new();
    if renderer_enabled {
        extensions.push(RENDERER_EXTENSION.to_owned());
    }
    extensions.extend(parse_extensions(DEFAULT_EXTENSIONS));
    extensions
}

/// Resolve the web root: explicit setting first, then `cwd`.
///
/// A setting that does not name an existing directory falls back to `cwd`.
fn resolve_web_root(candidate: Option<PathBuf>, cwd: &Path) -> PathBuf {
    let Some(candidate) = candidate else {
        return absolute_dir(cwd);
    };

    match std::fs::canonicalize(&candidate) {
        Ok(path) if path.is_dir() => path,
        _ => {
            tracing::warn!(
                web_root = %candidate.display(),
                fallback = %cwd.display(),
                "Web root is not an existing directory, using current directory"
            );
            absolute_dir(cwd)
        }
    }
}

fn absolute_dir(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Search for the persisted config file in `start` and its parents.
#[must_use]
pub fn discover_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILENAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Layer stack lookup, topmost layer wins.
struct Layered<'a>(&'a [&'a SettingsLayer]);

impl Layered<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().rev().find_map(|layer| layer.get(key))
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// Path setting, relative to the supplying layer's base directory or `cwd`.
    fn path(&self, key: &str, cwd: &Path) -> Option<PathBuf> {
        let layer = self.0.iter().rev().find(|layer| layer.get(key).is_some())?;
        let raw = layer.get(key).map(str::trim).filter(|v| !v.is_empty())?;
        Some(layer.base_dir().unwrap_or(cwd).join(raw))
    }

    fn logical(&self, key: &str) -> bool {
        self.get(key).is_some_and(parse_logical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolve_with(environment: &SettingsLayer, cwd: &Path) -> Configuration {
        resolve(
            &SettingsLayer::defaults(),
            &SettingsLayer::new(),
            environment,
            cwd,
        )
    }

    #[test]
    fn test_parse_logical_true_values() {
        for value in ["true", "TRUE", "True", "1", "yes", "YES", " yes "] {
            assert!(parse_logical(value), "{value:?} should be true");
        }
    }

    #[test]
    fn test_parse_logical_false_and_garbage() {
        for value in ["false", "FALSE", "0", "no", "", "on", "enabled", "2", "y", "tru"] {
            assert!(!parse_logical(value), "{value:?} should be false");
        }
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port(Some("8080")), 8080);
        assert_eq!(parse_port(Some(" 8080 ")), 8080);
        assert_eq!(parse_port(Some("abc")), DEFAULT_PORT);
        assert_eq!(parse_port(Some("0")), DEFAULT_PORT);
        assert_eq!(parse_port(Some("70000")), DEFAULT_PORT);
        assert_eq!(parse_port(Some("-1")), DEFAULT_PORT);
        assert_eq!(parse_port(None), DEFAULT_PORT);
    }

    #[test]
    fn test_parse_list_splits_on_comma_and_semicolon() {
        assert_eq!(
            parse_list("index.html; default.htm,,default.html "),
            vec!["index.html", "default.htm", "default.html"]
        );
    }

    #[test]
    fn test_parse_extensions_normalizes() {
        assert_eq!(
            parse_extensions("CSS, .js;*.Html,.css,."),
            vec![".css", ".js", ".html"]
        );
    }

    #[test]
    fn test_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = resolve_with(&SettingsLayer::new(), temp_dir.path());

        assert_eq!(
            config.web_root,
            std::fs::canonicalize(temp_dir.path()).unwrap()
        );
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "127.0.0.1");
        assert!(!config.use_tls);
        assert_eq!(
            config.watched_extensions,
            vec![".css", ".js", ".htm", ".html"]
        );
        assert_eq!(
            config.default_file_names,
            vec!["index.html", "default.htm", "default.html"]
        );
        assert!(config.live_reload_enabled);
        assert!(!config.show_request_urls);
        assert!(!config.open_browser_on_start);
        assert!(!config.renderer_enabled);
        assert_eq!(config.debounce, Duration::from_millis(200));
        assert_eq!(config.site_url(), "http://localhost:5000");
    }

    #[test]
    fn test_garbage_port_falls_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = SettingsLayer::from_pairs([("Port", "abc")]);

        let config = resolve_with(&env, temp_dir.path());

        assert_eq!(config.port, 5000);
    }

    #[test]
    fn test_environment_overrides_persisted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let persisted = SettingsLayer::from_pairs([("Port", "7000"), ("ShowUrls", "true")]);
        let env = SettingsLayer::from_pairs([("Port", "9000")]);

        let config = resolve(
            &SettingsLayer::defaults(),
            &persisted,
            &env,
            temp_dir.path(),
        );

        assert_eq!(config.port, 9000);
        assert!(config.show_request_urls);
    }

    #[test]
    fn test_garbage_logical_is_false_even_when_default_true() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = SettingsLayer::from_pairs([("LiveReloadEnabled", "maybe")]);

        let config = resolve_with(&env, temp_dir.path());

        assert!(!config.live_reload_enabled);
    }

    #[test]
    fn test_relative_web_root_resolves_against_cwd() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("site")).unwrap();
        let env = SettingsLayer::from_pairs([("WebRoot", "site")]);

        let config = resolve_with(&env, temp_dir.path());

        assert_eq!(
            config.web_root,
            std::fs::canonicalize(temp_dir.path().join("site")).unwrap()
        );
        assert!(config.web_root.is_absolute());
    }

    #[test]
    fn test_persisted_paths_resolve_against_config_directory() {
        let project = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        std::fs::create_dir(project.path().join("site")).unwrap();
        std::fs::create_dir(cwd.path().join("site")).unwrap();
        let path = project.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            "WebRoot = \"site\"\nCertFile = \"tls/cert.pem\"\nKeyFile = \"tls/key.pem\"\n",
        )
        .unwrap();
        let persisted = SettingsLayer::load_file(&path).unwrap();

        let config = resolve(
            &SettingsLayer::defaults(),
            &persisted,
            &SettingsLayer::new(),
            cwd.path(),
        );

        assert_eq!(
            config.web_root,
            std::fs::canonicalize(project.path().join("site")).unwrap()
        );
        assert_eq!(config.cert_file, Some(project.path().join("tls/cert.pem")));
        assert_eq!(config.key_file, Some(project.path().join("tls/key.pem")));
    }

    #[test]
    fn test_environment_paths_resolve_against_cwd() {
        let project = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        let persisted = SettingsLayer::from_pairs([("KeyFile", "key.pem")])
            .with_base_dir(project.path());
        let env = SettingsLayer::from_pairs([("CertFile", "cert.pem")]);

        let config = resolve(&SettingsLayer::defaults(), &persisted, &env, cwd.path());

        assert_eq!(config.cert_file, Some(cwd.path().join("cert.pem")));
        assert_eq!(config.key_file, Some(project.path().join("key.pem")));
    }

    #[test]
    fn test_missing_web_root_falls_back_to_cwd() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = SettingsLayer::from_pairs([("WebRoot", "does-not-exist")]);

        let config = resolve_with(&env, temp_dir.path());

        assert_eq!(
            config.web_root,
            std::fs::canonicalize(temp_dir.path()).unwrap()
        );
    }

    #[test]
    fn test_empty_lists_fall_back_to_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = SettingsLayer::from_pairs([("Extensions", " ; "), ("DefaultFiles", "")]);

        let config = resolve_with(&env, temp_dir.path());

        assert_eq!(
            config.watched_extensions,
            vec![".css", ".js", ".htm", ".html"]
        );
        assert_eq!(config.default_file_names[0], "index.html");
    }

    #[test]
    fn test_renderer_adds_extension_to_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = SettingsLayer::from_pairs([("UseRenderer", "yes")]);

        let config = resolve_with(&env, temp_dir.path());

        assert!(config.renderer_enabled);
        assert_eq!(
            config.watched_extensions,
            vec![".rhtml", ".css", ".js", ".htm", ".html"]
        );
    }

    #[test]
    fn test_legacy_renderer_alias() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = SettingsLayer::from_pairs([("UseRazor", "1")]);

        let config = resolve_with(&env, temp_dir.path());

        assert!(config.renderer_enabled);
    }

    #[test]
    fn test_explicit_extensions_are_not_extended() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = SettingsLayer::from_pairs([("UseRenderer", "true"), ("Extensions", ".css")]);

        let config = resolve_with(&env, temp_dir.path());

        assert_eq!(config.watched_extensions, vec![".css"]);
    }

    #[test]
    fn test_tls_site_url() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = SettingsLayer::from_pairs([
            ("UseSsl", "TRUE"),
            ("Port", "5443"),
            ("CertFile", "cert.pem"),
        ]);

        let config = resolve_with(&env, temp_dir.path());

        assert!(config.use_tls);
        assert_eq!(config.site_url(), "https://localhost:5443");
        assert_eq!(config.cert_file, Some(temp_dir.path().join("cert.pem")));
        assert_eq!(config.key_file, None);
    }

    #[test]
    fn test_bind_address() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = SettingsLayer::from_pairs([("Host", "::1"), ("Port", "8000")]);

        let config = resolve_with(&env, temp_dir.path());

        assert_eq!(config.bind_address(), "[::1]:8000");
        assert_eq!(config.site_url(), "http://localhost:8000");
    }

    #[test]
    fn test_debounce_setting() {
        let temp_dir = tempfile::tempdir().unwrap();
        let env = SettingsLayer::from_pairs([("DebounceMs", "50")]);
        assert_eq!(
            resolve_with(&env, temp_dir.path()).debounce,
            Duration::from_millis(50)
        );

        let env = SettingsLayer::from_pairs([("DebounceMs", "soon")]);
        assert_eq!(
            resolve_with(&env, temp_dir.path()).debounce,
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_discover_config_file_in_parent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILENAME), "Port = 6000\n").unwrap();

        let found = discover_config_file(&nested);

        assert_eq!(found, Some(temp_dir.path().join(CONFIG_FILENAME)));
    }
}
