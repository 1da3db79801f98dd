//! Server command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use lrs_config::{SettingsLayer, discover_config_file, keys, resolve_layers};
use lrs_extensions::LoadStatus;
use lrs_server::LiveReloadServer;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the server.
///
/// Every flag is optional and only overrides lower settings layers when given.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover livereload.toml).
    #[arg(short, long, env = "LIVERELOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory to serve (default: current directory).
    #[arg(short, long)]
    web_root: Option<PathBuf>,

    /// Host to bind to.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (invalid values fall back to the default).
    #[arg(short, long)]
    port: Option<String>,

    /// Serve over HTTPS.
    #[arg(long)]
    use_ssl: bool,

    /// PEM certificate for HTTPS.
    #[arg(long)]
    cert_file: Option<PathBuf>,

    /// PEM private key for HTTPS.
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Enable live reload: true, 1 or yes (default: enabled).
    #[arg(long)]
    live_reload: Option<String>,

    /// Disable live reload.
    #[arg(long, conflicts_with = "live_reload")]
    no_live_reload: bool,

    /// Watched extensions, e.g. ".css,.js,.html".
    #[arg(long)]
    extensions: Option<String>,

    /// Default documents, e.g. "index.html,default.htm".
    #[arg(long)]
    default_files: Option<String>,

    /// Log every request URL.
    #[arg(long)]
    show_urls: bool,

    /// Open a browser on start.
    #[arg(long)]
    open_browser: bool,

    /// Route renderer pages through the renderer.
    #[arg(long)]
    use_renderer: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Run the server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or TLS material cannot
    /// be loaded.
    pub(crate) async fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();
        let cwd = std::env::current_dir()?;

        let persisted = self.load_persisted(&cwd, &output);
        let environment = SettingsLayer::from_env();
        let overrides = self.overrides();
        let config = resolve_layers(
            &[&SettingsLayer::defaults(), &persisted, &environment, &overrides],
            &cwd,
        );

        let server = LiveReloadServer::new(config);
        print_startup_report(&output, &server, version);

        server.run().await?;
        Ok(())
    }

    /// Load the explicit or discovered `livereload.toml`.
    ///
    /// A broken file is reported and ignored.
    fn load_persisted(&self, cwd: &Path, output: &Output) -> SettingsLayer {
        let Some(path) = self.config.clone().or_else(|| discover_config_file(cwd)) else {
            return SettingsLayer::new();
        };

        match SettingsLayer::load_file(&path) {
            Ok(layer) => {
                tracing::info!(path = %path.display(), "Loaded configuration file");
                layer
            }
            Err(err) => {
                output.warning(&format!("Ignoring {}: {err}", path.display()));
                SettingsLayer::new()
            }
        }
    }

    /// Settings given on the command line.
    fn overrides(&self) -> SettingsLayer {
        let mut layer = SettingsLayer::new();

        if let Some(web_root) = &self.web_root {
            layer.set(keys::WEB_ROOT, web_root.to_string_lossy());
        }
        if let Some(host) = &self.host {
            layer.set(keys::HOST, host.as_str());
        }
        if let Some(port) = &self.port {
            layer.set(keys::PORT, port.as_str());
        }
        if let Some(cert_file) = &self.cert_file {
            layer.set(keys::CERT_FILE, cert_file.to_string_lossy());
        }
        if let Some(key_file) = &self.key_file {
            layer.set(keys::KEY_FILE, key_file.to_string_lossy());
        }
        if self.no_live_reload {
            layer.set(keys::LIVE_RELOAD_ENABLED, "false");
        } else if let Some(live_reload) = &self.live_reload {
            layer.set(keys::LIVE_RELOAD_ENABLED, live_reload.as_str());
        }
        if let Some(extensions) = &self.extensions {
            layer.set(keys::EXTENSIONS, extensions.as_str());
        }
        if let Some(default_files) = &self.default_files {
            layer.set(keys::DEFAULT_FILES, default_files.as_str());
        }

        for (enabled, key) in [
            (self.use_ssl, keys::USE_SSL),
            (self.show_urls, keys::SHOW_URLS),
            (self.open_browser, keys::OPEN_BROWSER),
            (self.use_renderer, keys::USE_RENDERER),
        ] {
            if enabled {
                layer.set(key, "true");
            }
        }

        layer
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

/// Print the startup summary.
fn print_startup_report(output: &Output, server: &LiveReloadServer, version: &str) {
    let config = server.config();
    let url = config.site_url();

    output.separator();
    output.highlight(&format!("Live Reload Server v{version}"));
    output.separator();
    output.labeled_success("Site Url     : ", &url);
    output.info(&format!("Web Root     : {}", config.web_root.display()));
    output.info(&format!(
        "Extensions   : {}",
        config.watched_extensions.join(",")
    ));
    output.info(&format!("Live Reload  : {}", on_off(config.live_reload_enabled)));
    output.info(&format!("Use Renderer : {}", on_off(config.renderer_enabled)));
    output.info(&format!("Show Urls    : {}", on_off(config.show_request_urls)));
    output.info(&format!("Open Browser : {}", on_off(config.open_browser_on_start)));
    output.info(&format!(
        "Default Pages: {}",
        config.default_file_names.join(",")
    ));

    for unit in server.extension_units() {
        match &unit.status {
            LoadStatus::Loaded { .. } => {
                output.success(&format!("Loaded extension: {}", unit.path.display()));
            }
            LoadStatus::Failed { message } => {
                output.error(&format!(
                    "Failed to load extension {}: {message}",
                    unit.path.display()
                ));
            }
        }
    }

    output.info("");
    output.info("'lrs --help' for start options...");
    output.info("Ctrl-C to exit...");
    output.separator();

    if config.open_browser_on_start {
        output.info(&format!("Open {url} in your browser"));
    }
}
