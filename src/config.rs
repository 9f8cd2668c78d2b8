use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::validation::validate_config;

pub const DEFAULT_BINARY: &str = "wrangler dev";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_MESSAGE_BUFFER: usize = 20;

/// Load the launcher config from `path`, falling back to defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<LauncherConfig> {
    let config = if path.exists() {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("{}: {}", path.display(), e)))?;
        parse_config(&content)?
    } else {
        log::info!("No config at {}, using defaults", path.display());
        LauncherConfig::default()
    };
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<LauncherConfig> {
    toml::from_str(content).map_err(|e| AppError::config(e.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LauncherConfig {
    /// Command used to launch the dev server; split on whitespace.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Log every output line of the dev server.
    #[serde(default)]
    pub verbose: bool,
    /// Number of recent output lines kept in memory.
    #[serde(default = "default_message_buffer")]
    pub message_buffer: usize,
    #[serde(default)]
    pub on_ready_commands: Vec<String>,
    #[serde(default)]
    pub on_stop_commands: Vec<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dev: DevOptions,
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

fn default_message_buffer() -> usize {
    DEFAULT_MESSAGE_BUFFER
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            verbose: false,
            message_buffer: DEFAULT_MESSAGE_BUFFER,
            on_ready_commands: Vec::new(),
            on_stop_commands: Vec::new(),
            server: ServerConfig::default(),
            dev: DevOptions::default(),
        }
    }
}

/// Coordinates of the pool server that multiplexes instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_pool_id")]
    pub pool_id: u32,
}

fn default_server_host() -> String {
    "http://127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_pool_id() -> u32 {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: DEFAULT_PORT,
            pool_id: default_pool_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Log,
    Warn,
    Error,
    None,
}

/// Options passed to the dev server as `--<kebab-key>` flags.
///
/// Field order is the order flags are emitted in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DevOptions {
    /// Name of the worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Date to use for compatibility checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_flags: Option<Vec<String>>,
    /// Use the latest version of the worker runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<bool>,
    /// Static assets to be served
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    /// Skip internal build steps and directly deploy the script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_bundle: Option<bool>,
    /// IP address to listen on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Port for devtools to connect to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspector_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<String>>,
    /// Host to forward requests to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_protocol: Option<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_key_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_cert_path: Option<String>,
    /// Host to act as origin in local mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_upstream: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_protocol: Option<Protocol>,
    /// `KEY:VALUE` pairs injected into the script as variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var: Option<Vec<String>>,
    /// `KEY:VALUE` pairs substituted in the script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub define: Option<Vec<String>>,
    /// Module pairs substituted in the script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsx_factory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsx_fragment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tsconfig: Option<String>,
    /// Run on the global network with access to production resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_compat: Option<bool>,
    /// Directory used for local persistence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_reload: Option<bool>,
    /// Test scheduled events by visiting /__scheduled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_scheduled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_interactive_dev_session: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental_dev_env: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental_registry: Option<bool>,
}

impl DevOptions {
    /// Host the instance is reachable on.
    pub fn effective_host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Copy of these options with the port replaced.
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port: Some(port),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = parse_config(
            r#"
binary = "npx wrangler dev"
verbose = true
on_ready_commands = ["curl http://localhost:{PORT}/__scheduled"]

[server]
pool_id = 3

[dev]
port = 9787
compatibility-date = "2024-09-01"
var = ["A:1", "B:2"]
local-protocol = "https"
node-compat = true
"#,
        )
        .unwrap();

        assert_eq!(config.binary, "npx wrangler dev");
        assert!(config.verbose);
        assert_eq!(config.server.pool_id, 3);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.dev.port, Some(9787));
        assert_eq!(config.dev.local_protocol, Some(Protocol::Https));
        assert_eq!(
            config.dev.var,
            Some(vec!["A:1".to_string(), "B:2".to_string()])
        );
        assert_eq!(config.message_buffer, DEFAULT_MESSAGE_BUFFER);
    }

    #[test]
    fn rejects_unknown_dev_option() {
        let err = parse_config("[dev]\nnot-a-flag = true\n").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn defaults_for_host_and_port() {
        let options = DevOptions::default();
        assert_eq!(options.effective_host(), "localhost");
        assert_eq!(options.effective_port(), 8787);
        assert_eq!(options.with_port(9000).effective_port(), 9000);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.binary, DEFAULT_BINARY);
        assert!(config.on_ready_commands.is_empty());
    }

    #[test]
    fn invalid_file_is_rejected_by_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.toml");
        std::fs::write(&path, "binary = \"   \"\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
