use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::mcp::dispatcher::{DEFAULT_FEATURES, DEFAULT_VERSION, ServerInfo};

/// Config file picked up from the working directory when `--config` is absent.
const CWD_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Remote MCP endpoint used as the preferred path for delegated tools
    #[arg(long, env = "MCP_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub protocol: ProtocolConfig,
    pub remote: RemoteConfig,
    pub sessions: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProtocolConfig {
    pub version: String,
    pub features: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default)]
    pub url: Option<String>,
    pub list_timeout_secs: u64,
    pub call_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Unset: sessions live for the whole process.
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Priority: CLI flag > CLI env var > `URS_` env > config file > defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8001)?
            .set_default("server.max_body_bytes", 10 * 1024 * 1024)?
            .set_default("protocol.version", DEFAULT_VERSION)?
            .set_default("protocol.features", DEFAULT_FEATURES.to_vec())?
            .set_default("remote.list_timeout_secs", 10)?
            .set_default("remote.call_timeout_secs", 30)?
            .set_default("sessions.sweep_interval_secs", 60)?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None if Path::new(CWD_CONFIG_FILE).exists() => {
                builder.add_source(File::new(CWD_CONFIG_FILE, FileFormat::Yaml))
            }
            None => builder,
        };

        // E.g. URS_SERVER__PORT=9000
        builder = builder.add_source(
            Environment::with_prefix("URS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(host) = &cli.host {
            builder = builder.set_override("server.host", host.as_str())?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(url) = cli.remote_url.as_deref().filter(|u| !u.trim().is_empty()) {
            builder = builder.set_override("remote.url", url)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            version: self.protocol.version.clone(),
            features: self.protocol.features.clone(),
        }
    }
}

impl RemoteConfig {
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
