use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::storage::chunker::DEFAULT_BLOCK_SIZE;

/// scatterfs storage server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(
    name = "scatterfs",
    version,
    about = "Encrypted scatter-gather file storage server"
)]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "SCATTERFS_PORT", default_value = "1984")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "SCATTERFS_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./scatterfs.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "SCATTERFS_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for the metadata database
    #[arg(long, env = "SCATTERFS_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Comma-separated list of blob-upload endpoint URLs.
    /// Immutable after startup; uploads rotate across them round-robin.
    #[arg(long, env = "SCATTERFS_ENDPOINTS", default_value = "")]
    pub endpoints: String,

    /// Block size in bytes (default 7864320 = 7.5 MiB)
    #[arg(long, env = "SCATTERFS_BLOCK_SIZE", default_value = "7864320")]
    pub block_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1984,
            bind_address: "0.0.0.0".to_string(),
            config: "./scatterfs.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            endpoints: String::new(),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (SCATTERFS_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("SCATTERFS_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    /// The configured endpoint URLs, split out of the comma-separated form.
    pub fn endpoint_list(&self) -> Vec<String> {
        self.endpoints
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# scatterfs Storage Server Configuration
# Place this file at ./scatterfs.toml or specify with --config <path>
# All settings can be overridden via environment variables (SCATTERFS_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 1984)
# port = 1984

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite metadata database
# data_dir = "./data"

# Comma-separated blob-upload endpoint URLs. Required.
# Uploads rotate across them round-robin; the list is immutable after start.
# endpoints = "https://blobs-1.example/upload,https://blobs-2.example/upload"

# Block size in bytes (default: 7864320 = 7.5 MiB)
# Files are split into blocks of this size before encryption and upload.
# block_size = 7864320
"#
    .to_string()
}
