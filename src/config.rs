use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;

const BYTES_PER_MB: usize = 1024 * 1024;

fn default_max_file_size() -> usize {
    // 200 MB in bytes
    200 * BYTES_PER_MB
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Uploads above this many bytes are rejected before parsing.
    pub max_file_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let bind_addr = match std::env::var("QDS_BIND_ADDR") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("QDS_BIND_ADDR is not a socket address: {}", raw))?,
            Err(_) => default_bind_addr(),
        };

        let max_file_size = match std::env::var("QDS_MAX_UPLOAD_MB") {
            Ok(raw) => parse_upload_limit(&raw)?,
            Err(_) => default_max_file_size(),
        };

        Ok(Config {
            bind_addr,
            max_file_size,
        })
    }
}

pub fn load_config() -> Result<Config> {
    let config = Config::new()?;
    tracing::info!(
        "Configuration loaded: bind_addr={}, max_file_size={} MB",
        config.bind_addr,
        config.max_file_size / BYTES_PER_MB
    );
    Ok(config)
}

fn parse_upload_limit(raw: &str) -> Result<usize> {
    let mb: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("QDS_MAX_UPLOAD_MB must be a whole number of megabytes, got {:?}", raw))?;
    if mb == 0 {
        anyhow::bail!("QDS_MAX_UPLOAD_MB must be greater than zero");
    }
    mb.checked_mul(BYTES_PER_MB)
        .context("QDS_MAX_UPLOAD_MB is too large")
}
