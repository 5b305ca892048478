use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use brain_intake_core::DEFAULT_MAX_BRAIN_SIZE;

#[derive(Debug, Clone)]
pub struct UploadApiConfig {
    pub server_host: String,
    pub server_port: u16,
    /// Directory holding the document and notification databases.
    pub data_dir: PathBuf,
    /// Per-user capacity in bytes.
    pub max_brain_size: f64,
    /// Largest request body accepted on the upload routes.
    pub max_upload_bytes: usize,
    pub broker_url: String,
    pub result_backend_url: String,
    pub filter_service_url: String,
    pub filter_timeout_secs: u64,
    /// HS256 shared secret for bearer tokens.
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub log_level: String,
}

impl Default for UploadApiConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 5050,
            data_dir: PathBuf::from("data/intake"),
            max_brain_size: DEFAULT_MAX_BRAIN_SIZE,
            max_upload_bytes: 52_428_800,
            broker_url: "sqlite://data/intake/broker.db".to_string(),
            result_backend_url: "sqlite://data/intake/results.db".to_string(),
            filter_service_url: "http://127.0.0.1:5060".to_string(),
            filter_timeout_secs: 300,
            jwt_secret: String::new(),
            jwt_issuer: None,
            jwt_audience: None,
            log_level: "info".to_string(),
        }
    }
}

impl UploadApiConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(host) = env::var("UPLOAD_API_HOST") {
            cfg.server_host = host;
        }
        if let Ok(port) = env::var("UPLOAD_API_PORT") {
            cfg.server_port = port
                .parse()
                .context("UPLOAD_API_PORT must be a valid u16")?;
        }
        if let Ok(dir) = env::var("INTAKE_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(size) = env::var("MAX_BRAIN_SIZE") {
            cfg.max_brain_size = size
                .parse()
                .context("MAX_BRAIN_SIZE must be a number of bytes")?;
        }
        if let Ok(limit) = env::var("MAX_UPLOAD_BYTES") {
            cfg.max_upload_bytes = limit
                .parse()
                .context("MAX_UPLOAD_BYTES must be a positive integer")?;
        }
        if let Ok(url) = env::var("INTAKE_BROKER_URL") {
            cfg.broker_url = url;
        }
        if let Ok(url) = env::var("INTAKE_RESULT_BACKEND") {
            cfg.result_backend_url = url;
        }
        if let Ok(url) = env::var("FILTER_SERVICE_URL") {
            cfg.filter_service_url = url;
        }
        if let Ok(timeout) = env::var("FILTER_TIMEOUT_SECS") {
            cfg.filter_timeout_secs = timeout
                .parse()
                .context("FILTER_TIMEOUT_SECS must be a positive integer")?;
        }
        cfg.jwt_secret = env::var("JWT_SECRET_KEY").context("JWT_SECRET_KEY must be set")?;
        cfg.jwt_issuer = env::var("JWT_ISSUER").ok();
        cfg.jwt_audience = env::var("JWT_AUDIENCE").ok();
        if let Ok(level) = env::var("LOG_LEVEL") {
            cfg.log_level = level;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_directory(&self.data_dir)?;

        if !self.max_brain_size.is_finite() || self.max_brain_size <= 0.0 {
            anyhow::bail!("MAX_BRAIN_SIZE must be greater than zero");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("MAX_UPLOAD_BYTES must be greater than zero");
        }
        if self.broker_url.trim().is_empty() {
            anyhow::bail!("INTAKE_BROKER_URL cannot be empty");
        }
        if self.result_backend_url.trim().is_empty() {
            anyhow::bail!("INTAKE_RESULT_BACKEND cannot be empty");
        }
        if self.filter_service_url.trim().is_empty() {
            anyhow::bail!("FILTER_SERVICE_URL cannot be empty");
        }
        if self.filter_timeout_secs == 0 {
            anyhow::bail!("FILTER_TIMEOUT_SECS must be greater than zero");
        }
        if self.jwt_secret.is_empty() {
            anyhow::bail!("JWT_SECRET_KEY cannot be empty");
        }

        Ok(())
    }

    pub fn filter_timeout(&self) -> Duration {
        Duration::from_secs(self.filter_timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("{} exists but is not a directory", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("unable to create data directory {}", path.display()))?;
    }
    Ok(())
}
