use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use brain_intake_core::DEFAULT_MAX_BRAIN_SIZE;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub data_dir: PathBuf,
    pub max_brain_size: f64,
    pub broker_url: String,
    pub result_backend_url: String,
    pub filter_service_url: String,
    pub filter_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Jobs claimed and run together per poll.
    pub concurrency: usize,
    /// Apply the brain quota to queued jobs as well as synchronous uploads.
    pub enforce_job_quota: bool,
    pub crawl_timeout_secs: u64,
    /// Largest page body a crawl will download.
    pub max_crawl_bytes: u64,
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/intake"),
            max_brain_size: DEFAULT_MAX_BRAIN_SIZE,
            broker_url: "sqlite://data/intake/broker.db".to_string(),
            result_backend_url: "sqlite://data/intake/results.db".to_string(),
            filter_service_url: "http://127.0.0.1:5060".to_string(),
            filter_timeout_secs: 300,
            poll_interval_ms: 1000,
            concurrency: 4,
            enforce_job_quota: true,
            crawl_timeout_secs: 30,
            max_crawl_bytes: DEFAULT_MAX_BRAIN_SIZE as u64,
            log_level: "info".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(dir) = env::var("INTAKE_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(size) = env::var("MAX_BRAIN_SIZE") {
            cfg.max_brain_size = size
                .parse()
                .context("MAX_BRAIN_SIZE must be a number of bytes")?;
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
        if let Ok(interval) = env::var("WORKER_POLL_INTERVAL_MS") {
            cfg.poll_interval_ms = interval
                .parse()
                .context("WORKER_POLL_INTERVAL_MS must be a positive integer")?;
        }
        if let Ok(concurrency) = env::var("WORKER_CONCURRENCY") {
            cfg.concurrency = concurrency
                .parse()
                .context("WORKER_CONCURRENCY must be a positive integer")?;
        }
        if let Ok(flag) = env::var("ENFORCE_JOB_QUOTA") {
            cfg.enforce_job_quota = parse_bool(&flag)
                .with_context(|| format!("ENFORCE_JOB_QUOTA is invalid: {flag}"))?;
        }
        if let Ok(timeout) = env::var("CRAWL_TIMEOUT_SECS") {
            cfg.crawl_timeout_secs = timeout
                .parse()
                .context("CRAWL_TIMEOUT_SECS must be a positive integer")?;
        }
        match env::var("MAX_CRAWL_BYTES") {
            Ok(limit) => {
                cfg.max_crawl_bytes = limit
                    .parse()
                    .context("MAX_CRAWL_BYTES must be a positive integer")?;
            }
            // No page can fit a brain larger than the brain itself.
            Err(_) => cfg.max_crawl_bytes = cfg.max_brain_size as u64,
        }
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
        if self.poll_interval_ms == 0 {
            anyhow::bail!("WORKER_POLL_INTERVAL_MS must be greater than zero");
        }
        if self.concurrency == 0 {
            anyhow::bail!("WORKER_CONCURRENCY must be greater than zero");
        }
        if self.crawl_timeout_secs == 0 {
            anyhow::bail!("CRAWL_TIMEOUT_SECS must be greater than zero");
        }
        if self.max_crawl_bytes == 0 {
            anyhow::bail!("MAX_CRAWL_BYTES must be greater than zero");
        }

        Ok(())
    }

    pub fn filter_timeout(&self) -> Duration {
        Duration::from_secs(self.filter_timeout_secs)
    }

    pub fn crawl_timeout(&self) -> Duration {
        Duration::from_secs(self.crawl_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
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

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => anyhow::bail!("invalid boolean value {value}"),
    }
}
