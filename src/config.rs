use crate::services::{environment::DEFAULT_LOCATION, progress_board::DEFAULT_RETENTION_SECS};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr, time::Duration};

/// Where uploaded payloads are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    /// Sharded files beneath `storage_dir`.
    Disk,
    /// Process memory; payloads vanish on restart.
    Memory,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageKind,
    pub storage_dir: String,
    pub public_base_url: String,
    pub max_files: usize,
    pub tick_ms: u64,
    pub progress_retention_secs: i64,
    pub max_body_mb: usize,
    pub fallback_latitude: f64,
    pub fallback_longitude: f64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Project file upload service")]
pub struct Args {
    /// Host to bind to (overrides PROJECT_FILES_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PROJECT_FILES_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Payload storage backend (overrides PROJECT_FILES_STORAGE)
    #[arg(long, value_enum)]
    pub storage: Option<StorageKind>,

    /// Directory for disk storage (overrides PROJECT_FILES_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Base URL prefixed to stored payload keys (overrides PROJECT_FILES_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Files allowed per upload batch (overrides PROJECT_FILES_MAX_FILES)
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Delay between simulated progress ticks (overrides PROJECT_FILES_TICK_MS)
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Seconds a finished upload stays on the progress board (overrides PROJECT_FILES_PROGRESS_RETENTION_SECS)
    #[arg(long)]
    pub progress_retention_secs: Option<i64>,

    /// Request body ceiling in megabytes (overrides PROJECT_FILES_MAX_BODY_MB)
    #[arg(long)]
    pub max_body_mb: Option<usize>,

    /// Latitude used when no device location is known (overrides PROJECT_FILES_FALLBACK_LATITUDE)
    #[arg(long, allow_hyphen_values = true)]
    pub fallback_latitude: Option<f64>,

    /// Longitude used when no device location is known (overrides PROJECT_FILES_FALLBACK_LONGITUDE)
    #[arg(long, allow_hyphen_values = true)]
    pub fallback_longitude: Option<f64>,
}

/// Read `name`, falling back to `default` when unset. A value that is set
/// but does not parse is an error.
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse())
    }

    fn merge(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("PROJECT_FILES_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_or("PROJECT_FILES_PORT", 3000u16)?;
        let env_storage = match env::var("PROJECT_FILES_STORAGE") {
            Ok(value) => <StorageKind as ValueEnum>::from_str(value.trim(), true)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("parsing PROJECT_FILES_STORAGE value `{}`", value))?,
            Err(_) => StorageKind::Disk,
        };
        let env_storage_dir =
            env::var("PROJECT_FILES_STORAGE_DIR").unwrap_or_else(|_| "./data/files".into());
        let env_max_files = env_or("PROJECT_FILES_MAX_FILES", 20usize)?;
        let env_tick_ms = env_or("PROJECT_FILES_TICK_MS", 200u64)?;
        let env_retention = env_or("PROJECT_FILES_PROGRESS_RETENTION_SECS", DEFAULT_RETENTION_SECS)?;
        let env_body_mb = env_or("PROJECT_FILES_MAX_BODY_MB", 250usize)?;
        let env_lat = env_or("PROJECT_FILES_FALLBACK_LATITUDE", DEFAULT_LOCATION.latitude)?;
        let env_lon = env_or("PROJECT_FILES_FALLBACK_LONGITUDE", DEFAULT_LOCATION.longitude)?;

        // --- Merge ---
        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_base_url = match args.public_base_url {
            Some(url) => url,
            None => env::var("PROJECT_FILES_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}/blobs", port)),
        };

        let cfg = Self {
            host,
            port,
            storage: args.storage.unwrap_or(env_storage),
            storage_dir: args.storage_dir.unwrap_or(env_storage_dir),
            public_base_url,
            max_files: args.max_files.unwrap_or(env_max_files),
            tick_ms: args.tick_ms.unwrap_or(env_tick_ms),
            progress_retention_secs: args.progress_retention_secs.unwrap_or(env_retention),
            max_body_mb: args.max_body_mb.unwrap_or(env_body_mb),
            fallback_latitude: args.fallback_latitude.unwrap_or(env_lat),
            fallback_longitude: args.fallback_longitude.unwrap_or(env_lon),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            bail!("max_files must be at least 1");
        }
        if self.progress_retention_secs < 0 {
            bail!("progress_retention_secs cannot be negative");
        }
        if !(-90.0..=90.0).contains(&self.fallback_latitude)
            || !(-180.0..=180.0).contains(&self.fallback_longitude)
        {
            bail!(
                "fallback location ({}, {}) is out of range",
                self.fallback_latitude,
                self.fallback_longitude
            );
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_values_win_over_defaults() {
        let cfg = AppConfig::merge(Args {
            port: Some(8088),
            storage: Some(StorageKind::Memory),
            max_files: Some(5),
            fallback_latitude: Some(53.4808),
            fallback_longitude: Some(-2.2426),
            ..Args::default()
        })
        .unwrap();

        assert_eq!(cfg.port, 8088);
        assert_eq!(cfg.storage, StorageKind::Memory);
        assert_eq!(cfg.max_files, 5);
        assert_eq!(cfg.max_body_bytes(), cfg.max_body_mb * 1024 * 1024);
    }

    #[test]
    fn fallback_defaults_to_central_london() {
        let cfg = AppConfig::merge(Args::default()).unwrap();
        assert_eq!(cfg.fallback_latitude, DEFAULT_LOCATION.latitude);
        assert_eq!(cfg.fallback_longitude, DEFAULT_LOCATION.longitude);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let result = AppConfig::merge(Args {
            max_files: Some(0),
            ..Args::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_fallback_is_rejected() {
        let result = AppConfig::merge(Args {
            fallback_latitude: Some(123.0),
            ..Args::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn parses_negative_longitude_flag() {
        let args = Args::try_parse_from(["project-files", "--fallback-longitude", "-3.19"]).unwrap();
        assert_eq!(args.fallback_longitude, Some(-3.19));
    }
}
