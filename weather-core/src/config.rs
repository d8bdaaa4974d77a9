use anyhow::{Context, Result, anyhow, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    model::Coordinates,
    rate_limit::RateLimit,
    transport::{RetryPolicy, http::PoolOptions},
};

/// Environment variable that takes precedence over `api.api_key`.
pub const API_KEY_ENV: &str = "WEATHER_API_KEY";

/// Upstream endpoint pieces. The final URL is
/// `{url}{endpoint}{id_path_parameter}{api_key}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    /// Placed between latitude and longitude when building the endpoint.
    pub path_parameter: String,
    /// Placed between the endpoint and the API key.
    pub id_path_parameter: String,
    pub api_key: String,
    pub default_lat: f64,
    pub default_lon: f64,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openweathermap.org/data/3.0/onecall?lat=".to_string(),
            path_parameter: "&lon=".to_string(),
            id_path_parameter: "&appid=".to_string(),
            api_key: String::new(),
            default_lat: -33.8688,
            default_lon: 151.2093,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub threshold: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { threshold: 120, window_secs: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Seconds; multiplied by `2^attempt`.
    pub backoff_factor: f64,
    pub backoff_max_secs: u64,
    pub status_forcelist: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 0.5,
            backoff_max_secs: 60,
            status_forcelist: vec![429, 502, 503, 504],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub connections: usize,
    pub maxsize: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { connections: 10, maxsize: 20 }
    }
}

/// Plausible ranges for observed values. Rows outside them are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityBounds {
    pub lowest_temp: f64,
    pub highest_temp: f64,
    pub highest_rain_depth: f64,
    pub lowest_humidity: u32,
    pub highest_humidity: u32,
    pub highest_evaporation: f64,
    pub highest_sunshine: f64,
    pub highest_wind_speed: u32,
    pub lowest_pressure: f64,
    pub highest_pressure: f64,
    pub highest_cloud_scale: u32,
    pub highest_cloudiness_pct: u32,
    pub highest_wind_degrees: u32,
}

impl Default for QualityBounds {
    fn default() -> Self {
        Self {
            lowest_temp: -50.0,
            highest_temp: 60.0,
            highest_rain_depth: 500.0,
            lowest_humidity: 0,
            highest_humidity: 100,
            highest_evaporation: 200.0,
            highest_sunshine: 24.0,
            highest_wind_speed: 200,
            lowest_pressure: 870.0,
            highest_pressure: 1090.0,
            highest_cloud_scale: 9,
            highest_cloudiness_pct: 100,
            highest_wind_degrees: 360,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://weather.db?mode=rwc".to_string(), max_connections: 5 }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [api]
/// api_key = "..."
/// default_lat = -33.86
///
/// [rate_limit]
/// threshold = 60
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub pool: PoolConfig,
    pub quality: QualityBounds,
    pub database: DatabaseConfig,
}

impl Config {
    /// Load config from the platform config directory, or return defaults if
    /// it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_or_default(&Self::config_file_path()?)
    }

    /// Like [`Config::load_from`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, fall back to defaults plus env.
            let mut cfg = Self::default();
            cfg.apply_env();
            return Ok(cfg);
        }
        Self::load_from(path)
    }

    /// Load config from an explicit file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut cfg = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        cfg.apply_env();

        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid configuration TOML")
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-pipeline", "weather-etl")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api.api_key = key.trim().to_string();
            }
        }
    }

    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.api.url.trim().is_empty(), "api.url must not be empty");
        ensure!(
            !self.api.api_key.trim().is_empty(),
            "No API key configured.\n\
             Hint: run `weather-etl configure` or set {API_KEY_ENV}."
        );
        self.default_coordinates()?;
        ensure!(self.rate_limit.threshold > 0, "rate_limit.threshold must be positive");
        ensure!(self.rate_limit.window_secs > 0, "rate_limit.window_secs must be positive");
        ensure!(self.retry.max_attempts > 0, "retry.max_attempts must be positive");
        ensure!(
            self.retry.backoff_factor.is_finite() && self.retry.backoff_factor > 0.0,
            "retry.backoff_factor must be a positive number of seconds"
        );
        ensure!(
            self.retry.backoff_factor <= self.retry.backoff_max_secs as f64,
            "retry.backoff_factor must not exceed retry.backoff_max_secs"
        );
        ensure!(self.pool.connections > 0 && self.pool.maxsize > 0, "pool sizes must be positive");

        let q = &self.quality;
        ensure!(q.lowest_temp < q.highest_temp, "quality.lowest_temp must be below highest_temp");
        ensure!(
            q.lowest_humidity < q.highest_humidity,
            "quality.lowest_humidity must be below highest_humidity"
        );
        ensure!(
            q.lowest_pressure < q.highest_pressure,
            "quality.lowest_pressure must be below highest_pressure"
        );

        Ok(())
    }

    pub fn default_coordinates(&self) -> Result<Coordinates> {
        Coordinates::new(self.api.default_lat, self.api.default_lon)
            .context("Invalid default coordinates in [api]")
    }

    pub fn rate_limit(&self) -> RateLimit {
        RateLimit {
            threshold: self.rate_limit.threshold,
            window: Duration::from_secs(self.rate_limit.window_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff_max = Duration::from_secs(self.retry.backoff_max_secs);
        // Factors too large for `Duration` collapse to the ceiling.
        let backoff_factor = Duration::try_from_secs_f64(self.retry.backoff_factor.max(0.0))
            .map_or(backoff_max, |factor| factor.min(backoff_max));

        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff_factor,
            backoff_max,
            retry_statuses: self.retry.status_forcelist.clone(),
        }
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            pool_connections: self.pool.connections,
            pool_maxsize: self.pool.maxsize,
            timeout: Duration::from_secs(self.api.timeout_secs),
        }
    }
}
