//! Core library for the `weather-etl` tool.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - A rate-limited, retrying client for the upstream weather API
//! - Typed API errors with structured details
//! - The One Call weather provider
//! - CSV extraction, merging and SQLite storage of daily weather rows
//!
//! It is used by `weather-etl`, but can also be reused by other binaries or services.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod etl;
pub mod model;
pub mod provider;
pub mod rate_limit;
pub mod transport;

pub use client::{ApiClient, ApiModel, ApiRequest, ApiTarget};
pub use config::{Config, QualityBounds};
pub use error::{ApiError, ErrorDetail, FieldError, PipelineError};
pub use etl::{Pipeline, PipelineReport};
pub use model::{ApiWeather, Coordinates, CsvWeather, Paginated, Units, WeatherQuery, WeatherRecord};
pub use provider::{WeatherProvider, provider_from_config};
pub use rate_limit::{RateLimit, RateLimiter};
