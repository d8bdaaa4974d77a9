use crate::{
    Config,
    client::ApiClient,
    error::ApiError,
    model::{ApiWeather, WeatherQuery},
    provider::openweather::OneCallProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn get_weather(&self, query: &WeatherQuery) -> Result<ApiWeather, ApiError>;
}

/// Construct the One Call provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    config.validate()?;

    let client = ApiClient::from_config(config)?;
    let provider = OneCallProvider::new(
        client,
        config.api.path_parameter.clone(),
        config.default_coordinates()?,
    );

    Ok(Box::new(provider))
}
