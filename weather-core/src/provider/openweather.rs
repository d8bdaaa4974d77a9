use async_trait::async_trait;
use tracing::debug;

use crate::{
    client::{ApiClient, ApiRequest},
    error::ApiError,
    model::{ApiWeather, Coordinates, WeatherQuery},
};

use super::WeatherProvider;

/// OpenWeather One Call endpoint. Coordinates are part of the path, the
/// units go in the query string.
#[derive(Debug)]
pub struct OneCallProvider {
    client: ApiClient,
    path_parameter: String,
    default_location: Coordinates,
}

impl OneCallProvider {
    pub fn new(client: ApiClient, path_parameter: String, default_location: Coordinates) -> Self {
        Self { client, path_parameter, default_location }
    }

    pub fn endpoint(&self, coordinates: Coordinates) -> String {
        format!("{}{}{}", coordinates.lat(), self.path_parameter, coordinates.lon())
    }
}

#[async_trait]
impl WeatherProvider for OneCallProvider {
    async fn get_weather(&self, query: &WeatherQuery) -> Result<ApiWeather, ApiError> {
        let coordinates = query.coordinates.unwrap_or(self.default_location);
        debug!(
            lat = coordinates.lat(),
            lon = coordinates.lon(),
            units = %query.units,
            "fetching weather"
        );

        let request = ApiRequest::get(self.endpoint(coordinates)).query("units", query.units);
        self.client.call(request).await
    }
}
