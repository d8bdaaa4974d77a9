use serde::{Deserialize, Serialize};
use std::fmt;

pub mod api;
pub mod files;
pub mod record;

pub use api::ApiWeather;
pub use files::CsvWeather;
pub use record::WeatherRecord;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    lat: f64,
    lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" => Ok(Units::Standard),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial, standard."
            )),
        }
    }
}

/// What to ask the weather provider for. Missing coordinates fall back to
/// the configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeatherQuery {
    pub coordinates: Option<Coordinates>,
    pub units: Units,
}

/// Paging block some endpoints attach to list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PageMeta {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_are_range_checked() {
        assert!(Coordinates::new(90.0, -180.0).is_ok());
        assert_eq!(Coordinates::new(90.5, 0.0), Err(CoordinateError::Latitude(90.5)));
        assert_eq!(Coordinates::new(0.0, 181.0), Err(CoordinateError::Longitude(181.0)));
    }

    #[test]
    fn units_roundtrip_through_str() {
        for units in [Units::Metric, Units::Imperial, Units::Standard] {
            assert_eq!(Units::try_from(units.as_str()).expect("known units"), units);
        }
        assert!(Units::try_from("kelvin").is_err());
        assert_eq!(Units::default(), Units::Metric);
    }
}
