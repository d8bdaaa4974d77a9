//! Response shape of the One Call weather endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDescription {
    pub id: u32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

/// Volume over the last hour, in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precipitation {
    #[serde(rename = "1h", default, skip_serializing_if = "Option::is_none")]
    pub one_hour: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub dt: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<u64>,
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: u32,
    pub humidity: u32,
    pub dew_point: f64,
    pub uvi: f64,
    /// Cloudiness, percent.
    pub clouds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<u32>,
    pub wind_speed: f64,
    /// Meteorological degrees.
    pub wind_deg: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_gust: Option<f64>,
    #[serde(default)]
    pub weather: Vec<WeatherDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain: Option<Precipitation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snow: Option<Precipitation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinutelyWeather {
    pub dt: u64,
    pub precipitation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyWeather {
    #[serde(flatten)]
    pub conditions: CurrentWeather,
    /// Probability of precipitation, 0..=1.
    pub pop: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTemp {
    pub morn: f64,
    pub day: f64,
    pub eve: f64,
    pub night: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFeelsLike {
    pub morn: f64,
    pub day: f64,
    pub eve: f64,
    pub night: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWeather {
    pub dt: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moonrise: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moonset: Option<u64>,
    pub moon_phase: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub temp: DailyTemp,
    pub feels_like: DailyFeelsLike,
    pub pressure: u32,
    pub humidity: u32,
    pub dew_point: f64,
    pub wind_speed: f64,
    pub wind_deg: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_gust: Option<f64>,
    #[serde(default)]
    pub weather: Vec<WeatherDescription>,
    pub clouds: u32,
    pub pop: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snow: Option<f64>,
    pub uvi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub sender_name: String,
    pub event: String,
    pub start: u64,
    pub end: u64,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiWeather {
    pub lat: f64,
    pub lon: f64,
    pub timezone: String,
    pub timezone_offset: i64,
    pub current: CurrentWeather,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutely: Option<Vec<MinutelyWeather>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<Vec<HourlyWeather>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<Vec<DailyWeather>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<Alert>>,
}

impl ApiWeather {
    /// First textual description of the current conditions, if any.
    pub fn current_description(&self) -> Option<&str> {
        self.current.weather.first().map(|w| w.description.as_str())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    /// A trimmed One Call response. Floats carry a fractional part so the
    /// decoded value serializes back to the same JSON.
    pub(crate) fn one_call() -> Value {
        json!({
            "lat": -33.8688,
            "lon": 151.2093,
            "timezone": "Australia/Sydney",
            "timezone_offset": 36000,
            "current": {
                "dt": 1718000000,
                "sunrise": 1717965000,
                "sunset": 1718001000,
                "temp": 14.5,
                "feels_like": 13.9,
                "pressure": 1019,
                "humidity": 72,
                "dew_point": 9.4,
                "uvi": 0.5,
                "clouds": 40,
                "visibility": 10000,
                "wind_speed": 4.1,
                "wind_deg": 250,
                "weather": [
                    {"id": 802, "main": "Clouds", "description": "scattered clouds", "icon": "03d"}
                ],
                "rain": {"1h": 0.25}
            },
            "hourly": [
                {
                    "dt": 1718003600,
                    "temp": 13.5,
                    "feels_like": 12.8,
                    "pressure": 1019,
                    "humidity": 75,
                    "dew_point": 9.1,
                    "uvi": 0.0,
                    "clouds": 45,
                    "visibility": 10000,
                    "wind_speed": 3.6,
                    "wind_deg": 240,
                    "weather": [
                        {
                            "id": 802,
                            "main": "Clouds",
                            "description": "scattered clouds",
                            "icon": "03n"
                        }
                    ],
                    "pop": 0.1
                }
            ],
            "alerts": [
                {
                    "sender_name": "BOM",
                    "event": "Strong Wind",
                    "start": 1718000000,
                    "end": 1718050000,
                    "description": "Strong winds along the coast",
                    "tags": ["Wind"]
                }
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_and_serializes_back_to_the_same_json() {
        let input = fixtures::one_call();

        let decoded: ApiWeather = serde_json::from_value(input.clone()).expect("valid weather");

        assert_eq!(decoded.current.temp, 14.5);
        assert_eq!(decoded.current.rain, Some(Precipitation { one_hour: Some(0.25) }));
        assert_eq!(decoded.hourly.as_ref().map(Vec::len), Some(1));
        assert_eq!(decoded.current_description(), Some("scattered clouds"));
        assert_eq!(serde_json::to_value(&decoded).expect("serializable"), input);
    }

    #[test]
    fn missing_current_block_is_rejected() {
        let mut input = fixtures::one_call();
        input.as_object_mut().expect("object").remove("current");

        assert!(serde_json::from_value::<ApiWeather>(input).is_err());
    }
}
