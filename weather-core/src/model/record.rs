use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the `weather` table: the historical CSV day merged with the
/// current API reading. `date` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub min_temp: f64,
    pub max_temp: f64,
    pub rainfall: f64,
    pub humidity_9am: u32,
    pub humidity_3pm: u32,
    pub temp_9am: f64,
    pub temp_3pm: f64,
    pub current_temp: f64,
    pub current_humidity: u32,
    pub current_weather_description: String,
}
