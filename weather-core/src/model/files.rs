//! Rows of the historical weather CSV.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;

use crate::config::QualityBounds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CsvWeather {
    pub date: NaiveDate,
    #[serde(deserialize_with = "text")]
    pub location: String,
    pub min_temp: f64,
    pub max_temp: f64,
    /// Millimetres.
    pub rainfall: f64,
    pub evaporation: f64,
    /// Hours.
    pub sunshine: f64,
    #[serde(deserialize_with = "text")]
    pub wind_gust_dir: String,
    /// km/h
    pub wind_gust_speed: u32,
    #[serde(deserialize_with = "text")]
    pub wind_dir_9am: String,
    #[serde(deserialize_with = "text")]
    pub wind_dir_3pm: String,
    pub wind_speed_9am: u32,
    pub wind_speed_3pm: u32,
    pub humidity_9am: u32,
    pub humidity_3pm: u32,
    /// hPa
    pub pressure_9am: f64,
    pub pressure_3pm: f64,
    /// Octas.
    pub cloud_9am: u32,
    pub cloud_3pm: u32,
    pub temp_9am: f64,
    pub temp_3pm: f64,
    #[serde(deserialize_with = "text")]
    pub rain_today: String,
    #[serde(deserialize_with = "text")]
    pub rain_tomorrow: String,
}

impl CsvWeather {
    /// Check the row against `bounds`. `today` is exclusive: records must
    /// describe a day that is already over.
    pub fn validate(&self, bounds: &QualityBounds, today: NaiveDate) -> Result<(), String> {
        if self.date >= today {
            return Err(format!("date {} is not in the past", self.date));
        }

        let temp_range = bounds.lowest_temp..=bounds.highest_temp;
        for (name, value) in [
            ("MinTemp", self.min_temp),
            ("MaxTemp", self.max_temp),
            ("Temp9am", self.temp_9am),
            ("Temp3pm", self.temp_3pm),
        ] {
            if !temp_range.contains(&value) {
                return Err(format!("{name} {value} is outside {temp_range:?}"));
            }
        }

        for (name, value, ceiling) in [
            ("Rainfall", self.rainfall, bounds.highest_rain_depth),
            ("Evaporation", self.evaporation, bounds.highest_evaporation),
            ("Sunshine", self.sunshine, bounds.highest_sunshine),
        ] {
            if !(0.0..=ceiling).contains(&value) {
                return Err(format!("{name} {value} is outside 0..={ceiling}"));
            }
        }

        if self.wind_gust_speed == 0 {
            return Err("WindGustSpeed must be positive".to_string());
        }
        for (name, value) in [
            ("WindGustSpeed", self.wind_gust_speed),
            ("WindSpeed9am", self.wind_speed_9am),
            ("WindSpeed3pm", self.wind_speed_3pm),
        ] {
            if value > bounds.highest_wind_speed {
                return Err(format!("{name} {value} exceeds {}", bounds.highest_wind_speed));
            }
        }

        let humidity_range = bounds.lowest_humidity..=bounds.highest_humidity;
        let humidity = [("Humidity9am", self.humidity_9am), ("Humidity3pm", self.humidity_3pm)];
        for (name, value) in humidity {
            if !humidity_range.contains(&value) {
                return Err(format!("{name} {value} is outside {humidity_range:?}"));
            }
        }

        let pressure_range = bounds.lowest_pressure..=bounds.highest_pressure;
        let pressure = [("Pressure9am", self.pressure_9am), ("Pressure3pm", self.pressure_3pm)];
        for (name, value) in pressure {
            if !pressure_range.contains(&value) {
                return Err(format!("{name} {value} is outside {pressure_range:?}"));
            }
        }

        for (name, value) in [("Cloud9am", self.cloud_9am), ("Cloud3pm", self.cloud_3pm)] {
            if value > bounds.highest_cloud_scale {
                return Err(format!("{name} {value} exceeds {}", bounds.highest_cloud_scale));
            }
        }

        if self.min_temp > self.max_temp {
            return Err(format!("MinTemp {} is above MaxTemp {}", self.min_temp, self.max_temp));
        }

        Ok(())
    }
}

/// Text columns can arrive as numbers once cells have been typed.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(D::Error::custom(format!("expected text, found {other}"))),
    }
}
