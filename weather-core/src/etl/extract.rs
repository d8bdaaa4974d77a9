use std::path::Path;

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    config::QualityBounds,
    error::PipelineError,
    model::{ApiWeather, CsvWeather, WeatherQuery},
    provider::WeatherProvider,
};

pub async fn extract_api_data(
    provider: &dyn WeatherProvider,
    query: &WeatherQuery,
) -> Result<ApiWeather, PipelineError> {
    let weather = provider.get_weather(query).await?;
    info!(timezone = %weather.timezone, temp = weather.current.temp, "fetched current weather");
    Ok(weather)
}

/// Read every usable row of the CSV at `path`.
///
/// Rows that cannot be parsed or that fail the quality bounds are logged and
/// skipped; only an unreadable file fails the whole extraction.
pub fn extract_csv_data(
    path: &Path,
    bounds: &QualityBounds,
    today: NaiveDate,
) -> Result<Vec<CsvWeather>, PipelineError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (index, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = index + 2;

        let parsed = record
            .map_err(|err| err.to_string())
            .and_then(|record| parse_row(&headers, &record))
            .and_then(|row| row.validate(bounds, today).map(|()| row));

        match parsed {
            Ok(row) => rows.push(row),
            Err(reason) => {
                skipped += 1;
                warn!(line, %reason, "skipping CSV row");
            }
        }
    }

    info!(path = %path.display(), rows = rows.len(), skipped, "read CSV weather data");
    Ok(rows)
}

fn parse_row(
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
) -> Result<CsvWeather, String> {
    let mut fields = Map::new();
    for (name, raw) in headers.iter().zip(record.iter()) {
        fields.insert(name.trim().to_string(), cell_value(raw)?);
    }
    serde_json::from_value(Value::Object(fields)).map_err(|err| err.to_string())
}

/// Largest magnitude below which every integer is an exact `f64`.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Cells that look like `{...}` carry embedded JSON; anything numeric
/// becomes a number; the rest stays text.
fn cell_value(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();

    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed)
            .map_err(|err| format!("invalid embedded JSON: {err}"));
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Ok(Value::from(int));
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        // `44.0` has to fit integer columns too.
        if float.fract() == 0.0 && float.abs() < MAX_EXACT_INT {
            return Ok(Value::from(float as i64));
        }
        if float.is_finite() {
            return Ok(Value::from(float));
        }
    }
    Ok(Value::String(trimmed.to_string()))
}
