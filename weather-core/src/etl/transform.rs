use tracing::debug;

use crate::{
    config::QualityBounds,
    error::PipelineError,
    model::{ApiWeather, CsvWeather, WeatherRecord},
};

const NO_DESCRIPTION: &str = "No description";

/// Merge a historical CSV day with the current API reading.
///
/// The current temperature has to fall inside the day's recorded range, and
/// the API reading itself has to be within `bounds`.
pub fn transform_data(
    csv: &CsvWeather,
    api: &ApiWeather,
    bounds: &QualityBounds,
) -> Result<WeatherRecord, PipelineError> {
    let current = &api.current;

    if !(csv.min_temp..=csv.max_temp).contains(&current.temp) {
        return Err(PipelineError::DataQuality(format!(
            "Current temperature {} is outside the range of min_temp {} and max_temp {}",
            current.temp, csv.min_temp, csv.max_temp
        )));
    }
    if !(bounds.lowest_humidity..=bounds.highest_humidity).contains(&current.humidity) {
        return Err(PipelineError::DataQuality(format!(
            "Current humidity {} is outside {}..={}",
            current.humidity, bounds.lowest_humidity, bounds.highest_humidity
        )));
    }
    if current.clouds > bounds.highest_cloudiness_pct {
        return Err(PipelineError::DataQuality(format!(
            "Current cloudiness {} exceeds {}",
            current.clouds, bounds.highest_cloudiness_pct
        )));
    }
    if current.wind_deg > bounds.highest_wind_degrees {
        return Err(PipelineError::DataQuality(format!(
            "Current wind direction {} exceeds {}",
            current.wind_deg, bounds.highest_wind_degrees
        )));
    }

    let record = WeatherRecord {
        date: csv.date,
        min_temp: csv.min_temp,
        max_temp: csv.max_temp,
        rainfall: csv.rainfall,
        humidity_9am: csv.humidity_9am,
        humidity_3pm: csv.humidity_3pm,
        temp_9am: csv.temp_9am,
        temp_3pm: csv.temp_3pm,
        current_temp: current.temp,
        current_humidity: current.humidity,
        current_weather_description: api
            .current_description()
            .unwrap_or(NO_DESCRIPTION)
            .to_string(),
    };

    debug!(date = %record.date, "merged CSV and API weather");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{api, files};

    fn api_weather() -> ApiWeather {
        serde_json::from_value(api::fixtures::one_call()).expect("fixture decodes")
    }

    #[test]
    fn merges_csv_and_api_fields() {
        let csv = files::fixtures::row();
        let api = api_weather();

        let record = transform_data(&csv, &api, &QualityBounds::default()).expect("in range");

        assert_eq!(record.date, csv.date);
        assert_eq!(record.min_temp, 13.4);
        assert_eq!(record.max_temp, 22.9);
        assert_eq!(record.humidity_3pm, 22);
        assert_eq!(record.current_temp, 14.5);
        assert_eq!(record.current_humidity, 72);
        assert_eq!(record.current_weather_description, "scattered clouds");
    }

    #[test]
    fn temperature_outside_day_range_is_a_quality_error() {
        let csv = files::fixtures::row();
        let mut api = api_weather();
        api.current.temp = 30.0;

        let err = transform_data(&csv, &api, &QualityBounds::default()).unwrap_err();

        let PipelineError::DataQuality(message) = err else {
            panic!("expected data quality error")
        };
        assert!(message.contains("Current temperature 30 is outside the range"));
    }

    #[test]
    fn range_edges_are_inclusive() {
        let csv = files::fixtures::row();
        let mut api = api_weather();
        api.current.temp = csv.max_temp;

        assert!(transform_data(&csv, &api, &QualityBounds::default()).is_ok());
    }

    #[test]
    fn wind_direction_over_bound_is_rejected() {
        let csv = files::fixtures::row();
        let mut api = api_weather();
        api.current.wind_deg = 400;

        assert!(matches!(
            transform_data(&csv, &api, &QualityBounds::default()),
            Err(PipelineError::DataQuality(_))
        ));
    }

    #[test]
    fn empty_weather_list_uses_placeholder_description() {
        let csv = files::fixtures::row();
        let mut api = api_weather();
        api.current.weather.clear();

        let record = transform_data(&csv, &api, &QualityBounds::default()).expect("in range");

        assert_eq!(record.current_weather_description, "No description");
    }
}
