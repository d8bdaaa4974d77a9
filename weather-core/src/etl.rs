//! Extract, transform and load of daily weather rows.

use std::{path::Path, time::Instant};

use chrono::NaiveDate;
use tracing::info;

use crate::{
    config::QualityBounds,
    error::PipelineError,
    model::WeatherQuery,
    provider::WeatherProvider,
};

pub mod extract;
pub mod load;
pub mod transform;

pub use extract::{extract_api_data, extract_csv_data};
pub use load::{SqliteWeatherRepository, UpsertOutcome, WeatherRepository};
pub use transform::transform_data;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub date: NaiveDate,
    pub location: String,
    pub rows_read: usize,
    pub outcome: UpsertOutcome,
}

#[derive(Debug)]
pub struct Pipeline {
    provider: Box<dyn WeatherProvider>,
    repository: Box<dyn WeatherRepository>,
    bounds: QualityBounds,
}

impl Pipeline {
    pub fn new(
        provider: Box<dyn WeatherProvider>,
        repository: Box<dyn WeatherRepository>,
        bounds: QualityBounds,
    ) -> Self {
        Self { provider, repository, bounds }
    }

    /// Fetch the live reading for `query`, merge it with the first valid row
    /// of `csv_path` and store the result.
    pub async fn run(
        &self,
        csv_path: &Path,
        query: &WeatherQuery,
        today: NaiveDate,
    ) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();

        let api = extract_api_data(self.provider.as_ref(), query).await?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "extracted API data");

        let rows = extract_csv_data(csv_path, &self.bounds, today)?;
        let rows_read = rows.len();
        let Some(row) = rows.into_iter().next() else {
            return Err(PipelineError::EmptyDataset(csv_path.display().to_string()));
        };
        info!(rows_read, elapsed_ms = started.elapsed().as_millis() as u64, "extracted CSV data");

        let record = transform_data(&row, &api, &self.bounds)?;
        let outcome = self.repository.upsert(&record).await?;
        info!(
            date = %record.date,
            ?outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline finished"
        );

        Ok(PipelineReport { date: record.date, location: row.location, rows_read, outcome })
    }
}
