use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::fmt::Debug;
use tracing::{debug, error, info};

use crate::{config::QualityBounds, error::PipelineError, model::WeatherRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Storage for merged weather rows, keyed by date.
#[async_trait]
pub trait WeatherRepository: Send + Sync + Debug {
    async fn upsert(&self, record: &WeatherRecord) -> Result<UpsertOutcome, PipelineError>;

    async fn find_by_date(&self, date: NaiveDate) -> Result<Option<WeatherRecord>, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct SqliteWeatherRepository {
    pool: SqlitePool,
}

impl SqliteWeatherRepository {
    /// Connect to `url` and make sure the `weather` table exists.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        bounds: &QualityBounds,
    ) -> Result<Self, PipelineError> {
        let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
        let repository = Self { pool };
        repository.migrate(bounds).await?;
        Ok(repository)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self, bounds: &QualityBounds) -> Result<(), PipelineError> {
        sqlx::query(&create_table_sql(bounds)).execute(&self.pool).await?;
        debug!("weather table ready");
        Ok(())
    }
}

#[async_trait]
impl WeatherRepository for SqliteWeatherRepository {
    async fn upsert(&self, record: &WeatherRecord) -> Result<UpsertOutcome, PipelineError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM weather WHERE date = ?")
            .bind(record.date)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE weather SET min_temp = ?, max_temp = ?, rainfall = ?, \
                     humidity_9am = ?, humidity_3pm = ?, temp_9am = ?, temp_3pm = ?, \
                     current_temp = ?, current_humidity = ?, current_weather_description = ?, \
                     updated_at = CURRENT_TIMESTAMP \
                     WHERE id = ?",
                )
                .bind(record.min_temp)
                .bind(record.max_temp)
                .bind(record.rainfall)
                .bind(record.humidity_9am)
                .bind(record.humidity_3pm)
                .bind(record.temp_9am)
                .bind(record.temp_3pm)
                .bind(record.current_temp)
                .bind(record.current_humidity)
                .bind(&record.current_weather_description)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
                UpsertOutcome::Updated
            }
            None => {
                sqlx::query(
                    "INSERT INTO weather (date, min_temp, max_temp, rainfall, humidity_9am, \
                     humidity_3pm, temp_9am, temp_3pm, current_temp, current_humidity, \
                     current_weather_description) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(record.date)
                .bind(record.min_temp)
                .bind(record.max_temp)
                .bind(record.rainfall)
                .bind(record.humidity_9am)
                .bind(record.humidity_3pm)
                .bind(record.temp_9am)
                .bind(record.temp_3pm)
                .bind(record.current_temp)
                .bind(record.current_humidity)
                .bind(&record.current_weather_description)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit().await?;
        info!(date = %record.date, ?outcome, "stored weather record");
        Ok(outcome)
    }

    async fn find_by_date(&self, date: NaiveDate) -> Result<Option<WeatherRecord>, PipelineError> {
        let record = sqlx::query_as::<_, WeatherRecord>(
            "SELECT date, min_temp, max_temp, rainfall, humidity_9am, humidity_3pm, temp_9am, \
             temp_3pm, current_temp, current_humidity, current_weather_description \
             FROM weather WHERE date = ?",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

/// Constraint violations are bad data, not a broken database.
fn classify(err: sqlx::Error) -> PipelineError {
    if let Some(db) = err.as_database_error() {
        if db.is_check_violation() || db.is_unique_violation() {
            error!(error = %db, "integrity error while storing weather data");
            return PipelineError::DataQuality(db.message().to_string());
        }
    }
    PipelineError::Database(err)
}

fn create_table_sql(b: &QualityBounds) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS weather (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL UNIQUE,
            min_temp REAL NOT NULL CHECK (min_temp BETWEEN {lt} AND {ht}),
            max_temp REAL NOT NULL CHECK (max_temp BETWEEN {lt} AND {ht}),
            rainfall REAL NOT NULL CHECK (rainfall <= {rain}),
            humidity_9am INTEGER NOT NULL CHECK (humidity_9am BETWEEN {lh} AND {hh}),
            humidity_3pm INTEGER NOT NULL CHECK (humidity_3pm BETWEEN {lh} AND {hh}),
            temp_9am REAL NOT NULL,
            temp_3pm REAL NOT NULL,
            current_temp REAL NOT NULL,
            current_humidity INTEGER NOT NULL CHECK (current_humidity BETWEEN {lh} AND {hh}),
            current_weather_description TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT,
            CONSTRAINT weather_min_max_temp_check CHECK (min_temp <= max_temp),
            CONSTRAINT weather_temp_9am_range_check CHECK (temp_9am BETWEEN min_temp AND max_temp),
            CONSTRAINT weather_temp_3pm_range_check CHECK (temp_3pm BETWEEN min_temp AND max_temp),
            CONSTRAINT weather_current_temp_range_check
                CHECK (current_temp BETWEEN min_temp AND max_temp)
        )",
        lt = b.lowest_temp,
        ht = b.highest_temp,
        rain = b.highest_rain_depth,
        lh = b.lowest_humidity,
        hh = b.highest_humidity,
    )
}
