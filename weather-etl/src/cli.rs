use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use inquire::{CustomType, Password, Text};
use tracing::info;
use weather_core::{
    Config, Coordinates, Pipeline, Units, WeatherQuery,
    etl::SqliteWeatherRepository, provider_from_config,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-etl", version, about = "Weather ETL pipeline")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the API key and default location.
    Configure,

    /// Fetch current weather and print it as JSON.
    Fetch {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Merge the first valid CSV row with live weather and store it.
    Run {
        /// Historical weather CSV.
        #[arg(long)]
        csv: PathBuf,

        /// Database URL, overrides `[database] url`.
        #[arg(long)]
        database: Option<String>,

        #[command(flatten)]
        location: LocationArgs,
    },
}

#[derive(Debug, Args)]
pub struct LocationArgs {
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    pub lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lon: Option<f64>,

    /// metric, imperial or standard.
    #[arg(long, default_value = "metric", value_parser = parse_units)]
    pub units: Units,
}

impl LocationArgs {
    fn query(&self) -> anyhow::Result<WeatherQuery> {
        let coordinates = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)?),
            _ => None,
        };
        Ok(WeatherQuery { coordinates, units: self.units })
    }
}

fn parse_units(value: &str) -> Result<Units, String> {
    Units::try_from(value).map_err(|err| err.to_string())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command {
            Command::Configure => configure(&config_path),
            Command::Fetch { location } => {
                let config = Config::load_or_default(&config_path)?;
                let provider = provider_from_config(&config)?;

                let weather = provider.get_weather(&location.query()?).await?;
                println!("{}", serde_json::to_string_pretty(&weather)?);
                Ok(())
            }
            Command::Run { csv, database, location } => {
                let mut config = Config::load_or_default(&config_path)?;
                if let Some(url) = database {
                    config.database.url = url;
                }

                let provider = provider_from_config(&config)?;
                let repository = SqliteWeatherRepository::connect(
                    &config.database.url,
                    config.database.max_connections,
                    &config.quality,
                )
                .await
                .with_context(|| format!("Failed to open database {}", config.database.url))?;

                let pipeline =
                    Pipeline::new(provider, Box::new(repository), config.quality.clone());
                let today = chrono::Local::now().date_naive();
                let report = pipeline
                    .run(&csv, &location.query()?, today)
                    .await
                    .with_context(|| format!("Pipeline failed for {}", csv.display()))?;

                println!(
                    "{} {} ({} valid rows): {:?}",
                    report.date, report.location, report.rows_read, report.outcome
                );
                Ok(())
            }
        }
    }
}

fn configure(path: &Path) -> anyhow::Result<()> {
    let mut config = if path.exists() { Config::load_from(path)? } else { Config::default() };

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Stored in plain text in the config file")
        .prompt()?;
    config.api.api_key = api_key.trim().to_string();

    let url = Text::new("API base URL:").with_default(&config.api.url).prompt()?;
    config.api.url = url.trim().to_string();

    config.api.default_lat = CustomType::<f64>::new("Default latitude:")
        .with_default(config.api.default_lat)
        .prompt()?;
    config.api.default_lon = CustomType::<f64>::new("Default longitude:")
        .with_default(config.api.default_lon)
        .prompt()?;

    config.validate()?;
    config.save_to(path)?;

    info!(path = %path.display(), "saved configuration");
    println!("Configuration saved to {}", path.display());
    Ok(())
}
