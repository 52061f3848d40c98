//! Per city, per record type orchestration: build URL, fetch, transform, load.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeDelta};
use reqwest::Url;
use tracing::{error, info, warn};

use crate::{
    config::{Config, WeatherConfig},
    error::error_chain,
    fetch::{Fetcher, HttpClient, ReqwestClient, RetryPolicy},
    model::{RecordType, RunSummary, UpsertOutcome},
    store::WeatherStore,
    transform::transform,
    url::{UrlBuilder, redacted},
};

/// Sequential ETL run over every configured city.
///
/// Failures are contained to the item they happened on: a city whose fetch
/// fails is skipped, a malformed payload loads nothing, a failed row does not
/// stop the rows after it.
#[derive(Debug)]
pub struct Pipeline<C> {
    cities: Vec<String>,
    forecast_days: u32,
    history_days: u32,
    urls: UrlBuilder,
    fetcher: Fetcher<C>,
    store: WeatherStore,
}

impl<C: HttpClient> Pipeline<C> {
    pub fn new(weather: &WeatherConfig, fetcher: Fetcher<C>, store: WeatherStore) -> Result<Self> {
        let urls = UrlBuilder::new(&weather.base_url, weather.api_key.clone())?;

        Ok(Self {
            cities: weather.cities.clone(),
            forecast_days: weather.forecast_days,
            history_days: weather.history_days,
            urls,
            fetcher,
            store,
        })
    }

    pub fn store(&self) -> &WeatherStore {
        &self.store
    }

    /// Forecast pass, then history for each of the `history_days` days before `today`.
    pub async fn run(&self, today: NaiveDate) -> RunSummary {
        let mut summary = RunSummary::default();

        self.run_forecast(&mut summary).await;
        self.run_history(today, &mut summary).await;

        summary
    }

    async fn run_forecast(&self, summary: &mut RunSummary) {
        for city in &self.cities {
            info!(city = %city, "Fetching forecast");
            let url = self.urls.forecast(city, self.forecast_days);
            self.process(&url, city, RecordType::Forecast, summary).await;
        }
    }

    async fn run_history(&self, today: NaiveDate, summary: &mut RunSummary) {
        for days_back in 1..=self.history_days {
            let Some(date) = today.checked_sub_signed(TimeDelta::days(i64::from(days_back))) else {
                warn!(days_back, "History date out of range, stopping history pass");
                break;
            };

            for city in &self.cities {
                info!(city = %city, %date, "Fetching history");
                let url = self.urls.history(city, date);
                self.process(&url, city, RecordType::History, summary).await;
            }
        }
    }

    async fn process(&self, url: &Url, city: &str, record_type: RecordType, summary: &mut RunSummary) {
        summary.requests += 1;

        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                error!(city, %record_type, error = %error_chain(&e), "All retries failed, skipping");
                summary.fetch_failures += 1;
                return;
            }
        };

        let records = match transform(&body, city, record_type) {
            Ok(records) => records,
            Err(e) => {
                error!(
                    city,
                    %record_type,
                    url = %redacted(url),
                    error = %error_chain(&e),
                    "Malformed payload, skipping"
                );
                summary.malformed_payloads += 1;
                return;
            }
        };

        for record in &records {
            match self.store.upsert(record).await {
                Ok(UpsertOutcome::Inserted) => {
                    info!(
                        location = %record.location,
                        date = %record.date,
                        %record_type,
                        "Successfully wrote data"
                    );
                    summary.inserted += 1;
                }
                Ok(UpsertOutcome::Updated) => {
                    info!(
                        location = %record.location,
                        date = %record.date,
                        %record_type,
                        "Updated existing data"
                    );
                    summary.updated += 1;
                }
                Err(e) => {
                    error!(error = %error_chain(&e), "Database write failed");
                    summary.load_failures += 1;
                }
            }
        }
    }
}

/// Run the whole job once from configuration.
///
/// Connection and schema setup failures are fatal; everything after that is
/// handled per item and only shows up in the returned summary.
pub async fn run_etl(config: &Config) -> Result<RunSummary> {
    let client =
        ReqwestClient::new(config.http.timeout).context("Failed to build HTTP client")?;
    let fetcher = Fetcher::new(client, RetryPolicy::from(&config.retry));

    let store = WeatherStore::connect(&config.database).await?;
    store.migrate().await?;

    let pipeline = Pipeline::new(&config.weather, fetcher, store)?;
    info!(
        cities = pipeline.cities.len(),
        max_attempts = pipeline.fetcher.policy().max_attempts,
        base_delay = ?pipeline.fetcher.policy().base_delay,
        "Starting weather ETL run"
    );

    let summary = pipeline.run(Local::now().date_naive()).await;
    pipeline.store().close().await;

    Ok(summary)
}
