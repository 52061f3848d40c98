use std::{fmt, str::FromStr, time::Duration};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which endpoint a record came from.
///
/// `Forecast` rows come from the current/forecast endpoint, `History` rows
/// from the historical one. The pair is part of the storage key, so the same
/// city and day can hold one row of each type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    Forecast,
    History,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Forecast => "FORECAST",
            RecordType::History => "HISTORY",
        }
    }

    pub const fn all() -> &'static [RecordType] {
        &[RecordType::Forecast, RecordType::History]
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_uppercase().as_str() {
            "FORECAST" => Ok(RecordType::Forecast),
            "HISTORY" => Ok(RecordType::History),
            _ => Err(value.to_string()),
        }
    }
}

/// One daily observation, shaped like a row of `weather_records`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub location: String,
    pub country: String,
    pub record_type: RecordType,
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    pub avg_humidity: f64,
    pub total_precip_mm: Option<f64>,
    /// Carbon monoxide (μg/m³); only forecast requests carry air quality.
    pub air_quality_co: Option<f64>,
}

/// Result of writing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Bookkeeping for one HTTP call in flight. Lives only inside the retry loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchAttempt {
    /// 1-based number of the attempt about to run.
    pub number: u32,
    /// Total time already spent sleeping between attempts.
    pub waited: Duration,
}

impl FetchAttempt {
    pub fn first() -> Self {
        Self {
            number: 1,
            waited: Duration::ZERO,
        }
    }

    /// Advance to the next attempt after sleeping `delay`.
    pub fn next(self, delay: Duration) -> Self {
        Self {
            number: self.number + 1,
            waited: self.waited + delay,
        }
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub requests: u32,
    pub fetch_failures: u32,
    pub malformed_payloads: u32,
    pub inserted: u32,
    pub updated: u32,
    pub load_failures: u32,
}

impl RunSummary {
    pub fn failures(&self) -> u32 {
        self.fetch_failures + self.malformed_payloads + self.load_failures
    }
}
