//! Error taxonomy for the ETL pipeline.
//!
//! Each error is scoped to one unit of work (one HTTP call, one payload, one
//! row) so the pipeline can log it and move on to the next item.

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::RecordType;

/// Why a single HTTP attempt failed.
#[derive(Debug, Error)]
pub enum HttpFailure {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
}

/// All attempts for one URL failed.
#[derive(Debug, Error)]
#[error("giving up on {url} after {attempts} attempts ({waited:?} spent in backoff)")]
pub struct FetchError {
    /// Request URL with the API key redacted.
    pub url: String,
    pub attempts: u32,
    pub waited: Duration,
    #[source]
    pub source: HttpFailure,
}

/// The API answered, but not with something we can turn into records.
#[derive(Debug, Error)]
pub enum MalformedPayloadError {
    #[error("payload is not a valid weather document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid forecast date {value:?}")]
    Date {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Database failure while connecting, preparing the schema or writing a row.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not open database {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("could not create directory for database {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("schema setup failed: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("failed to upsert {record_type} record for {location} on {date}")]
    Write {
        date: NaiveDate,
        location: String,
        record_type: RecordType,
        #[source]
        source: sqlx::Error,
    },

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("stored record has unknown type {0:?}")]
    UnknownRecordType(String),
}

/// Render an error together with its whole `source()` chain.
///
/// Used when logging skipped items so the root cause ends up in the log line.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        current = cause.source();
    }
    out
}
