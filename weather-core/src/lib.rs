//! Core library for the `weather-etl` job.
//!
//! This crate defines:
//! - Configuration loading and validation
//! - Request URLs for the weatherapi.com forecast and history endpoints
//! - A retrying fetcher behind the [`HttpClient`] seam
//! - Payload normalization into [`WeatherRecord`] rows
//! - The SQLite store that upserts rows keyed by (date, location, type)
//! - The pipeline tying those together
//!
//! It is used by `weather-etl`, but the pipeline can be driven from any
//! binary or test that supplies its own [`HttpClient`].

pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod transform;
pub mod url;

pub use config::{Config, DatabaseConfig, HttpConfig, LoggingConfig, RetryConfig, WeatherConfig};
pub use error::{FetchError, HttpFailure, LoadError, MalformedPayloadError};
pub use fetch::{Fetcher, HttpClient, ReqwestClient, RetryPolicy};
pub use model::{FetchAttempt, RecordType, RunSummary, UpsertOutcome, WeatherRecord};
pub use pipeline::{Pipeline, run_etl};
pub use store::WeatherStore;
