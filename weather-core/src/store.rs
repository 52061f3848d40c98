//! SQLite-backed destination table for weather records.

use std::{fs, time::Duration};

use chrono::{NaiveDate, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::info;

use crate::{
    config::DatabaseConfig,
    error::LoadError,
    model::{RecordType, UpsertOutcome, WeatherRecord},
};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS weather_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        location TEXT NOT NULL,
        country TEXT NOT NULL,
        min_temp_c REAL NOT NULL,
        max_temp_c REAL NOT NULL,
        avg_humidity REAL NOT NULL,
        total_precip_mm REAL NULL,
        air_quality_co REAL NULL,
        type TEXT NOT NULL CHECK (type IN ('FORECAST', 'HISTORY')),
        revision INTEGER NOT NULL DEFAULT 1,
        updated_at TEXT NOT NULL,
        UNIQUE (date, location, type)
    )"#;

// `revision` starts at 1 and is bumped on every conflict, so the returned value
// tells an insert from an update without a second query.
const UPSERT: &str = r#"
    INSERT INTO weather_records (
        date, location, country,
        min_temp_c, max_temp_c, avg_humidity, total_precip_mm, air_quality_co,
        type, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(date, location, type) DO UPDATE SET
        min_temp_c = excluded.min_temp_c,
        max_temp_c = excluded.max_temp_c,
        avg_humidity = excluded.avg_humidity,
        total_precip_mm = excluded.total_precip_mm,
        air_quality_co = excluded.air_quality_co,
        revision = weather_records.revision + 1,
        updated_at = excluded.updated_at
    RETURNING revision"#;

#[derive(Debug, sqlx::FromRow)]
struct WeatherRow {
    date: NaiveDate,
    location: String,
    country: String,
    #[sqlx(rename = "type")]
    record_type: String,
    min_temp_c: f64,
    max_temp_c: f64,
    avg_humidity: f64,
    total_precip_mm: Option<f64>,
    air_quality_co: Option<f64>,
}

impl TryFrom<WeatherRow> for WeatherRecord {
    type Error = LoadError;

    fn try_from(row: WeatherRow) -> Result<Self, Self::Error> {
        let record_type = row
            .record_type
            .parse::<RecordType>()
            .map_err(LoadError::UnknownRecordType)?;

        Ok(WeatherRecord {
            date: row.date,
            location: row.location,
            country: row.country,
            record_type,
            min_temp_c: row.min_temp_c,
            max_temp_c: row.max_temp_c,
            avg_humidity: row.avg_humidity,
            total_precip_mm: row.total_precip_mm,
            air_quality_co: row.air_quality_co,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WeatherStore {
    pool: SqlitePool,
}

impl WeatherStore {
    /// Open (creating if needed) the database file named in `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, LoadError> {
        let path = &config.path;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LoadError::Directory {
                path: path.display().to_string(),
                source,
            })?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(opts)
            .await
            .map_err(|source| LoadError::Connect {
                path: path.display().to_string(),
                source,
            })?;

        info!(path = %path.display(), "Opened weather database");
        Ok(Self { pool })
    }

    /// Create `weather_records` if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), LoadError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(LoadError::Schema)?;
        Ok(())
    }

    /// Insert `record`, or overwrite the measurements of the row sharing its
    /// (date, location, type) key. One statement, no read-then-write.
    pub async fn upsert(&self, record: &WeatherRecord) -> Result<UpsertOutcome, LoadError> {
        let revision: i64 = sqlx::query_scalar(UPSERT)
            .bind(record.date)
            .bind(&record.location)
            .bind(&record.country)
            .bind(record.min_temp_c)
            .bind(record.max_temp_c)
            .bind(record.avg_humidity)
            .bind(record.total_precip_mm)
            .bind(record.air_quality_co)
            .bind(record.record_type.as_str())
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|source| LoadError::Write {
                date: record.date,
                location: record.location.clone(),
                record_type: record.record_type,
                source,
            })?;

        Ok(if revision == 1 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }

    pub async fn find(
        &self,
        date: NaiveDate,
        location: &str,
        record_type: RecordType,
    ) -> Result<Option<WeatherRecord>, LoadError> {
        let row: Option<WeatherRow> = sqlx::query_as(
            r#"
            SELECT date, location, country, type,
                   min_temp_c, max_temp_c, avg_humidity, total_precip_mm, air_quality_co
            FROM weather_records
            WHERE date = ?1 AND location = ?2 AND type = ?3"#,
        )
        .bind(date)
        .bind(location)
        .bind(record_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(WeatherRecord::try_from).transpose()
    }

    pub async fn count(&self) -> Result<i64, LoadError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM weather_records")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
