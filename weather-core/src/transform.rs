//! Maps weatherapi.com forecast/history documents onto [`WeatherRecord`] rows.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::MalformedPayloadError,
    model::{RecordType, WeatherRecord},
};

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct WaAirQuality {
    co: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    air_quality: Option<WaAirQuality>,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    mintemp_c: f64,
    maxtemp_c: f64,
    avghumidity: f64,
    totalprecip_mm: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: String,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

/// Both endpoints share this shape; history responses just lack `current`.
#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: Option<WaCurrent>,
    forecast: WaForecast,
}

/// Turn a raw response body into one record per forecast day.
///
/// `city` is the name the request was made for; the stored location is the
/// name the API reports back.
pub fn transform(
    body: &str,
    city: &str,
    record_type: RecordType,
) -> Result<Vec<WeatherRecord>, MalformedPayloadError> {
    let parsed: WaResponse = serde_json::from_str(body)?;

    if parsed.location.name != city {
        debug!(
            requested = city,
            reported = %parsed.location.name,
            "API resolved city to a different name"
        );
    }

    let air_quality_co = parsed
        .current
        .and_then(|c| c.air_quality)
        .and_then(|aq| aq.co);

    parsed
        .forecast
        .forecastday
        .into_iter()
        .map(|fd| -> Result<WeatherRecord, MalformedPayloadError> {
            let date = NaiveDate::parse_from_str(&fd.date, "%Y-%m-%d").map_err(|source| {
                MalformedPayloadError::Date {
                    value: fd.date.clone(),
                    source,
                }
            })?;

            Ok(WeatherRecord {
                date,
                location: parsed.location.name.clone(),
                country: parsed.location.country.clone(),
                record_type,
                min_temp_c: fd.day.mintemp_c,
                max_temp_c: fd.day.maxtemp_c,
                avg_humidity: fd.day.avghumidity,
                total_precip_mm: fd.day.totalprecip_mm,
                air_quality_co,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORECAST: &str = r#"{
        "location": {"name": "London", "region": "City of London", "country": "United Kingdom"},
        "current": {
            "temp_c": 11.0,
            "air_quality": {"co": 230.3, "no2": 17.1, "us-epa-index": 1}
        },
        "forecast": {
            "forecastday": [
                {"date": "2024-01-01", "day": {"maxtemp_c": 9.4, "mintemp_c": 4.1, "avghumidity": 81, "totalprecip_mm": 2.3}},
                {"date": "2024-01-02", "day": {"maxtemp_c": 8.0, "mintemp_c": 3.5, "avghumidity": 77.5}}
            ]
        }
    }"#;

    const HISTORY: &str = r#"{
        "location": {"name": "Paris", "country": "France"},
        "forecast": {
            "forecastday": [
                {"date": "2023-12-31", "day": {"maxtemp_c": 10.2, "mintemp_c": 6.0, "avghumidity": 90, "totalprecip_mm": 0.0}}
            ]
        }
    }"#;

    #[test]
    fn forecast_payload_yields_one_record_per_day() {
        let records = transform(FORECAST, "London", RecordType::Forecast).unwrap();

        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(first.location, "London");
        assert_eq!(first.country, "United Kingdom");
        assert_eq!(first.record_type, RecordType::Forecast);
        assert_eq!(first.min_temp_c, 4.1);
        assert_eq!(first.max_temp_c, 9.4);
        assert_eq!(first.avg_humidity, 81.0);
        assert_eq!(first.total_precip_mm, Some(2.3));
        assert_eq!(first.air_quality_co, Some(230.3));

        // Air quality is a property of the response, shared by every day.
        assert_eq!(records[1].air_quality_co, Some(230.3));
        assert_eq!(records[1].total_precip_mm, None);
    }

    #[test]
    fn history_payload_has_no_air_quality() {
        let records = transform(HISTORY, "Paris", RecordType::History).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type, RecordType::History);
        assert_eq!(records[0].air_quality_co, None);
        assert_eq!(records[0].avg_humidity, 90.0);
    }

    #[test]
    fn location_comes_from_payload() {
        let records = transform(HISTORY, "paris,fr", RecordType::History).unwrap();
        assert_eq!(records[0].location, "Paris");
    }

    #[test]
    fn empty_forecast_yields_no_records() {
        let body = r#"{"location": {"name": "Oslo", "country": "Norway"}, "forecast": {"forecastday": []}}"#;
        let records = transform(body, "Oslo", RecordType::Forecast).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let body = r#"{
            "location": {"name": "Oslo", "country": "Norway"},
            "forecast": {"forecastday": [{"date": "2024-01-01", "day": {"maxtemp_c": 1.0, "mintemp_c": -3.0}}]}
        }"#;

        let err = transform(body, "Oslo", RecordType::Forecast).unwrap_err();
        assert!(matches!(err, MalformedPayloadError::Json(_)));
        assert!(err.to_string().contains("avghumidity"));
    }

    #[test]
    fn missing_location_is_malformed() {
        let body = r#"{"forecast": {"forecastday": []}}"#;
        let err = transform(body, "Oslo", RecordType::Forecast).unwrap_err();
        assert!(err.to_string().contains("location"));
    }

    #[test]
    fn api_error_document_is_malformed() {
        let body = r#"{"error": {"code": 1006, "message": "No matching location found."}}"#;
        assert!(transform(body, "Atlantis", RecordType::Forecast).is_err());
    }

    #[test]
    fn bad_date_is_malformed() {
        let body = r#"{
            "location": {"name": "Oslo", "country": "Norway"},
            "forecast": {"forecastday": [{"date": "01/02/2024", "day": {"maxtemp_c": 1.0, "mintemp_c": -3.0, "avghumidity": 70}}]}
        }"#;

        let err = transform(body, "Oslo", RecordType::History).unwrap_err();
        assert!(matches!(err, MalformedPayloadError::Date { ref value, .. } if value == "01/02/2024"));
    }

    #[test]
    fn non_json_body_is_malformed() {
        assert!(matches!(
            transform("<html>oops</html>", "Oslo", RecordType::Forecast),
            Err(MalformedPayloadError::Json(_))
        ));
    }
}
