//! Request URLs for the weatherapi.com forecast and history endpoints.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use reqwest::Url;

const FORECAST_ENDPOINT: &str = "forecast.json";
const HISTORY_ENDPOINT: &str = "history.json";

#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: Url,
    api_key: String,
}

impl UrlBuilder {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let base =
            Url::parse(base_url).with_context(|| format!("Invalid API base URL: {base_url}"))?;

        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            bail!("API base URL must be an http(s) URL, got {base_url}");
        }

        Ok(Self {
            base,
            api_key: api_key.into(),
        })
    }

    /// `forecast.json` for `city`, `days` days ahead, with air quality.
    pub fn forecast(&self, city: &str, days: u32) -> Url {
        let mut url = self.endpoint(FORECAST_ENDPOINT);
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("q", city)
            .append_pair("days", &days.to_string())
            .append_pair("aqi", "yes")
            .append_pair("alerts", "no");
        url
    }

    /// `history.json` for `city` on `date`.
    pub fn history(&self, city: &str, date: NaiveDate) -> Url {
        let mut url = self.endpoint(HISTORY_ENDPOINT);
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("q", city)
            .append_pair("dt", &date.format("%Y-%m-%d").to_string());
        url
    }

    fn endpoint(&self, name: &str) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`: the base always has path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name);
        }
        url
    }
}

/// The URL with the `key` query value masked, safe to log.
pub fn redacted(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "key" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), value)
        })
        .collect();

    if pairs.is_empty() {
        return url.to_string();
    }

    let mut masked = url.clone();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> UrlBuilder {
        UrlBuilder::new("http://api.weatherapi.com/v1/", "SECRET").unwrap()
    }

    #[test]
    fn forecast_url_has_expected_query() {
        let url = builder().forecast("London", 3);

        assert_eq!(
            url.as_str(),
            "http://api.weatherapi.com/v1/forecast.json?key=SECRET&q=London&days=3&aqi=yes&alerts=no"
        );
    }

    #[test]
    fn history_url_formats_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let url = builder().history("London", date);

        assert_eq!(
            url.as_str(),
            "http://api.weatherapi.com/v1/history.json?key=SECRET&q=London&dt=2024-01-01"
        );
    }

    #[test]
    fn city_names_are_encoded() {
        let url = builder().forecast("São Paulo & co", 1);
        let q: Vec<_> = url.query_pairs().filter(|(k, _)| k == "q").collect();

        assert_eq!(q.len(), 1);
        assert_eq!(q[0].1, "São Paulo & co");
        assert!(url.as_str().contains("q=S%C3%A3o+Paulo+%26+co"));
    }

    #[test]
    fn base_without_trailing_slash_still_nests_endpoint() {
        let builder = UrlBuilder::new("https://weather.example/v1", "K").unwrap();
        let url = builder.forecast("Oslo", 2);

        assert_eq!(url.path(), "/v1/forecast.json");
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(UrlBuilder::new("mailto:someone@example.com", "K").is_err());
        assert!(UrlBuilder::new("not a url", "K").is_err());
    }

    #[test]
    fn redacted_masks_only_the_key() {
        let url = builder().forecast("London", 3);
        let shown = redacted(&url);

        assert!(!shown.contains("SECRET"));
        assert!(shown.contains("key=***"));
        assert!(shown.contains("q=London"));
    }
}
