use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{DurationSeconds, serde_as};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_BASE_URL: &str = "http://api.weatherapi.com/v1/";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [weather]
/// api_key = "..."
/// cities = ["London", "Paris"]
///
/// [database]
/// path = "weather.db"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub weather: WeatherConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API credentials and what to fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub api_key: String,

    /// Either a TOML array or a single comma-separated string.
    #[serde(deserialize_with = "deserialize_cities")]
    pub cities: Vec<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Days requested from the forecast endpoint.
    #[serde(default = "default_days")]
    pub forecast_days: u32,

    /// How many past days (counting back from yesterday) to pull history for.
    #[serde(default = "default_days")]
    pub history_days: u32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            cities: Vec::new(),
            base_url: default_base_url(),
            forecast_days: default_days(),
            history_days: default_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("weather.db"),
            max_connections: default_max_connections(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for every further one.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_base_delay")]
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_days() -> u32 {
    3
}

fn default_max_connections() -> u32 {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CityList {
    Many(Vec<String>),
    Joined(String),
}

fn deserialize_cities<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match CityList::deserialize(deserializer)? {
        CityList::Many(list) => list
            .iter()
            .map(|city| city.trim().to_string())
            .filter(|city| !city.is_empty())
            .collect(),
        CityList::Joined(joined) => split_cities(&joined),
    })
}

/// Split a comma-separated city list, trimming names and dropping empties.
pub fn split_cities(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|city| !city.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Load and validate config from `path`, or from the platform config
    /// directory when `None`. A missing file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if !path.exists() {
            bail!(
                "Config file not found: {}\n\
                 Hint: run `weather-etl configure` or pass `--config <path>`.",
                path.display()
            );
        }

        let cfg = Self::read(&path)?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Read and parse `path` without validating it.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the default config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-etl", "weather-etl")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.weather.api_key.trim().is_empty() {
            bail!("weather.api_key must not be empty");
        }
        if self.weather.cities.is_empty() {
            bail!("weather.cities must list at least one city");
        }
        if self.weather.forecast_days == 0 {
            bail!("weather.forecast_days must be greater than zero");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be greater than zero");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be greater than zero");
        }
        if self.database.path.as_os_str().is_empty() {
            bail!("database.path must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"
        [weather]
        api_key = "KEY"
        cities = ["London", "Paris"]
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = Config::from_toml(MINIMAL).expect("minimal config should parse");

        assert_eq!(cfg.weather.cities, vec!["London", "Paris"]);
        assert_eq!(cfg.weather.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.weather.forecast_days, 3);
        assert_eq!(cfg.weather.history_days, 3);
        assert_eq!(cfg.database.path, PathBuf::from("weather.db"));
        assert_eq!(cfg.database.max_connections, 1);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.base_delay, Duration::from_secs(2));
        assert_eq!(cfg.http.timeout, Duration::from_secs(30));
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn comma_separated_cities_are_split_and_trimmed() {
        let cfg = Config::from_toml(
            r#"
            [weather]
            api_key = "KEY"
            cities = " London,New York , ,Paris"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.weather.cities, vec!["London", "New York", "Paris"]);
    }

    #[test]
    fn durations_are_read_as_seconds() {
        let cfg = Config::from_toml(
            r#"
            [weather]
            api_key = "KEY"
            cities = ["Oslo"]

            [retry]
            max_attempts = 5
            base_delay = 1

            [http]
            timeout = 10
            "#,
        )
        .unwrap();

        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.base_delay, Duration::from_secs(1));
        assert_eq!(cfg.http.timeout, Duration::from_secs(10));
    }

    #[test]
    fn missing_weather_section_is_a_parse_error() {
        assert!(Config::from_toml("[database]\npath = \"x.db\"").is_err());
    }

    #[test]
    fn validate_rejects_empty_api_key() {
        let mut cfg = Config::from_toml(MINIMAL).unwrap();
        cfg.weather.api_key = "  ".into();

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn validate_rejects_empty_city_list() {
        let cfg = Config::from_toml(
            r#"
            [weather]
            api_key = "KEY"
            cities = " , "
            "#,
        )
        .unwrap();

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("cities"));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut cfg = Config::from_toml(MINIMAL).unwrap();
        cfg.retry.max_attempts = 0;

        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file_with_hint() {
        let dir = tempdir().unwrap();
        let err = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap_err();

        assert!(err.to_string().contains("Config file not found"));
        assert!(err.to_string().contains("weather-etl configure"));
    }

    #[test]
    fn read_keeps_settings_that_fail_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [weather]
            api_key = ""
            cities = ["Oslo"]

            [retry]
            max_attempts = 7
            base_delay = 9
            "#,
        )
        .unwrap();

        assert!(Config::load(Some(path.as_path())).is_err());

        let cfg = Config::read(&path).expect("parseable config should read");
        assert_eq!(cfg.weather.cities, vec!["Oslo"]);
        assert_eq!(cfg.retry.max_attempts, 7);
        assert_eq!(cfg.retry.base_delay, Duration::from_secs(9));
    }

    #[test]
    fn read_reports_unparseable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[weather\napi_key = ").unwrap();

        let err = Config::read(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.weather.api_key = "KEY".into();
        cfg.weather.cities = vec!["London".into()];
        cfg.database.path = dir.path().join("weather.db");
        cfg.save(&path).expect("save should succeed");

        let loaded = Config::load(Some(path.as_path())).expect("load should succeed");
        assert_eq!(loaded.weather.cities, vec!["London"]);
        assert_eq!(loaded.database.path, cfg.database.path);
        assert_eq!(loaded.retry.base_delay, Duration::from_secs(2));
    }
}
