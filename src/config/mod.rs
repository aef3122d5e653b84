//! Configuration for the registry pipeline.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Default base URL of the council website
pub const DEFAULT_BASE_URL: &str = "https://www.pharmacycouncil.telangana.gov.in";

/// Default user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Configuration for extraction, rate limiting, storage and sync safety
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the council website
    pub base_url: String,
    /// User agent header for outbound requests
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Additional attempts after the first failed request
    pub max_retries: usize,
    /// Base delay between retry attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Lower bound of the politeness delay band in milliseconds
    pub min_delay_ms: u64,
    /// Upper bound of the politeness delay band in milliseconds
    pub max_delay_ms: u64,
    /// Number of requests between long breaks
    pub long_break_after: u32,
    /// Duration of a long break in seconds
    pub long_break_secs: u64,
    /// Pause taken after a blocking status (403/429) in seconds
    pub adaptive_pause_secs: u64,
    /// Directory holding the dataset, backups and archives
    pub data_dir: PathBuf,
    /// Dataset file name inside the data directory
    pub dataset_file: String,
    /// Minimum record count a fresh listing must reach before a sync commits
    pub min_records: usize,
    /// Minimum integrity score (clean / input) a fresh listing must reach
    pub min_integrity_score: f64,
    /// Maximum absolute record-count change (percent) vs the stored dataset
    pub max_change_percent: f64,
    /// Days to keep dataset backups before cleanup removes them
    pub backup_keep_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 500,
            min_delay_ms: 4_000,
            max_delay_ms: 10_000,
            long_break_after: 100,
            long_break_secs: 60,
            adaptive_pause_secs: 600,
            data_dir: PathBuf::from("data"),
            dataset_file: "rx.json".to_string(),
            min_records: 80_000,
            min_integrity_score: 0.95,
            max_change_percent: 5.0,
            backup_keep_days: 30,
        }
    }
}

impl Config {
    /// Build a configuration from defaults overridden by `RX_*` environment
    /// variables. Invalid values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from defaults overridden by an arbitrary
    /// key/value lookup. This is what [`Config::from_env`] delegates to.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("RX_BASE_URL") {
            config.base_url = url;
        }
        if let Some(agent) = lookup("RX_USER_AGENT") {
            config.user_agent = agent;
        }
        override_parsed(&mut config.timeout_secs, "RX_TIMEOUT_SECS", lookup("RX_TIMEOUT_SECS"));
        override_parsed(&mut config.max_retries, "RX_MAX_RETRIES", lookup("RX_MAX_RETRIES"));
        override_parsed(&mut config.min_delay_ms, "RX_MIN_DELAY_MS", lookup("RX_MIN_DELAY_MS"));
        override_parsed(&mut config.max_delay_ms, "RX_MAX_DELAY_MS", lookup("RX_MAX_DELAY_MS"));
        override_parsed(&mut config.min_records, "RX_MIN_RECORDS", lookup("RX_MIN_RECORDS"));
        override_parsed(
            &mut config.min_integrity_score,
            "RX_MIN_INTEGRITY",
            lookup("RX_MIN_INTEGRITY"),
        );
        override_parsed(
            &mut config.max_change_percent,
            "RX_MAX_CHANGE_PERCENT",
            lookup("RX_MAX_CHANGE_PERCENT"),
        );
        if let Some(dir) = lookup("RX_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        config
    }

    /// Absolute-or-relative path of the dataset file.
    #[must_use]
    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.dataset_file)
    }
}

/// Replace `slot` with the parsed value when one is present and valid.
fn override_parsed<T>(slot: &mut T, key: &str, raw: Option<String>)
where
    T: FromStr + Display,
{
    if let Some(raw) = raw {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => log::warn!("ignoring invalid value for {key}: {raw} (keeping {slot})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_expectations() {
        let config = Config::default();
        assert_eq!(config.min_delay_ms, 4_000);
        assert_eq!(config.max_delay_ms, 10_000);
        assert_eq!(config.long_break_after, 100);
        assert_eq!(config.min_records, 80_000);
        assert!((config.min_integrity_score - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.dataset_path(), PathBuf::from("data").join("rx.json"));
    }

    #[test]
    fn lookup_overrides_take_effect() {
        let config = Config::from_lookup(|key| match key {
            "RX_BASE_URL" => Some("http://localhost:8080".to_string()),
            "RX_MIN_RECORDS" => Some("25".to_string()),
            "RX_MAX_CHANGE_PERCENT" => Some("12.5".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.min_records, 25);
        assert!((config.max_change_percent - 12.5).abs() < f64::EPSILON);
        // Untouched keys keep their defaults.
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn invalid_override_keeps_default() {
        let config = Config::from_lookup(|key| {
            (key == "RX_TIMEOUT_SECS").then(|| "not-a-number".to_string())
        });
        assert_eq!(config.timeout_secs, 30);
    }
}
