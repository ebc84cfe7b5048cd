use crate::error::ConfigError;
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analytics: AnalyticsConfig,
    pub pipeline: PipelineConfig,
    pub store: StoreConfig,
    pub alerts: AlertsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Checks the invariants serde cannot express.
    ///
    /// Credentials are not checked here; the analytics client fails its
    /// fetches without them, so commands that never fetch still work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analytics.lookback_days == 0 {
            return Err(ConfigError::ValidationError(
                "analytics.lookback_days must be greater than 0".to_string(),
            ));
        }
        if self.pipeline.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_retries must be greater than 0".to_string(),
            ));
        }
        if self.store.max_snapshots == 0 {
            return Err(ConfigError::ValidationError(
                "store.max_snapshots must be greater than 0".to_string(),
            ));
        }
        self.pipeline.schedule_time()?;
        Ok(())
    }
}

/// Connection settings for the GA4 Data API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// The numeric GA4 property id (also read from `GA4_PROPERTY_ID`).
    pub property_id: String,
    /// The trailing number of days fetched per cycle.
    pub lookback_days: u32,
    pub base_url: String,
    /// OAuth2 access token with the `analytics.readonly` scope (also read from `GA4_ACCESS_TOKEN`).
    pub access_token: String,
    /// The event counted as a conversion.
    pub conversion_event: String,
    /// Optional audience filter for the segments report.
    pub segment: String,
    pub request_timeout_secs: u64,
}

impl AnalyticsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            property_id: String::new(),
            lookback_days: 7,
            base_url: "https://analyticsdata.googleapis.com/v1beta".to_string(),
            access_token: String::new(),
            conversion_event: "form_contact_submitted".to_string(),
            segment: "all".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Retry policy and daily schedule of the forecast pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Total number of fetch attempts per cycle.
    pub max_retries: u32,
    /// Pause between two consecutive fetch attempts.
    pub retry_delay_secs: u64,
    pub timezone: Tz,
    /// Local time of the daily run, `HH:MM`.
    pub schedule_time: String,
    /// Run one cycle immediately when the scheduler starts.
    pub startup_smoke_test: bool,
}

impl PipelineConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Parses `schedule_time` into a wall-clock time.
    pub fn schedule_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.schedule_time.trim(), "%H:%M").map_err(|e| {
            ConfigError::ValidationError(format!(
                "pipeline.schedule_time '{}' is not HH:MM: {}",
                self.schedule_time, e
            ))
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 30,
            timezone: chrono_tz::Europe::Rome,
            schedule_time: "17:30".to_string(),
            startup_smoke_test: true,
        }
    }
}

/// Where forecast snapshots are written and how many are retained.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub forecast_dir: PathBuf,
    pub max_snapshots: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            forecast_dir: PathBuf::from("forecasts"),
            max_snapshots: 30,
        }
    }
}

/// Alert delivery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Recipient named in alert log lines (also read from `ADMIN_EMAIL`).
    pub admin_email: String,
    pub telegram: TelegramConfig,
    pub thresholds: ThresholdConfig,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            admin_email: "admin@example.com".to_string(),
            telegram: TelegramConfig::default(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

/// Telegram bot credentials. Alerts are only logged when either field is empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

/// Limits used by the metric threshold rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Fire when today's sessions fall below this share of the weekly average.
    pub traffic_drop_ratio: f64,
    /// Fire when the bounce rate, in percent, exceeds this value.
    pub max_bounce_rate_pct: f64,
    /// Fire when today's conversions exceed this multiple of the daily average.
    pub conversion_spike_ratio: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            traffic_drop_ratio: 0.70,
            max_bounce_rate_pct: 60.0,
            conversion_spike_ratio: 1.5,
        }
    }
}

/// The status API listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

/// Output format of console log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Json,
}

/// Log level and destinations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    pub dir: PathBuf,
    pub file_name: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: PathBuf::from("logs"),
            file_name: "forecast_scheduler.log".to_string(),
            format: LogFormat::Full,
        }
    }
}
