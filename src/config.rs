use std::collections::HashSet;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use nonzero_ext::nonzero;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{Currency, Pricing, TrackedAsset};

/// Configuration compiled into the binary, used when no file is given.
const DEFAULT_CONFIG: &str = include_str!("../config.toml");

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_4) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36";

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_max_silence_minutes() -> u64 {
    6 * 60
}

fn default_feed_url() -> String {
    "https://www.maicoin.com/api/prices".into()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_requests_per_second() -> NonZeroU32 {
    nonzero!(4u32)
}

fn default_ticker_url() -> String {
    "https://poloniex.com/public?command=returnTicker".into()
}

fn default_webhook_url() -> String {
    "https://maker.ifttt.com".into()
}

fn default_currency() -> Currency {
    Currency::Twd
}

fn default_pricing() -> Pricing {
    Pricing::Direct
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub ticker: TickerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Silence bound for assets that don't set their own.
    #[serde(default = "default_max_silence_minutes")]
    pub max_silence_minutes: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            poll_interval_secs: default_poll_interval_secs(),
            max_silence_minutes: default_max_silence_minutes(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: NonZeroU32,
}

impl FeedConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_url(),
            user_agent: default_user_agent(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TickerConfig {
    #[serde(default = "default_ticker_url")]
    pub url: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: NonZeroU32,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            url: default_ticker_url(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_url")]
    pub base_url: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: default_webhook_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    /// Webhook event name; defaults to the lowercase symbol.
    pub event: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: Currency,
    #[serde(default = "default_pricing")]
    pub pricing: Pricing,
    pub percent_threshold: f64,
    pub absolute_threshold: f64,
    pub max_silence_minutes: Option<u64>,
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.general.poll_interval_secs)
    }

    /// Build one `TrackedAsset` per configured asset.
    pub fn tracked_assets(&self) -> Vec<TrackedAsset> {
        self.assets
            .iter()
            .map(|asset| {
                let symbol = asset.symbol.to_lowercase();
                let silence = asset
                    .max_silence_minutes
                    .unwrap_or(self.general.max_silence_minutes);
                TrackedAsset {
                    event: asset.event.clone().unwrap_or_else(|| symbol.clone()),
                    symbol,
                    currency: asset.currency,
                    pricing: asset.pricing.clone(),
                    percent_threshold: asset.percent_threshold,
                    absolute_threshold: asset.absolute_threshold,
                    max_silence: Duration::from_secs(silence * 60),
                }
            })
            .collect()
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    parse(&content)
}

/// Load the built-in configuration.
pub fn load_default() -> Result<AppConfig, Report<ConfigError>> {
    parse(DEFAULT_CONFIG)
}

fn parse(content: &str) -> Result<AppConfig, Report<ConfigError>> {
    let config: AppConfig = toml::from_str(content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_assets_present(config)?;
    validate_symbols_unique(config)?;
    validate_thresholds(config)?;
    validate_pricing(config)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.general.poll_interval_secs == 0 {
        return Err(invalid("general.poll_interval_secs must be positive".into()));
    }
    if config.feed.max_retries == 0 {
        return Err(invalid("feed.max_retries must be at least 1".into()));
    }
    Ok(())
}

fn validate_assets_present(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.assets.is_empty() {
        return Err(invalid("assets: at least one asset is required".into()));
    }
    Ok(())
}

fn validate_symbols_unique(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let mut seen = HashSet::new();
    for asset in &config.assets {
        let symbol = asset.symbol.to_lowercase();
        if symbol.is_empty() {
            return Err(invalid("assets: symbol must not be empty".into()));
        }
        if !seen.insert(symbol) {
            return Err(invalid(format!(
                "assets: duplicate symbol \"{}\"",
                asset.symbol
            )));
        }
    }
    Ok(())
}

fn is_positive(value: f64) -> bool {
    value > 0.0
}

fn validate_thresholds(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    for asset in &config.assets {
        if !is_positive(asset.percent_threshold) {
            return Err(invalid(format!(
                "assets[\"{}\"].percent_threshold must be positive",
                asset.symbol
            )));
        }
        if !is_positive(asset.absolute_threshold) {
            return Err(invalid(format!(
                "assets[\"{}\"].absolute_threshold must be positive",
                asset.symbol
            )));
        }
        if asset.max_silence_minutes == Some(0) {
            return Err(invalid(format!(
                "assets[\"{}\"].max_silence_minutes must be positive",
                asset.symbol
            )));
        }
    }
    Ok(())
}

fn validate_pricing(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    for asset in &config.assets {
        if let Pricing::Exchange { reference } = &asset.pricing {
            if reference.is_empty() {
                return Err(invalid(format!(
                    "assets[\"{}\"].pricing.reference must not be empty",
                    asset.symbol
                )));
            }
            if reference.eq_ignore_ascii_case(&asset.symbol) {
                return Err(invalid(format!(
                    "assets[\"{}\"].pricing.reference must differ from the asset",
                    asset.symbol
                )));
            }
        }
    }
    Ok(())
}
