use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Currency an asset is quoted in.
///
/// The price feed reports every asset in both USD and TWD; this selects which
/// of the two fields an asset follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Twd,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usd => write!(f, "usd"),
            Self::Twd => write!(f, "twd"),
        }
    }
}

/// How an asset's price is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Pricing {
    /// Read straight from the price feed.
    Direct,
    /// Exchange rate against `reference`, multiplied by the reference price.
    Exchange { reference: String },
}

/// Normalized prices from one feed response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedQuote {
    pub usd: f64,
    pub twd: f64,
}

impl FeedQuote {
    pub fn in_currency(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Usd => self.usd,
            Currency::Twd => self.twd,
        }
    }
}

/// One asset being watched. Built once from config and shared read-only.
#[derive(Debug, Clone)]
pub struct TrackedAsset {
    pub symbol: String,
    /// Webhook event name the alert is published under.
    pub event: String,
    pub currency: Currency,
    pub pricing: Pricing,
    /// Bound on `|current / last|`.
    pub percent_threshold: f64,
    /// Bound on `|current - last|`, in `currency` units.
    pub absolute_threshold: f64,
    pub max_silence: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct PriceSample {
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    pub fn now(price: f64) -> Self {
        Self {
            price,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertSignal {
    pub symbol: String,
    pub event: String,
    pub current: f64,
    pub last: f64,
    pub observed_at: DateTime<Utc>,
}
