use std::collections::HashMap;
use std::sync::Arc;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use tracing::debug;

use crate::config::TickerConfig;
use crate::error::FeedError;
use crate::feed::PriceStrategy;
use crate::feed::price_source::PriceSource;
use crate::model::Currency;

const TICKER_NAME: &str = "exchange ticker";

/// Prices an asset indirectly: exchange rate against a reference asset from
/// the ticker, times the reference asset's feed price.
pub struct ExchangeConverter {
    client: reqwest::Client,
    url: String,
    source: Arc<PriceSource>,
    rate_limiter: DefaultDirectRateLimiter,
}

impl ExchangeConverter {
    pub fn new(client: reqwest::Client, config: &TickerConfig, source: Arc<PriceSource>) -> Self {
        Self {
            client,
            url: config.url.clone(),
            source,
            rate_limiter: RateLimiter::direct(Quota::per_second(config.requests_per_second)),
        }
    }

    /// Last traded rate of `base` quoted in `reference`.
    pub async fn fetch_rate(&self, base: &str, reference: &str) -> Result<f64, Report<FeedError>> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .change_context(FeedError::Transport {
                feed: TICKER_NAME.into(),
            })
            .attach_with(|| format!("url: {}", self.url))?;

        let tickers: HashMap<String, TickerEntry> = response
            .json()
            .await
            .change_context(FeedError::Parse {
                feed: TICKER_NAME.into(),
            })
            .attach_with(|| format!("url: {}", self.url))?;

        let pair = ticker_pair(base, reference);
        let last = tickers
            .get(&pair)
            .and_then(|entry| entry.last.as_deref())
            .ok_or_else(|| {
                Report::new(FeedError::NoExchangeRate { pair: pair.clone() })
            })?;

        let rate = last
            .parse::<f64>()
            .change_context(FeedError::Parse {
                feed: TICKER_NAME.into(),
            })
            .attach_with(|| format!("pair: {pair}, last: {last}"))?;

        // `parse` accepts "NaN" and "inf"; neither is a usable rate.
        if !rate.is_finite() {
            return Err(Report::new(FeedError::Parse {
                feed: TICKER_NAME.into(),
            })
            .attach(format!("pair: {pair}, non-finite last: {last}")));
        }

        Ok(rate)
    }

    /// `base` priced in `currency` through `reference`. Fails if either the
    /// rate or the reference price can't be fetched.
    pub async fn fetch_cross_price(
        &self,
        base: &str,
        reference: &str,
        currency: Currency,
        max_retries: u32,
    ) -> Result<f64, Report<FeedError>> {
        let rate = self.fetch_rate(base, reference).await?;
        let quote = self.source.fetch_quote(reference, max_retries).await?;
        let reference_price = quote.in_currency(currency);

        debug!(base, reference, rate, reference_price, "cross price");
        Ok(rate * reference_price)
    }
}

fn ticker_pair(base: &str, reference: &str) -> String {
    format!("{}_{}", reference.to_uppercase(), base.to_uppercase())
}

// ── Ticker response types ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TickerEntry {
    /// Decimal string, e.g. `"0.00213"`.
    #[serde(default)]
    last: Option<String>,
}

/// Asset priced through an exchange rate.
pub struct ExchangeConverted {
    converter: Arc<ExchangeConverter>,
    base: String,
    reference: String,
    currency: Currency,
    max_retries: u32,
}

impl ExchangeConverted {
    pub fn new(
        converter: Arc<ExchangeConverter>,
        base: &str,
        reference: &str,
        currency: Currency,
        max_retries: u32,
    ) -> Self {
        Self {
            converter,
            base: base.to_owned(),
            reference: reference.to_owned(),
            currency,
            max_retries,
        }
    }
}

impl PriceStrategy for ExchangeConverted {
    fn fetch_price(&self) -> BoxFuture<'_, Result<f64, Report<FeedError>>> {
        Box::pin(self.converter.fetch_cross_price(
            &self.base,
            &self.reference,
            self.currency,
            self.max_retries,
        ))
    }
}
