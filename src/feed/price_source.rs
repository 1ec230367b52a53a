use std::sync::Arc;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{ACCEPT, CACHE_CONTROL, COOKIE, USER_AGENT};
use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::feed::PriceStrategy;
use crate::feed::session::SessionCookies;
use crate::model::{Currency, FeedQuote};

const FEED_NAME: &str = "price feed";
/// The feed reports prices multiplied by 10^5.
const PRICE_SCALE: f64 = 100_000.0;
const USD_FIELD: &str = "raw_price";
const TWD_FIELD: &str = "raw_price_in_twd";

/// Client for the upstream price feed.
///
/// A stale session makes the feed answer with a body that isn't JSON. When
/// that happens the cookies on the failed response are kept and the request
/// is retried after `retry_delay`, up to the caller's budget.
pub struct PriceSource {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
    retry_delay: Duration,
    cookies: SessionCookies,
    rate_limiter: DefaultDirectRateLimiter,
}

impl PriceSource {
    pub fn new(client: reqwest::Client, config: &FeedConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            user_agent: config.user_agent.clone(),
            retry_delay: config.retry_delay(),
            cookies: SessionCookies::new(),
            rate_limiter: RateLimiter::direct(Quota::per_second(config.requests_per_second)),
        }
    }

    /// Fetch the current quote for `symbol`, issuing at most `max_retries`
    /// requests. A budget of zero fails without touching the network.
    pub async fn fetch_quote(
        &self,
        symbol: &str,
        max_retries: u32,
    ) -> Result<FeedQuote, Report<FeedError>> {
        let url = format!("{}/{}-usd/", self.base_url, symbol.to_lowercase());
        let mut remaining = max_retries;

        while remaining > 0 {
            self.rate_limiter.until_ready().await;

            let response = self.request(&url).await?;
            let set_cookies: Vec<(String, String)> = response
                .cookies()
                .map(|c| (c.name().to_owned(), c.value().to_owned()))
                .collect();
            let body = response
                .bytes()
                .await
                .change_context(FeedError::Transport {
                    feed: FEED_NAME.into(),
                })
                .attach_with(|| format!("url: {url}"))?;

            match serde_json::from_slice::<Map<String, Value>>(&body) {
                Ok(fields) => {
                    let quote = decode_quote(&fields)?;
                    debug!(symbol, usd = quote.usd, twd = quote.twd, "feed quote");
                    return Ok(quote);
                }
                Err(e) => {
                    remaining -= 1;
                    self.cookies.merge(set_cookies);
                    warn!(
                        symbol,
                        error = %e,
                        remaining,
                        "unparseable feed response, refreshing session"
                    );
                    if remaining > 0 {
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(Report::new(FeedError::RetryExhausted {
            feed: FEED_NAME.into(),
            attempts: max_retries,
        })
        .attach(format!("url: {url}")))
    }

    async fn request(&self, url: &str) -> Result<reqwest::Response, Report<FeedError>> {
        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT, "*/*")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(cookie) = self.cookies.header_value() {
            request = request.header(COOKIE, cookie);
        }

        request
            .send()
            .await
            .change_context(FeedError::Transport {
                feed: FEED_NAME.into(),
            })
            .attach_with(|| format!("url: {url}"))
    }
}

fn decode_quote(fields: &Map<String, Value>) -> Result<FeedQuote, Report<FeedError>> {
    Ok(FeedQuote {
        usd: scaled_field(fields, USD_FIELD)?,
        twd: scaled_field(fields, TWD_FIELD)?,
    })
}

fn scaled_field(fields: &Map<String, Value>, field: &str) -> Result<f64, Report<FeedError>> {
    let value = fields.get(field).ok_or_else(|| {
        Report::new(FeedError::MissingField {
            feed: FEED_NAME.into(),
            field: field.into(),
        })
    })?;
    let raw = value.as_f64().ok_or_else(|| {
        Report::new(FeedError::TypeMismatch {
            feed: FEED_NAME.into(),
            field: field.into(),
        })
        .attach(format!("value: {value}"))
    })?;
    Ok(raw / PRICE_SCALE)
}

/// Asset priced straight from the feed.
pub struct DirectFeed {
    source: Arc<PriceSource>,
    symbol: String,
    currency: Currency,
    max_retries: u32,
}

impl DirectFeed {
    pub fn new(
        source: Arc<PriceSource>,
        symbol: &str,
        currency: Currency,
        max_retries: u32,
    ) -> Self {
        Self {
            source,
            symbol: symbol.to_owned(),
            currency,
            max_retries,
        }
    }
}

impl PriceStrategy for DirectFeed {
    fn fetch_price(&self) -> BoxFuture<'_, Result<f64, Report<FeedError>>> {
        Box::pin(async move {
            let quote = self.source.fetch_quote(&self.symbol, self.max_retries).await?;
            Ok(quote.in_currency(self.currency))
        })
    }
}
