pub mod converter;
pub mod price_source;
pub mod session;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::FeedError;

/// How one asset's current price is obtained.
///
/// Uses `BoxFuture` so evaluators can hold any strategy as
/// `Arc<dyn PriceStrategy>`.
pub trait PriceStrategy: Send + Sync {
    fn fetch_price(&self) -> BoxFuture<'_, Result<f64, Report<FeedError>>>;
}
