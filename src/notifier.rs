pub mod terminal;
pub mod webhook;

use error_stack::Report;
use futures::future::BoxFuture;
use serde::Serialize;

use crate::error::NotifyError;
use crate::model::AlertSignal;

const UP: &str = "📈";
const DOWN: &str = "📉";

/// Sink for alert notifications.
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, signal: &'a AlertSignal)
    -> BoxFuture<'a, Result<(), Report<NotifyError>>>;
}

/// Body of a webhook trigger call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPayload {
    /// Direction emoji.
    pub value1: String,
    /// `"<SYMBOL> <price>"`.
    pub value2: String,
    /// Signed percent change.
    pub value3: String,
}

impl AlertPayload {
    pub fn from_signal(signal: &AlertSignal) -> Self {
        let ratio = signal.current / signal.last;
        let direction = if ratio > 1.0 { UP } else { DOWN };

        Self {
            value1: direction.to_owned(),
            value2: format!("{} {:.4}", signal.symbol.to_uppercase(), signal.current),
            value3: format!("{:+.2}", (ratio - 1.0) * 100.0),
        }
    }
}
