use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::NotifyError;
use crate::model::AlertSignal;
use crate::notifier::{AlertPayload, Notifier};

/// Logs alerts instead of publishing them. Used when no webhook token is set.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify<'a>(
        &'a self,
        signal: &'a AlertSignal,
    ) -> BoxFuture<'a, Result<(), Report<NotifyError>>> {
        let payload = AlertPayload::from_signal(signal);
        tracing::warn!(
            event = %signal.event,
            current = signal.current,
            last = signal.last,
            observed_at = %signal.observed_at,
            "ALERT: {} {} {}",
            payload.value1,
            payload.value2,
            payload.value3,
        );
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn terminal_notifier_always_succeeds() {
        let signal = AlertSignal {
            symbol: "btc".into(),
            event: "btc".into(),
            current: 950.0,
            last: 1000.0,
            observed_at: Utc::now(),
        };
        TerminalNotifier.notify(&signal).await.unwrap();
    }
}
