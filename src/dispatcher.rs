use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::model::AlertSignal;
use crate::notifier::Notifier;

/// Hand every signal from the merged evaluator channel to `notifier`, one at
/// a time. Failed notifications are logged and dropped.
///
/// Returns the number of signals handled once every sender is gone.
pub async fn dispatch(mut rx: mpsc::Receiver<AlertSignal>, notifier: Arc<dyn Notifier>) -> usize {
    let mut handled = 0;

    while let Some(signal) = rx.recv().await {
        handled += 1;
        if let Err(e) = notifier.notify(&signal).await {
            warn!(
                symbol = %signal.symbol,
                event = %signal.event,
                error = ?e,
                "notification failed"
            );
        }
    }

    info!(handled, "all evaluators stopped, dispatcher exiting");
    handled
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use error_stack::Report;
    use futures::future::BoxFuture;

    use super::*;
    use crate::error::NotifyError;

    /// Records every call; every other call fails.
    #[derive(Default)]
    struct FlakyNotifier {
        calls: Mutex<Vec<String>>,
    }

    impl Notifier for FlakyNotifier {
        fn notify<'a>(
            &'a self,
            signal: &'a AlertSignal,
        ) -> BoxFuture<'a, Result<(), Report<NotifyError>>> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(signal.symbol.clone());
            let fail = calls.len() % 2 == 0;
            let event = signal.event.clone();
            Box::pin(async move {
                if fail {
                    Err(Report::new(NotifyError::Status { event, status: 500 }))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn signal(symbol: &str, current: f64) -> AlertSignal {
        AlertSignal {
            symbol: symbol.into(),
            event: symbol.into(),
            current,
            last: 1.0,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn every_signal_reaches_notifier_despite_failures() {
        let (tx, rx) = mpsc::channel(8);
        let notifier = Arc::new(FlakyNotifier::default());

        for (i, symbol) in ["btc", "eth", "etc", "btc", "eth"].iter().enumerate() {
            tx.send(signal(symbol, i as f64)).await.unwrap();
        }
        drop(tx);

        let handled = dispatch(rx, notifier.clone()).await;
        assert_eq!(handled, 5);
        assert_eq!(
            *notifier.calls.lock().unwrap(),
            ["btc", "eth", "etc", "btc", "eth"]
        );
    }

    #[tokio::test]
    async fn merges_concurrent_producers() {
        let (tx, rx) = mpsc::channel(2);
        let notifier = Arc::new(FlakyNotifier::default());

        let producers: Vec<_> = ["btc", "eth", "etc"]
            .into_iter()
            .map(|symbol| {
                let tx = tx.clone();
                tokio::spawn(async move {
                    for i in 0..10 {
                        tx.send(signal(symbol, f64::from(i))).await.unwrap();
                    }
                })
            })
            .collect();
        drop(tx);

        let handled = dispatch(rx, notifier.clone()).await;
        for producer in producers {
            producer.await.unwrap();
        }

        assert_eq!(handled, 30);
        let calls = notifier.calls.lock().unwrap();
        for symbol in ["btc", "eth", "etc"] {
            assert_eq!(calls.iter().filter(|s| *s == symbol).count(), 10);
        }
    }
}
