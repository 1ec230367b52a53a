use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::feed::PriceStrategy;
use crate::model::{AlertSignal, PriceSample, TrackedAsset};

/// Which bound a price movement crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Trigger {
    #[display("ratio threshold")]
    Ratio,
    #[display("absolute threshold")]
    Absolute,
    #[display("silence timeout")]
    Silence,
}

/// Outcome of feeding one sample to an evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// First sample; recorded as the reference price, nothing sent.
    Baseline,
    Quiet,
    Alert { trigger: Trigger, signal: AlertSignal },
}

#[derive(Debug, Clone, Default)]
pub struct EvaluatorState {
    /// Price of the last notification, `0.0` until a baseline exists.
    pub last_price: f64,
    pub last_notified_at: Option<Instant>,
}

/// Per-asset alert state machine.
#[derive(Debug)]
pub struct AlertEvaluator {
    asset: Arc<TrackedAsset>,
    state: EvaluatorState,
}

impl AlertEvaluator {
    pub fn new(asset: Arc<TrackedAsset>) -> Self {
        Self {
            asset,
            state: EvaluatorState::default(),
        }
    }

    pub fn state(&self) -> &EvaluatorState {
        &self.state
    }

    /// Decide whether `sample` warrants a notification. The state is updated
    /// before the signal is handed back.
    pub fn observe(&mut self, sample: PriceSample, now: Instant) -> Evaluation {
        let last = self.state.last_price;

        if last == 0.0 {
            self.state.last_price = sample.price;
            self.state.last_notified_at = Some(now);
            return Evaluation::Baseline;
        }

        let silence = self
            .state
            .last_notified_at
            .map_or(Duration::ZERO, |at| now.saturating_duration_since(at));

        let Some(trigger) = check_thresholds(&self.asset, sample.price, last, silence) else {
            return Evaluation::Quiet;
        };

        self.state.last_price = sample.price;
        self.state.last_notified_at = Some(now);

        Evaluation::Alert {
            trigger,
            signal: AlertSignal {
                symbol: self.asset.symbol.clone(),
                event: self.asset.event.clone(),
                current: sample.price,
                last,
                observed_at: sample.observed_at,
            },
        }
    }
}

/// All comparisons are strict: a value exactly at a bound doesn't fire.
pub fn check_thresholds(
    asset: &TrackedAsset,
    current: f64,
    last: f64,
    silence: Duration,
) -> Option<Trigger> {
    let ratio = current / last;
    let diff = current - last;

    if ratio.abs() > asset.percent_threshold {
        Some(Trigger::Ratio)
    } else if diff.abs() > asset.absolute_threshold {
        Some(Trigger::Absolute)
    } else if silence > asset.max_silence {
        Some(Trigger::Silence)
    } else {
        None
    }
}

/// Poll `pricing` every `interval` and send qualifying alerts into `tx`.
///
/// Fetch errors are logged and the loop carries on. Returns only when the
/// receiving side of `tx` is gone.
pub async fn run(
    asset: Arc<TrackedAsset>,
    pricing: Arc<dyn PriceStrategy>,
    tx: mpsc::Sender<AlertSignal>,
    interval: Duration,
) {
    let mut evaluator = AlertEvaluator::new(Arc::clone(&asset));
    let symbol = asset.symbol.as_str();

    loop {
        match pricing.fetch_price().await {
            Err(e) => {
                warn!(symbol, error = ?e, "price fetch failed");
            }
            Ok(price) => {
                info!(
                    symbol,
                    current = price,
                    last = evaluator.state().last_price,
                    "price sampled"
                );

                match evaluator.observe(PriceSample::now(price), Instant::now()) {
                    Evaluation::Baseline => {
                        info!(symbol, price, "baseline established");
                    }
                    Evaluation::Quiet => {
                        debug!(symbol, "within thresholds");
                    }
                    Evaluation::Alert { trigger, signal } => {
                        info!(symbol, %trigger, "threshold crossed, pushing alert");
                        if tx.send(signal).await.is_err() {
                            warn!(symbol, "dispatcher gone, stopping evaluator");
                            return;
                        }
                    }
                }
            }
        }

        sleep(interval).await;
    }
}
