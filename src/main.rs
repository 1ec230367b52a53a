mod config;
mod dispatcher;
mod error;
mod evaluator;
mod feed;
mod model;
mod notifier;
#[cfg(test)]
mod testutil;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use feed::PriceStrategy;
use feed::converter::{ExchangeConverted, ExchangeConverter};
use feed::price_source::{DirectFeed, PriceSource};
use model::{AlertSignal, Pricing, TrackedAsset};
use notifier::Notifier;
use notifier::terminal::TerminalNotifier;
use notifier::webhook::WebhookNotifier;

const HTTP_TIMEOUT_SECS: u64 = 30;
/// Alerts waiting for the dispatcher before evaluators block on send.
const SIGNAL_BUFFER: usize = 64;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "price-notifier", about = "Crypto price movement notifier")]
struct Cli {
    /// Path to a TOML configuration file; the built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Webhook trigger key; alerts are only logged when absent
    #[arg(long, env = "WEBHOOK_TOKEN", hide_env_values = true)]
    webhook_token: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load(path),
        None => config::load_default(),
    }
    .change_context(AppError::Config)?;

    init_tracing(&config);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .change_context(AppError::Runtime)?;

    // ── Price sources ─────────────────────────────────────────────────────────
    let source = Arc::new(PriceSource::new(client.clone(), &config.feed));
    let converter = Arc::new(ExchangeConverter::new(
        client.clone(),
        &config.ticker,
        Arc::clone(&source),
    ));

    // ── Notifier ──────────────────────────────────────────────────────────────
    let notifier: Arc<dyn Notifier> = match cli.webhook_token {
        Some(token) => Arc::new(WebhookNotifier::new(client, &config.webhook.base_url, token)),
        None => {
            warn!("no webhook token configured; alerts will only be logged");
            Arc::new(TerminalNotifier)
        }
    };

    // ── Evaluators ────────────────────────────────────────────────────────────
    let (signal_tx, signal_rx) = mpsc::channel::<AlertSignal>(SIGNAL_BUFFER);

    for asset in config.tracked_assets() {
        let pricing = build_pricing(&asset, &source, &converter, config.feed.max_retries);
        info!(
            symbol = %asset.symbol,
            event = %asset.event,
            currency = %asset.currency,
            percent_threshold = asset.percent_threshold,
            absolute_threshold = asset.absolute_threshold,
            max_silence_secs = asset.max_silence.as_secs(),
            "starting evaluator"
        );
        tokio::spawn(evaluator::run(
            Arc::new(asset),
            pricing,
            signal_tx.clone(),
            config.poll_interval(),
        ));
    }

    // Drop the original sender so the dispatcher ends if every evaluator stops
    drop(signal_tx);

    let dispatch_handle = tokio::spawn(dispatcher::dispatch(signal_rx, notifier));

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.change_context(AppError::Runtime)?;
            info!("ctrl+c received, exiting");
        }
        result = dispatch_handle => {
            result.change_context(AppError::Runtime)?;
            warn!("dispatcher finished unexpectedly, exiting");
        }
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

fn build_pricing(
    asset: &TrackedAsset,
    source: &Arc<PriceSource>,
    converter: &Arc<ExchangeConverter>,
    max_retries: u32,
) -> Arc<dyn PriceStrategy> {
    match &asset.pricing {
        Pricing::Direct => Arc::new(DirectFeed::new(
            Arc::clone(source),
            &asset.symbol,
            asset.currency,
            max_retries,
        )),
        Pricing::Exchange { reference } => Arc::new(ExchangeConverted::new(
            Arc::clone(converter),
            &asset.symbol,
            reference,
            asset.currency,
            max_retries,
        )),
    }
}
