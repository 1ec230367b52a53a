use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error, PartialEq)]
pub enum FeedError {
    #[display("request to {feed} failed")]
    Transport { feed: String },
    #[display("failed to parse response from {feed}")]
    Parse { feed: String },
    #[display("{feed} still unparseable after {attempts} attempts")]
    RetryExhausted { feed: String, attempts: u32 },
    #[display("missing field {field} in {feed} response")]
    MissingField { feed: String, field: String },
    #[display("field {field} in {feed} response has an unexpected type")]
    TypeMismatch { feed: String, field: String },
    #[display("no exchange rate for pair {pair}")]
    NoExchangeRate { pair: String },
}

#[derive(Debug, Display, Error)]
pub enum NotifyError {
    #[display("webhook request for event {event} failed")]
    Request { event: String },
    #[display("webhook for event {event} returned status {status}")]
    Status { event: String, status: u16 },
}
