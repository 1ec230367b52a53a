use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use reqwest::StatusCode;
use tracing::info;

use crate::error::NotifyError;
use crate::model::AlertSignal;
use crate::notifier::{AlertPayload, Notifier};

/// Publishes alerts to a maker-style webhook trigger:
/// `POST {base_url}/trigger/{event}/with/key/{token}`.
pub struct WebhookNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, base_url: &str, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
        }
    }

    fn trigger_url(&self, event: &str) -> String {
        format!("{}/trigger/{}/with/key/{}", self.base_url, event, self.token)
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(
        &'a self,
        signal: &'a AlertSignal,
    ) -> BoxFuture<'a, Result<(), Report<NotifyError>>> {
        Box::pin(async move {
            let payload = AlertPayload::from_signal(signal);

            let response = self
                .client
                .post(self.trigger_url(&signal.event))
                .json(&payload)
                .send()
                .await
                // The trigger URL carries the token; keep it out of the report.
                .map_err(reqwest::Error::without_url)
                .change_context(NotifyError::Request {
                    event: signal.event.clone(),
                })?;

            let status = response.status();
            if status != StatusCode::OK {
                return Err(Report::new(NotifyError::Status {
                    event: signal.event.clone(),
                    status: status.as_u16(),
                }));
            }

            info!(
                event = %signal.event,
                direction = %payload.value1,
                price = %payload.value2,
                change = %payload.value3,
                observed_at = %signal.observed_at,
                "webhook event pushed"
            );
            Ok(())
        })
    }
}
