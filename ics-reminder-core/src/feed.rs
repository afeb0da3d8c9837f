//! Calendar feed download.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{ReminderError, ReminderResult};

/// Source of raw calendar text.
pub trait FeedSource {
    fn fetch(&self) -> impl Future<Output = ReminderResult<String>> + Send;
}

/// A feed served over HTTP(S).
pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpFeed {
    pub fn new(url: &str, timeout: Duration) -> ReminderResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ics-reminder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ReminderError::Transport(e.to_string()))?;

        Ok(HttpFeed {
            client,
            url: normalize_url(url),
            timeout,
        })
    }
}

impl FeedSource for HttpFeed {
    async fn fetch(&self) -> ReminderResult<String> {
        debug!(url = %self.url, timeout_secs = self.timeout.as_secs(), "Fetching feed");

        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?
            .error_for_status()
            .map_err(|e| transport_error(e, self.timeout))?;

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        debug!(bytes = text.len(), "Fetched feed");
        Ok(text)
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> ReminderError {
    if err.is_timeout() {
        ReminderError::Transport(format!("request timed out after {}s", timeout.as_secs()))
    } else {
        ReminderError::Transport(err.to_string())
    }
}

/// `webcal://` is plain HTTPS as far as fetching goes.
fn normalize_url(url: &str) -> String {
    let url = url.trim();
    match url.strip_prefix("webcal://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}
