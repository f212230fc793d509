use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{Error, Result};

const USER_AGENT: &str = "IndieGameDiscover/1.0";

/// Exponential backoff wait before retrying `attempt` (zero-based).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Drives `send` until it yields a usable response or the attempt budget is
/// exhausted.
///
/// 429 and network-level failures are retried with exponential backoff; any
/// other non-2xx status fails immediately so callers can decide recovery
/// policy per status.
pub(crate) async fn retry_request<F, Fut>(
    max_attempts: u32,
    backoff_base: Duration,
    mut send: F,
) -> Result<Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<Response>>,
{
    let mut last_status: Option<u16> = None;

    for attempt in 0..max_attempts {
        match send().await {
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    last_status = Some(status.as_u16());
                    let wait = backoff_delay(backoff_base, attempt);
                    warn!(attempt, wait_ms = wait.as_millis() as u64, "rate limited (429), backing off");
                    sleep(wait).await;
                    continue;
                }
                if !status.is_success() {
                    return Err(Error::Upstream {
                        status: status.as_u16(),
                        status_text: status
                            .canonical_reason()
                            .unwrap_or("unknown status")
                            .to_string(),
                    });
                }
                return Ok(resp);
            }
            Err(err) => {
                last_status = err.status().map(|s| s.as_u16());
                if attempt + 1 < max_attempts {
                    let wait = backoff_delay(backoff_base, attempt);
                    warn!(attempt, error = %err, wait_ms = wait.as_millis() as u64, "request failed, backing off");
                    sleep(wait).await;
                }
            }
        }
    }

    Err(Error::TransientUpstream {
        attempts: max_attempts,
        last_status,
    })
}

/// Thin wrapper over `reqwest::Client` that retries transient failures.
///
/// Every call can block on real wall-clock backoff, so callers must treat a
/// request as a long-running operation.
#[derive(Clone)]
pub struct RetryClient {
    http: Client,
    max_attempts: u32,
    backoff_base: Duration,
}

impl RetryClient {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            max_attempts,
            backoff_base,
        }
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        retry_request(self.max_attempts, self.backoff_base, || {
            self.http.get(url).send()
        })
        .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        Ok(self.get(url).await?.json::<T>().await?)
    }
}
