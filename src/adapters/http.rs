use crate::core::Fetcher;
use crate::utils::error::{IanaError, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;

const USER_AGENT: &str = concat!("iana-etc/", env!("CARGO_PKG_VERSION"));

/// Downloads registry documents, retrying failed attempts after a fixed delay.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, retry_attempts: u32, retry_delay: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            retry_attempts,
            retry_delay,
        })
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<String, AttemptError> {
        let fetch_error = |message: String| IanaError::FetchError {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(fetch_error(e.to_string())))?;

        let status = response.status();
        tracing::debug!("Response status from {}: {}", url, status);

        if !status.is_success() {
            let error = fetch_error(format!("HTTP status {}", status));
            // 只有伺服器端錯誤與 429 值得重試
            return Err(
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    AttemptError::Transient(error)
                } else {
                    AttemptError::Permanent(error)
                },
            );
        }

        response
            .text()
            .await
            .map_err(|e| AttemptError::Transient(fetch_error(e.to_string())))
    }
}

/// Outcome of a failed attempt.
enum AttemptError {
    /// Connection failures, 5xx and 429.
    Transient(IanaError),
    /// Other statuses, such as 404.
    Permanent(IanaError),
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(body) => {
                    tracing::debug!("Downloaded {} bytes from {}", body.len(), url);
                    return Ok(body);
                }
                Err(AttemptError::Transient(e)) if attempt <= self.retry_attempts => {
                    tracing::warn!(
                        "⚠️ Attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        self.retry_attempts + 1,
                        e,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(AttemptError::Transient(e)) | Err(AttemptError::Permanent(e)) => return Err(e),
            }
        }
    }
}
