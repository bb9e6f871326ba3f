use crate::config::FetchConfig;
use crate::types::{EnricherError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Thin wrapper around one shared HTTP client. Every outbound GET carries
/// the configured timeout so a slow host can only stall its own entry.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .gzip(true)
            .build()
            .map_err(EnricherError::Http)?;

        Ok(Self { client })
    }

    /// Single GET; a non-2xx status is an error just like a transport
    /// failure. Callers decide whether to degrade or propagate.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("Fetching: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnricherError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
