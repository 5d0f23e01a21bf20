use std::time::Duration;

use reqwest::Client;

use crate::error::{AppError, Result};

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(user_agent: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Fetch the raw document at a feed URL. No parsing happens here; the
    /// extractor deals with whatever text comes back.
    pub async fn fetch_raw(&self, url: &str) -> Result<String> {
        tracing::debug!("Fetching feed: {}", url);
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Feed(format!(
                "Failed to fetch feed {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let text = response.text().await?;
        tracing::debug!("Received {} characters from {}", text.len(), url);
        Ok(text)
    }
}
