use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::EmailFormat;

const RESEND_API_URL: &str = "https://api.resend.com";

#[derive(Debug, Serialize)]
struct SendEmailRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

pub struct ResendClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ResendClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, RESEND_API_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key,
            base_url,
        }
    }

    /// Send one email through the Resend API and return the provider's
    /// email id.
    pub async fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
        format: EmailFormat,
    ) -> Result<String> {
        let (html, text) = match format {
            EmailFormat::Html => (Some(body.to_string()), None),
            EmailFormat::Text => (None, Some(body.to_string())),
        };

        let request = SendEmailRequest {
            from: from.to_string(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html,
            text,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::EmailApi(format!("API error: {}", error_text)));
        }

        let email_response: SendEmailResponse = response.json().await?;
        Ok(email_response.id)
    }
}
