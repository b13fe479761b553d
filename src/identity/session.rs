//! Partner session validation.
//!
//! A client id is exchanged for a session key with
//! `POST <validate_url>` carrying a `CLIENT-ID` header. Any non-success
//! status means the client id is wrong.

use std::time::Duration;

use async_trait::async_trait;
use log::{error, info};
use serde::Deserialize;

use crate::error::{LensError, LensResult};

#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Exchange a client id for a session key.
    async fn validate(&self, client_id: &str) -> LensResult<String>;
}

#[derive(Deserialize)]
struct ValidateResponse {
    session: String,
}

pub struct HttpSessionValidator {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSessionValidator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }

    /// Use a preconfigured client, e.g. one with custom proxy or TLS settings.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SessionValidator for HttpSessionValidator {
    async fn validate(&self, client_id: &str) -> LensResult<String> {
        let response = self
            .client
            .post(&self.url)
            .header("CLIENT-ID", client_id)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| LensError::from(e).with_address(self.url.clone()))?;

        if !response.status().is_success() {
            error!("[EVENT] Wrong client id (status {})", response.status());
            return Err(LensError::auth("validate_partner", "Wrong client id")
                .with_metadata("status", response.status().as_u16().to_string()));
        }

        let body: ValidateResponse = response.json().await?;
        info!("[EVENT] session validated");
        Ok(body.session)
    }
}
