use std::time::Duration;

use async_trait::async_trait;
use dialogrs_core::{
    DialogError, DialogRequest, DialogResponse, DialogTransport, ErrorBody, Result,
};
use tracing::{debug, warn};

/// Drives a dialog engine reachable at `POST {endpoint}`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DialogError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DialogTransport for HttpTransport {
    async fn send(&self, request: DialogRequest) -> Result<DialogResponse> {
        debug!(
            "Sending {} {} to {}",
            request.method(),
            request.name(),
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DialogError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<DialogResponse>()
                .await
                .map_err(|e| DialogError::Transport(format!("malformed response: {e}")));
        }

        let body = response
            .json::<ErrorBody>()
            .await
            .map_err(|e| DialogError::Transport(format!("{status} without error body: {e}")))?;
        warn!("Remote engine answered {status}: {}", body.message);
        Err(body.into_error())
    }
}
