use crate::config::ChatConfig;
use crate::messages::ConversationMessage;
use crate::{ReverieError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Outbound interpretation request: the latest user text plus the full
/// projected history.
#[derive(Debug, Clone, Serialize)]
pub struct InterpretRequest {
    pub message: String,
    pub conversation: Vec<ConversationMessage>,
}

/// Service reply. Both fields are optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterpretResponse {
    pub id: Option<String>,
    pub message: Option<String>,
}

/// HTTP client for the dream interpretation service.
pub struct InterpreterClient {
    http: reqwest::Client,
    endpoint: String,
}

impl InterpreterClient {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ReverieError::ChatRequest(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    pub async fn interpret(&self, request: &InterpretRequest) -> Result<InterpretResponse> {
        debug!(
            "Requesting interpretation ({} history entries)",
            request.conversation.len()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ReverieError::ChatRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReverieError::ChatRequest(format!(
                "interpretation service returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ReverieError::ChatRequest(format!("Malformed response body: {e}")))
    }
}
