use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Default agent endpoint; override with `--endpoint` or the config file.
pub const DEFAULT_ENDPOINT: &str = "https://api-dev.provue.ai/api/webapp/agent/test-agent";

/// How a request to the weather agent can go wrong. Transport problems,
/// timeouts and error statuses are `RequestFailed`; a 2xx body that is not
/// JSON at all is `InvalidResponse` so schema drift shows up differently
/// from a dead network.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    RequestFailed(String),

    #[error("The weather agent sent an unrecognized response: {0}")]
    InvalidResponse(String),
}

#[derive(Serialize)]
struct AgentRequest {
    prompt: String,
    stream: bool,
}

/// HTTP client for the weather agent. Cheap to clone; the inner reqwest
/// client is shared.
#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    endpoint: String,
}

impl AgentClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Send one prompt and return the agent's reply text.
    ///
    /// `Ok(None)` means the agent answered 2xx with valid JSON but no usable
    /// reply field; the caller decides what to show for that.
    pub async fn ask(&self, prompt: &str) -> Result<Option<String>, AgentError> {
        let request = AgentRequest {
            prompt: prompt.to_string(),
            stream: false,
        };

        debug!(endpoint = %self.endpoint, "sending prompt to weather agent");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "weather agent request failed to complete");
                if e.is_timeout() {
                    AgentError::RequestFailed(
                        "The weather agent took too long to respond.".to_string(),
                    )
                } else {
                    AgentError::RequestFailed("Failed to fetch weather response.".to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "weather agent returned an error status");
            return Err(AgentError::RequestFailed(error_message(status, &body)));
        }

        let body = response.text().await.map_err(|e| {
            warn!(error = %e, "failed reading weather agent response body");
            AgentError::RequestFailed("Failed to fetch weather response.".to_string())
        })?;

        let value: Value = serde_json::from_str(&body)
            .map_err(|_| AgentError::InvalidResponse(preview(&body)))?;

        debug!("weather agent replied");
        Ok(extract_reply(&value))
    }
}

/// Pull the reply text out of a response body, tolerating the schema drift
/// the agent has shown over time: `data.response` first, then top-level
/// `response`, `output`, `answer`. Blank strings count as no reply.
fn extract_reply(value: &Value) -> Option<String> {
    let candidates = [
        value.pointer("/data/response"),
        value.get("response"),
        value.get("output"),
        value.get("answer"),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Some(text) = candidate.as_str() {
            if !text.trim().is_empty() {
                return Some(text.to_string());
            }
        }
    }

    None
}

/// Human-readable failure line for a non-2xx status. Prefers a `message`
/// field from the error body when one parses out.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            if !message.trim().is_empty() {
                return message.to_string();
            }
        }
    }
    format!("Request failed with status {}", status.as_u16())
}

/// First line of a body, capped, for error display.
fn preview(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default();
    let mut out: String = line.chars().take(120).collect();
    if out.len() < line.len() {
        out.push('…');
    }
    if out.is_empty() {
        out.push_str("(empty body)");
    }
    out
}
