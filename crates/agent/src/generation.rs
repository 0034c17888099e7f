use std::time::{Duration, Instant};

use async_trait::async_trait;
use dialtone_core::config::GenerationConfig;
use dialtone_core::{messages, GenerationOutcome};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> GenerationOutcome;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct HttpGenerationClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpGenerationClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self::with_client(Client::new(), base_url, timeout)
    }

    pub fn with_client(client: Client, base_url: &str, timeout: Duration) -> Self {
        let endpoint = format!("{}/generate", base_url.trim().trim_end_matches('/'));
        Self { client, endpoint, timeout }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, prompt: &str) -> GenerationOutcome {
        let response = match self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&GenerateRequest { prompt })
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return transport_outcome(&err),
        };

        let status = response.status();
        if !status.is_success() {
            return GenerationOutcome::BackendError(status.as_u16());
        }

        match response.json::<GenerateResponse>().await {
            Ok(body) => {
                let text = body
                    .response
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| messages::GENERATION_MISSING_FIELD.to_string());
                GenerationOutcome::Success(text)
            }
            Err(err) => transport_outcome(&err),
        }
    }
}

fn transport_outcome(err: &reqwest::Error) -> GenerationOutcome {
    if err.is_timeout() {
        GenerationOutcome::Timeout
    } else {
        GenerationOutcome::TransportError
    }
}

#[async_trait]
impl TextGenerator for HttpGenerationClient {
    async fn generate(&self, prompt: &str) -> GenerationOutcome {
        let started = Instant::now();
        let outcome = self.attempt(prompt).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &outcome {
            GenerationOutcome::Success(_) => debug!(
                event_name = "generation.completed",
                endpoint = %self.endpoint,
                elapsed_ms,
                "generation backend answered"
            ),
            GenerationOutcome::BackendError(status) => error!(
                event_name = "generation.backend_error",
                endpoint = %self.endpoint,
                status = *status,
                elapsed_ms,
                "generation backend returned an error status"
            ),
            failure => error!(
                event_name = "generation.failed",
                endpoint = %self.endpoint,
                outcome = failure.kind(),
                elapsed_ms,
                "error processing with generation backend"
            ),
        }

        outcome
    }
}
