use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::pipeline::{GeneratedArtifact, PipelineError, PipelineJob, ProcessingPipeline};

#[derive(Debug, Deserialize)]
struct SuccessBody {
    #[serde(default)]
    artifacts: Vec<GeneratedArtifact>,
}

#[derive(Debug, Deserialize)]
struct FailureBody {
    message: String,
}

/// Posts jobs to the pipeline's HTTP webhook.
#[derive(Clone)]
pub struct WebhookPipeline {
    client: Client,
    url: String,
}

impl WebhookPipeline {
    /// `timeout` bounds the HTTP exchange; the submission service applies its
    /// own deadline on top.
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url,
        })
    }
}

#[async_trait]
impl ProcessingPipeline for WebhookPipeline {
    async fn process(&self, job: &PipelineJob) -> Result<Vec<GeneratedArtifact>, PipelineError> {
        let response = self.client.post(&self.url).json(job).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let reason = parse_failure(&body);
            warn!("Pipeline returned {status}: {reason}");
            return Err(PipelineError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }

        let parsed: SuccessBody = serde_json::from_str(&body)?;
        debug!(
            "Pipeline succeeded with {} artifact(s)",
            parsed.artifacts.len()
        );
        Ok(parsed.artifacts)
    }
}

/// Extracts `message` from a failure payload, falling back to the raw body.
fn parse_failure(body: &str) -> String {
    serde_json::from_str::<FailureBody>(body)
        .map(|f| f.message)
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "Processing failed".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        })
}
