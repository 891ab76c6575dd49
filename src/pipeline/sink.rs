//! Fused result delivery

use async_trait::async_trait;

use crate::emotion::FusedResult;
use crate::{Error, Result};

/// Consumes fused results, exactly once per emitted sequence number and
/// strictly in order
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Deliver one fused result
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sink`] if delivery fails; the pipeline logs and
    /// continues (a lost emission must not stall capture)
    async fn emit(&self, result: &FusedResult) -> Result<()>;
}

/// Logs fused results to the console via tracing
pub struct ConsoleSink;

#[async_trait]
impl ResultSink for ConsoleSink {
    async fn emit(&self, result: &FusedResult) -> Result<()> {
        tracing::info!(
            seq = result.seq,
            label = %result.label,
            confidence = format!("{:.2}", result.confidence),
            agreement = result.agreement,
            partial = result.partial,
            "emotion"
        );
        Ok(())
    }
}

/// Envelope POSTed to the orchestration webhook
#[derive(serde::Serialize)]
struct WebhookPayload<'a> {
    #[serde(rename = "sessionId")]
    session_id: &'a str,
    emotion: &'a FusedResult,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// Forwards fused results to a conversation-orchestration webhook
///
/// The downstream orchestrator correlates emotions with the active
/// conversation through the configured session id.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    session_id: String,
}

impl WebhookSink {
    /// Create a sink posting to `url` under `session_id`
    #[must_use]
    pub fn new(url: String, session_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            session_id,
        }
    }
}

#[async_trait]
impl ResultSink for WebhookSink {
    async fn emit(&self, result: &FusedResult) -> Result<()> {
        let payload = WebhookPayload {
            session_id: &self.session_id,
            emotion: result,
            timestamp: chrono::Utc::now(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Sink(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Sink(format!("webhook error {status}: {body}")));
        }

        tracing::debug!(seq = result.seq, url = %self.url, "result delivered to webhook");
        Ok(())
    }
}

/// Fans one result out to several sinks in order
pub struct MultiSink {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl MultiSink {
    /// Combine sinks; emission stops at the first failure
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn ResultSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ResultSink for MultiSink {
    async fn emit(&self, result: &FusedResult) -> Result<()> {
        for sink in &self.sinks {
            sink.emit(result).await?;
        }
        Ok(())
    }
}
