//! Linguistic (transcribed-text) emotion classification boundary

use async_trait::async_trait;

use crate::emotion::TextEmotion;
use crate::{Error, Result};

use super::voice::LabelResponse;

/// Maps recognized text to a text-taxonomy label with confidence
///
/// Same failure contract as the voice boundary: errors surface as
/// [`Error::ClassifierUnavailable`] and only affect the current clip.
#[async_trait]
pub trait TextEmotionClassifier: Send + Sync {
    /// Classify the emotional tone of a transcript
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassifierUnavailable`] on service failure
    async fn classify(&self, text: &str) -> Result<(TextEmotion, f32)>;
}

#[derive(serde::Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

/// HTTP client for a text-emotion inference endpoint
///
/// POSTs `{"text": "..."}` and expects `{"label": "...", "score": 0.87}`
/// with a label from the text taxonomy.
pub struct HttpTextClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpTextClassifier {
    /// Create a client for the given inference endpoint
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl TextEmotionClassifier for HttpTextClassifier {
    async fn classify(&self, text: &str) -> Result<(TextEmotion, f32)> {
        tracing::debug!(chars = text.len(), "classifying transcript emotion");

        let response = self
            .client
            .post(&self.url)
            .json(&TextRequest { text })
            .send()
            .await
            .map_err(|e| Error::ClassifierUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "text classifier error");
            return Err(Error::ClassifierUnavailable(format!(
                "text classifier error {status}: {body}"
            )));
        }

        let result: LabelResponse = response
            .json()
            .await
            .map_err(|e| Error::ClassifierUnavailable(e.to_string()))?;

        let label: TextEmotion = result.label.parse()?;
        tracing::debug!(label = %label, score = result.score, "text classification complete");

        Ok((label, result.score.clamp(0.0, 1.0)))
    }
}
