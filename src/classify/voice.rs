//! Acoustic (voice-tone) emotion classification boundary

use async_trait::async_trait;

use crate::audio::{ClipBuffer, samples_to_wav};
use crate::emotion::VoiceEmotion;
use crate::{Error, Result};

/// Maps a clip to a voice-taxonomy label with confidence
///
/// External boundary; the model serving this is deliberately outside the
/// crate. Failures surface as [`Error::ClassifierUnavailable`] and put the
/// voice branch into degraded mode for that clip only.
#[async_trait]
pub trait VoiceEmotionClassifier: Send + Sync {
    /// Classify one clip's vocal tone
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassifierUnavailable`] on service failure
    async fn classify(&self, clip: &ClipBuffer) -> Result<(VoiceEmotion, f32)>;
}

/// Response shape shared by both emotion inference endpoints
#[derive(serde::Deserialize)]
pub(crate) struct LabelResponse {
    pub label: String,
    pub score: f32,
}

/// HTTP client for a speech-emotion inference endpoint
///
/// POSTs the clip as WAV and expects `{"label": "...", "score": 0.87}`
/// with a label from the voice taxonomy.
pub struct HttpVoiceClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpVoiceClassifier {
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
impl VoiceEmotionClassifier for HttpVoiceClassifier {
    async fn classify(&self, clip: &ClipBuffer) -> Result<(VoiceEmotion, f32)> {
        let wav = samples_to_wav(clip.samples(), clip.sample_rate())?;
        tracing::debug!(seq = clip.seq(), audio_bytes = wav.len(), "classifying voice tone");

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "audio/wav")
            .body(wav)
            .send()
            .await
            .map_err(|e| Error::ClassifierUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "voice classifier error");
            return Err(Error::ClassifierUnavailable(format!(
                "voice classifier error {status}: {body}"
            )));
        }

        let result: LabelResponse = response
            .json()
            .await
            .map_err(|e| Error::ClassifierUnavailable(e.to_string()))?;

        let label: VoiceEmotion = result.label.parse()?;
        tracing::debug!(
            seq = clip.seq(),
            label = %label,
            score = result.score,
            "voice classification complete"
        );

        Ok((label, result.score.clamp(0.0, 1.0)))
    }
}
