//! Clip transcription over HTTP speech-to-text services

use async_trait::async_trait;

use crate::audio::{ClipBuffer, samples_to_wav};
use crate::{Error, Result};

/// Default OpenAI-compatible transcription endpoint (Groq)
const DEFAULT_WHISPER_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";

/// Maps a clip to recognized text
///
/// External boundary of the pipeline; failures surface as
/// [`Error::TranscriptionUnavailable`] and put the text branch into
/// degraded mode for that clip only.
#[async_trait]
pub trait TranscriptionAdapter: Send + Sync {
    /// Transcribe one clip to text
    ///
    /// # Errors
    ///
    /// Returns [`Error::TranscriptionUnavailable`] on service failure
    async fn transcribe(&self, clip: &ClipBuffer) -> Result<String>;
}

/// Response from an OpenAI-compatible transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from the Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    Deepgram,
}

/// HTTP speech-to-text client
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a client for an OpenAI-compatible Whisper endpoint
    ///
    /// `url` overrides the default Groq endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new_whisper(api_key: String, model: String, url: Option<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::ConfigInvalid(
                "API key required for Whisper transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            url: url.unwrap_or_else(|| DEFAULT_WHISPER_URL.to_string()),
            provider: SttProvider::Whisper,
        })
    }

    /// Create a client for the Deepgram API
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new_deepgram(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::ConfigInvalid("Deepgram API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            url: format!("https://api.deepgram.com/v1/listen?model={model}&punctuate=true"),
            model,
            provider: SttProvider::Deepgram,
        })
    }

    async fn transcribe_whisper(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("clip.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::TranscriptionUnavailable(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::TranscriptionUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::TranscriptionUnavailable(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::TranscriptionUnavailable(e.to_string()))?;

        Ok(result.text)
    }

    async fn transcribe_deepgram(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio)
            .send()
            .await
            .map_err(|e| Error::TranscriptionUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::TranscriptionUnavailable(format!(
                "Deepgram API error {status}: {body}"
            )));
        }

        let result: DeepgramResponse = response
            .json()
            .await
            .map_err(|e| Error::TranscriptionUnavailable(e.to_string()))?;

        Ok(result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl TranscriptionAdapter for SpeechToText {
    async fn transcribe(&self, clip: &ClipBuffer) -> Result<String> {
        let wav = samples_to_wav(clip.samples(), clip.sample_rate())?;

        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(wav).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(wav).await?,
        };

        tracing::debug!(seq = clip.seq(), transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_rejected() {
        assert!(SpeechToText::new_whisper(String::new(), "whisper-large-v3-turbo".into(), None)
            .is_err());
        assert!(SpeechToText::new_deepgram(String::new(), "nova-2".into()).is_err());
    }

    #[test]
    fn test_default_whisper_endpoint() {
        let stt =
            SpeechToText::new_whisper("key".into(), "whisper-large-v3-turbo".into(), None).unwrap();
        assert_eq!(stt.url, DEFAULT_WHISPER_URL);
    }
}
