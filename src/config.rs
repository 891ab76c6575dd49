//! Configuration for the attune pipeline
//!
//! Everything is environment-driven with sane defaults; all values are
//! validated before the capture loop starts so a bad weight split or
//! mapping override fails the process instead of corrupting results.

use std::str::FromStr;
use std::time::Duration;

use crate::classify::SpeechToText;
use crate::emotion::{CanonicalEmotion, FusionWeights, TaxonomyMapper, TextEmotion, VoiceEmotion};
use crate::{Error, Result};

/// Audio capture settings
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Fixed clip window duration
    pub clip_duration: Duration,

    /// Target sample rate (16 kHz mono suits the speech models)
    pub sample_rate: u32,

    /// How often the capture source is drained while a window fills
    pub poll_interval: Duration,
}

/// Speech-to-text provider selection
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// "whisper" (OpenAI-compatible, default Groq) or "deepgram"
    pub provider: String,

    /// API key for the chosen provider
    pub api_key: String,

    /// Model identifier (e.g. "whisper-large-v3-turbo", "nova-2")
    pub model: String,

    /// Endpoint override for self-hosted OpenAI-compatible servers
    pub url: Option<String>,
}

/// Downstream webhook forwarding
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Orchestration webhook URL
    pub url: String,

    /// Session identifier correlating emotions with the conversation
    pub session_id: String,
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Capture settings
    pub capture: CaptureConfig,

    /// Fusion weight policy
    pub weights: FusionWeights,

    /// Bounded wait per branch before degraded fusion
    pub branch_timeout: Duration,

    /// How long in-flight clips may finish after a stop signal
    pub shutdown_grace: Duration,

    /// Speech-to-text provider
    pub stt: SttConfig,

    /// Speech-emotion inference endpoint
    pub voice_classifier_url: String,

    /// Text-emotion inference endpoint
    pub text_classifier_url: String,

    /// Optional webhook sink
    pub webhook: Option<WebhookConfig>,

    /// Raw `label=canonical` taxonomy overrides
    pub taxonomy_overrides: Vec<(String, String)>,
}

impl Config {
    /// Load and validate configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] for malformed values, weights that
    /// do not sum to 1.0, or overrides naming unknown labels
    pub fn load() -> Result<Self> {
        let clip_secs: f64 = env_parse("ATTUNE_CLIP_SECS", 5.0)?;
        let sample_rate: u32 = env_parse("ATTUNE_SAMPLE_RATE", 16_000)?;
        let poll_ms: u64 = env_parse("ATTUNE_POLL_MS", 100)?;
        let capture = capture_config(clip_secs, sample_rate, poll_ms)?;

        let voice_weight: f32 = env_parse("ATTUNE_VOICE_WEIGHT", FusionWeights::DEFAULT.voice)?;
        let text_weight: f32 = env_parse("ATTUNE_TEXT_WEIGHT", FusionWeights::DEFAULT.text)?;
        let weights = FusionWeights::new(voice_weight, text_weight)?;

        // Default branch timeout is on the order of the clip duration
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let default_timeout_ms = (clip_secs * 1000.0) as u64;
        let branch_timeout_ms: u64 = env_parse("ATTUNE_BRANCH_TIMEOUT_MS", default_timeout_ms)?;
        let grace_ms: u64 = env_parse("ATTUNE_SHUTDOWN_GRACE_MS", 2_000)?;

        let stt_provider =
            std::env::var("ATTUNE_STT_PROVIDER").unwrap_or_else(|_| "whisper".to_string());
        let stt_key = match stt_provider.as_str() {
            "deepgram" => std::env::var("DEEPGRAM_API_KEY").unwrap_or_default(),
            _ => std::env::var("GROQ_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .unwrap_or_default(),
        };
        let stt_model = std::env::var("ATTUNE_STT_MODEL").unwrap_or_else(|_| {
            match stt_provider.as_str() {
                "deepgram" => "nova-2".to_string(),
                _ => "whisper-large-v3-turbo".to_string(),
            }
        });
        let stt = SttConfig {
            provider: stt_provider,
            api_key: stt_key,
            model: stt_model,
            url: std::env::var("ATTUNE_STT_URL").ok(),
        };

        let voice_classifier_url = std::env::var("ATTUNE_VOICE_CLASSIFIER_URL")
            .unwrap_or_else(|_| "http://localhost:8601/classify".to_string());
        let text_classifier_url = std::env::var("ATTUNE_TEXT_CLASSIFIER_URL")
            .unwrap_or_else(|_| "http://localhost:8602/classify".to_string());

        let webhook = std::env::var("ATTUNE_WEBHOOK_URL").ok().map(|url| WebhookConfig {
            url,
            session_id: std::env::var("ATTUNE_SESSION_ID")
                .unwrap_or_else(|_| "local".to_string()),
        });

        let taxonomy_overrides = std::env::var("ATTUNE_TAXONOMY_OVERRIDES")
            .map(|raw| parse_overrides(&raw))
            .unwrap_or_else(|_| Ok(Vec::new()))?;

        let config = Self {
            capture,
            weights,
            branch_timeout: Duration::from_millis(branch_timeout_ms),
            shutdown_grace: Duration::from_millis(grace_ms),
            stt,
            voice_classifier_url,
            text_classifier_url,
            webhook,
            taxonomy_overrides,
        };

        // Building the mapper validates every override name up front
        let _ = config.mapper()?;

        Ok(config)
    }

    /// Build the taxonomy mapper with this configuration's overrides
    ///
    /// Override labels are matched against both taxonomies; "neutral"
    /// exists in both and is redirected in both.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if an override names an unknown
    /// raw label or canonical bucket
    pub fn mapper(&self) -> Result<TaxonomyMapper> {
        let mut mapper = TaxonomyMapper::new();

        for (raw, canonical) in &self.taxonomy_overrides {
            let target: CanonicalEmotion = canonical.parse()?;

            let as_text = TextEmotion::from_str(raw).ok();
            let as_voice = VoiceEmotion::from_str(raw).ok();

            if as_text.is_none() && as_voice.is_none() {
                return Err(Error::ConfigInvalid(format!(
                    "taxonomy override names unknown label {raw:?}"
                )));
            }
            if let Some(label) = as_text {
                mapper.override_text(label, target);
            }
            if let Some(label) = as_voice {
                mapper.override_voice(label, target);
            }
        }

        Ok(mapper)
    }

    /// Construct the configured speech-to-text client
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if the provider is unknown or its
    /// API key is missing
    pub fn speech_to_text(&self) -> Result<SpeechToText> {
        match self.stt.provider.as_str() {
            "whisper" => SpeechToText::new_whisper(
                self.stt.api_key.clone(),
                self.stt.model.clone(),
                self.stt.url.clone(),
            ),
            "deepgram" => {
                SpeechToText::new_deepgram(self.stt.api_key.clone(), self.stt.model.clone())
            }
            other => Err(Error::ConfigInvalid(format!(
                "unknown STT provider {other:?} (expected \"whisper\" or \"deepgram\")"
            ))),
        }
    }
}

/// Validate the capture settings
///
/// `clip_secs` must be a positive finite number: NaN and infinity compare
/// false against any bound and would otherwise slip through a plain
/// positivity check only to panic when converted to a [`Duration`].
fn capture_config(clip_secs: f64, sample_rate: u32, poll_ms: u64) -> Result<CaptureConfig> {
    if !clip_secs.is_finite() || clip_secs <= 0.0 {
        return Err(Error::ConfigInvalid(format!(
            "clip duration must be a positive finite number of seconds, got {clip_secs}"
        )));
    }
    let clip_duration = Duration::try_from_secs_f64(clip_secs).map_err(|_| {
        Error::ConfigInvalid(format!("clip duration {clip_secs}s is out of range"))
    })?;
    if sample_rate == 0 {
        return Err(Error::ConfigInvalid("sample rate must be nonzero".to_string()));
    }

    Ok(CaptureConfig {
        clip_duration,
        sample_rate,
        poll_interval: Duration::from_millis(poll_ms),
    })
}

/// Parse an environment variable, falling back to `default` when unset
///
/// Unlike silently defaulting on parse failure, a present-but-malformed
/// value is a configuration error.
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::ConfigInvalid(format!("{key} has malformed value {raw:?}"))),
    }
}

/// Parse "label=canonical,label=canonical" override syntax
fn parse_overrides(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            entry.split_once('=').map_or_else(
                || {
                    Err(Error::ConfigInvalid(format!(
                        "taxonomy override {entry:?} is not label=canonical"
                    )))
                },
                |(label, canonical)| {
                    Ok((label.trim().to_string(), canonical.trim().to_string()))
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            capture: CaptureConfig {
                clip_duration: Duration::from_secs(5),
                sample_rate: 16_000,
                poll_interval: Duration::from_millis(100),
            },
            weights: FusionWeights::DEFAULT,
            branch_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
            stt: SttConfig {
                provider: "whisper".to_string(),
                api_key: "key".to_string(),
                model: "whisper-large-v3-turbo".to_string(),
                url: None,
            },
            voice_classifier_url: "http://localhost:8601/classify".to_string(),
            text_classifier_url: "http://localhost:8602/classify".to_string(),
            webhook: None,
            taxonomy_overrides: Vec::new(),
        }
    }

    #[test]
    fn test_clip_duration_validation() {
        assert!(capture_config(5.0, 16_000, 100).is_ok());
        assert!(capture_config(0.25, 16_000, 100).is_ok());

        // Non-finite values must be rejected, not panic in the Duration
        // conversion later
        assert!(capture_config(f64::NAN, 16_000, 100).is_err());
        assert!(capture_config(f64::INFINITY, 16_000, 100).is_err());
        assert!(capture_config(f64::NEG_INFINITY, 16_000, 100).is_err());
        assert!(capture_config(0.0, 16_000, 100).is_err());
        assert!(capture_config(-1.0, 16_000, 100).is_err());

        // Finite but beyond what a Duration can represent
        assert!(capture_config(1e300, 16_000, 100).is_err());

        assert!(capture_config(5.0, 0, 100).is_err());
    }

    #[test]
    fn test_parse_overrides() {
        let parsed = parse_overrides("surprise=fear, disgust=sadness").unwrap();
        assert_eq!(
            parsed,
            vec![
                ("surprise".to_string(), "fear".to_string()),
                ("disgust".to_string(), "sadness".to_string()),
            ]
        );

        assert!(parse_overrides("surprise->fear").is_err());
    }

    #[test]
    fn test_mapper_with_overrides() {
        let mut config = base_config();
        config.taxonomy_overrides =
            vec![("surprise".to_string(), "fear".to_string())];

        let mapper = config.mapper().unwrap();
        assert_eq!(
            mapper.canonicalize_text(TextEmotion::Surprise),
            CanonicalEmotion::Fear
        );
    }

    #[test]
    fn test_neutral_override_applies_to_both_taxonomies() {
        let mut config = base_config();
        config.taxonomy_overrides = vec![("neutral".to_string(), "sadness".to_string())];

        let mapper = config.mapper().unwrap();
        assert_eq!(
            mapper.canonicalize_text(TextEmotion::Neutral),
            CanonicalEmotion::Sadness
        );
        assert_eq!(
            mapper.canonicalize_voice(VoiceEmotion::Neutral),
            CanonicalEmotion::Sadness
        );
    }

    #[test]
    fn test_unknown_override_label_rejected() {
        let mut config = base_config();
        config.taxonomy_overrides = vec![("ecstatic".to_string(), "joy".to_string())];
        assert!(config.mapper().is_err());

        config.taxonomy_overrides = vec![("surprise".to_string(), "bliss".to_string())];
        assert!(config.mapper().is_err());
    }

    #[test]
    fn test_unknown_stt_provider_rejected() {
        let mut config = base_config();
        config.stt.provider = "siri".to_string();
        assert!(config.speech_to_text().is_err());
    }
}
