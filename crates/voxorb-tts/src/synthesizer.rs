use std::time::Duration;
use tracing::{debug, warn};

use crate::engine::{SynthesisCompletion, SynthesizerEngine};
use crate::error::{TtsError, TtsResult};
use crate::types::{SynthesisOptions, VoiceInfo};
use voxorb_foundation::Capability;

/// Configuration for the synthesizer wrapper.
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Language tag used by the voice selection policy.
    pub language: String,
    /// Voice name or id honored before the language policy applies.
    pub preferred_voice: Option<String>,
    /// Upper bound on waiting for an asynchronously loading voice list.
    pub voice_list_timeout: Duration,
    /// Default per-utterance options.
    pub options: SynthesisOptions,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            preferred_voice: None,
            voice_list_timeout: Duration::from_millis(1500),
            options: SynthesisOptions::default(),
        }
    }
}

/// Wrapper around a synthesizer engine: last call wins, no queueing.
///
/// `speak` cancels any in-flight utterance before starting the next one,
/// so at most one utterance is ever live. The voice list is fetched once
/// and cached; a slow-loading list is waited on once, bounded, and an
/// empty or unavailable list falls through to the platform default voice.
pub struct SpeechSynthesizer {
    engine: Box<dyn SynthesizerEngine>,
    capability: Capability,
    config: SynthesizerConfig,
    voices: Option<Vec<VoiceInfo>>,
    utterance_seq: u64,
}

impl SpeechSynthesizer {
    pub fn new(engine: Box<dyn SynthesizerEngine>, config: SynthesizerConfig) -> Self {
        let capability = engine.capability();
        debug!(
            engine = engine.name(),
            supported = capability.is_supported(),
            "Synthesizer engine wrapped"
        );
        Self {
            engine,
            capability,
            config,
            voices: None,
            utterance_seq: 0,
        }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn set_preferred_voice(&mut self, voice: Option<String>) {
        self.config.preferred_voice = voice;
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.config.language = language.into();
    }

    /// Start speaking `text`. Any in-flight utterance is cancelled first
    /// (its completion settles `Err(Cancelled)`); the returned channel
    /// resolves when this utterance finishes.
    pub async fn speak(&mut self, text: &str) -> TtsResult<SynthesisCompletion> {
        if let Capability::Unsupported { reason } = &self.capability {
            return Err(TtsError::EngineNotAvailable(reason.clone()));
        }
        if text.trim().is_empty() {
            return Err(TtsError::InvalidInput("empty utterance".to_string()));
        }

        // Last call wins: retire the previous utterance before starting.
        self.engine.cancel().await;

        self.utterance_seq += 1;
        let seq = self.utterance_seq;
        let voice = self.select_voice().await;
        debug!(
            utterance = seq,
            voice = voice.as_ref().map(|v| v.name.as_str()).unwrap_or("<default>"),
            "Starting synthesis"
        );

        let options = self.config.options.clone();
        self.engine.speak(text, voice.as_ref(), &options).await
    }

    /// Cancel the in-flight utterance, if any. Idempotent.
    pub async fn cancel(&mut self) {
        self.engine.cancel().await;
    }

    /// Pick a voice per policy: preferred name first, then exact language
    /// match, then primary-subtag match (best quality within each tier),
    /// else the platform default.
    async fn select_voice(&mut self) -> Option<VoiceInfo> {
        self.ensure_voices().await;
        let voices = self.voices.as_deref().unwrap_or(&[]);
        if voices.is_empty() {
            return None;
        }

        if let Some(preferred) = &self.config.preferred_voice {
            if let Some(voice) = voices
                .iter()
                .find(|v| &v.name == preferred || &v.id == preferred)
            {
                return Some(voice.clone());
            }
            debug!("Preferred voice '{}' not in voice list", preferred);
        }

        let language = self.config.language.as_str();
        let exact = voices
            .iter()
            .filter(|v| v.language.eq_ignore_ascii_case(language))
            .max_by_key(|v| v.quality);
        if let Some(voice) = exact {
            return Some(voice.clone());
        }

        let subtag = primary_subtag(language);
        voices
            .iter()
            .filter(|v| primary_subtag(&v.language).eq_ignore_ascii_case(subtag))
            .max_by_key(|v| v.quality)
            .cloned()
    }

    /// Fetch and cache the voice list, waiting at most once and never
    /// longer than the configured bound.
    async fn ensure_voices(&mut self) {
        if self.voices.is_some() {
            return;
        }
        let fetched =
            tokio::time::timeout(self.config.voice_list_timeout, self.engine.voices()).await;
        let voices = match fetched {
            Ok(Ok(voices)) => voices,
            Ok(Err(e)) => {
                warn!("Voice list unavailable: {}; using platform default", e);
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "Voice list did not load within {:?}; using platform default",
                    self.config.voice_list_timeout
                );
                Vec::new()
            }
        };
        self.voices = Some(voices);
    }
}

fn primary_subtag(language: &str) -> &str {
    language.split(['-', '_']).next().unwrap_or(language)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSynthesizer;
    use crate::types::VoiceQuality;

    fn voice(id: &str, language: &str, quality: VoiceQuality) -> VoiceInfo {
        VoiceInfo {
            id: id.to_string(),
            name: id.to_string(),
            language: language.to_string(),
            quality,
        }
    }

    fn config_for(language: &str) -> SynthesizerConfig {
        SynthesizerConfig {
            language: language.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn exact_language_match_beats_subtag_match() {
        let (engine, handle) = MockSynthesizer::new();
        handle.set_voices(vec![
            voice("en-gb-a", "en-GB", VoiceQuality::High),
            voice("en-us-a", "en-US", VoiceQuality::Normal),
        ]);
        let mut synth = SpeechSynthesizer::new(Box::new(engine), config_for("en-US"));

        let completion = synth.speak("hello").await.unwrap();
        handle.finish_ok();
        completion.await.unwrap().unwrap();
        assert_eq!(handle.last_voice().unwrap().id, "en-us-a");
    }

    #[tokio::test]
    async fn best_quality_wins_within_a_language() {
        let (engine, handle) = MockSynthesizer::new();
        handle.set_voices(vec![
            voice("en-us-low", "en-US", VoiceQuality::Low),
            voice("en-us-high", "en-US", VoiceQuality::High),
            voice("en-us-mid", "en-US", VoiceQuality::Normal),
        ]);
        let mut synth = SpeechSynthesizer::new(Box::new(engine), config_for("en-US"));

        let _completion = synth.speak("hello").await.unwrap();
        assert_eq!(handle.last_voice().unwrap().id, "en-us-high");
    }

    #[tokio::test]
    async fn subtag_match_used_when_no_exact_locale() {
        let (engine, handle) = MockSynthesizer::new();
        handle.set_voices(vec![
            voice("fr-fr-a", "fr-FR", VoiceQuality::High),
            voice("en-gb-a", "en-GB", VoiceQuality::Normal),
        ]);
        let mut synth = SpeechSynthesizer::new(Box::new(engine), config_for("en-US"));

        let _completion = synth.speak("hello").await.unwrap();
        assert_eq!(handle.last_voice().unwrap().id, "en-gb-a");
    }

    #[tokio::test]
    async fn preferred_voice_overrides_language_policy() {
        let (engine, handle) = MockSynthesizer::new();
        handle.set_voices(vec![
            voice("en-us-a", "en-US", VoiceQuality::High),
            voice("novelty", "en-AU", VoiceQuality::Low),
        ]);
        let mut config = config_for("en-US");
        config.preferred_voice = Some("novelty".to_string());
        let mut synth = SpeechSynthesizer::new(Box::new(engine), config);

        let _completion = synth.speak("hello").await.unwrap();
        assert_eq!(handle.last_voice().unwrap().id, "novelty");
    }

    #[tokio::test]
    async fn empty_voice_list_falls_back_to_platform_default() {
        let (engine, handle) = MockSynthesizer::new();
        let mut synth = SpeechSynthesizer::new(Box::new(engine), config_for("en-US"));

        let _completion = synth.speak("hello").await.unwrap();
        assert!(handle.last_voice().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_voice_list_is_bounded_by_timeout() {
        let (engine, handle) = MockSynthesizer::new();
        handle.delay_voice_list(Duration::from_secs(60));
        let mut synth = SpeechSynthesizer::new(Box::new(engine), config_for("en-US"));

        // Does not hang: the timeout elapses under paused time and the
        // utterance proceeds with the default voice.
        let _completion = synth.speak("hello").await.unwrap();
        assert!(handle.last_voice().is_none());
    }

    #[tokio::test]
    async fn second_speak_cancels_the_first() {
        let (engine, handle) = MockSynthesizer::new();
        let mut synth = SpeechSynthesizer::new(Box::new(engine), config_for("en-US"));

        let first = synth.speak("first utterance").await.unwrap();
        let second = synth.speak("second utterance").await.unwrap();

        assert!(matches!(first.await.unwrap(), Err(TtsError::Cancelled)));
        handle.finish_ok();
        second.await.unwrap().unwrap();
        assert_eq!(handle.spoken(), vec!["first utterance", "second utterance"]);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let (engine, _handle) = MockSynthesizer::new();
        let mut synth = SpeechSynthesizer::new(Box::new(engine), config_for("en-US"));
        assert!(matches!(
            synth.speak("   ").await,
            Err(TtsError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn unsupported_engine_refuses_to_speak() {
        let (engine, handle) = MockSynthesizer::unsupported("no speech synthesis");
        let mut synth = SpeechSynthesizer::new(Box::new(engine), config_for("en-US"));
        assert!(matches!(
            synth.speak("hello").await,
            Err(TtsError::EngineNotAvailable(_))
        ));
        assert!(handle.spoken().is_empty());
    }
}
