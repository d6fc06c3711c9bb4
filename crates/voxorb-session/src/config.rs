use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Host-supplied session configuration.
///
/// Replaceable atomically via [`VoiceModeUpdate`]; partial updates merge
/// into the existing config, last write wins per field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceModeConfig {
    /// System prompt the host prepends to its completion requests.
    pub system_prompt: String,
    /// Conversation the session belongs to, for host-side context.
    pub conversation_id: Option<String>,
    /// Language tag for recognition and voice selection.
    pub language: String,
    /// Voice name or id honored before the selection policy applies.
    pub preferred_voice: Option<String>,
    /// Forward interim transcripts to the host for live display. Interims
    /// reset the silence watchdog regardless.
    pub forward_interim: bool,
    /// Quiet period after which listening stops.
    pub silence_timeout: Duration,
    /// Delay before an automatic retry out of the error state.
    pub error_retry_delay: Duration,
    /// Silent auto-retries allowed before requiring a manual restart.
    pub max_auto_retries: u32,
}

impl Default for VoiceModeConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            conversation_id: None,
            language: "en-US".to_string(),
            preferred_voice: None,
            forward_interim: true,
            silence_timeout: Duration::from_millis(3000),
            error_retry_delay: Duration::from_secs(3),
            max_auto_retries: 2,
        }
    }
}

/// Partial configuration update. `None` fields leave the current value
/// untouched; double-`Option` fields can also clear an optional value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceModeUpdate {
    pub system_prompt: Option<String>,
    pub conversation_id: Option<Option<String>>,
    pub language: Option<String>,
    pub preferred_voice: Option<Option<String>>,
    pub forward_interim: Option<bool>,
    pub silence_timeout: Option<Duration>,
    pub error_retry_delay: Option<Duration>,
    pub max_auto_retries: Option<u32>,
}

impl VoiceModeUpdate {
    /// Merge into `config`, last write wins per field.
    pub fn apply(self, config: &mut VoiceModeConfig) {
        if let Some(system_prompt) = self.system_prompt {
            config.system_prompt = system_prompt;
        }
        if let Some(conversation_id) = self.conversation_id {
            config.conversation_id = conversation_id;
        }
        if let Some(language) = self.language {
            config.language = language;
        }
        if let Some(preferred_voice) = self.preferred_voice {
            config.preferred_voice = preferred_voice;
        }
        if let Some(forward_interim) = self.forward_interim {
            config.forward_interim = forward_interim;
        }
        if let Some(silence_timeout) = self.silence_timeout {
            config.silence_timeout = silence_timeout;
        }
        if let Some(error_retry_delay) = self.error_retry_delay {
            config.error_retry_delay = error_retry_delay;
        }
        if let Some(max_auto_retries) = self.max_auto_retries {
            config.max_auto_retries = max_auto_retries;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_changes_nothing() {
        let mut config = VoiceModeConfig::default();
        let before = config.clone();
        VoiceModeUpdate::default().apply(&mut config);
        assert_eq!(config.system_prompt, before.system_prompt);
        assert_eq!(config.language, before.language);
        assert_eq!(config.silence_timeout, before.silence_timeout);
    }

    #[test]
    fn update_merges_per_field() {
        let mut config = VoiceModeConfig::default();
        VoiceModeUpdate {
            system_prompt: Some("be brief".to_string()),
            silence_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.system_prompt, "be brief");
        assert_eq!(config.silence_timeout, Duration::from_secs(5));
        // Untouched fields keep their values.
        assert_eq!(config.language, "en-US");
        assert!(config.forward_interim);
    }

    #[test]
    fn last_write_wins_per_field() {
        let mut config = VoiceModeConfig::default();
        VoiceModeUpdate {
            language: Some("fr-FR".to_string()),
            ..Default::default()
        }
        .apply(&mut config);
        VoiceModeUpdate {
            language: Some("de-DE".to_string()),
            forward_interim: Some(false),
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.language, "de-DE");
        assert!(!config.forward_interim);
    }

    #[test]
    fn optional_fields_can_be_cleared() {
        let mut config = VoiceModeConfig {
            conversation_id: Some("conv-1".to_string()),
            preferred_voice: Some("Aria".to_string()),
            ..Default::default()
        };
        VoiceModeUpdate {
            conversation_id: Some(None),
            preferred_voice: Some(None),
            ..Default::default()
        }
        .apply(&mut config);

        assert!(config.conversation_id.is_none());
        assert!(config.preferred_voice.is_none());
    }
}
