use std::fmt;

use voxorb_foundation::VoiceError;

/// Coarse session state reported to the host. Exactly one value at a time,
/// owned exclusively by the controller; transitions are the only mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Processing,
    Speaking,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Listening => "listening",
            SessionState::Processing => "processing",
            SessionState::Speaking => "speaking",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Validated session state holder.
pub struct SessionStateMachine {
    state: SessionState,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn current(&self) -> SessionState {
        self.state
    }

    /// Move to `new_state`, returning the state we left. Rejects edges that
    /// are not in the transition table; "close the session" is the one edge
    /// allowed from everywhere.
    pub fn transition(&mut self, new_state: SessionState) -> Result<SessionState, VoiceError> {
        use SessionState::*;

        let valid = matches!(
            (&self.state, &new_state),
            (Idle, Listening)
                | (Idle, Error)
                | (Listening, Processing)
                | (Listening, Error)
                | (Processing, Speaking)
                | (Speaking, Listening)
                | (Error, Listening)
                | (Listening, Idle)
                | (Processing, Idle)
                | (Speaking, Idle)
                | (Error, Idle)
        );

        if !valid {
            return Err(VoiceError::InvalidTransition {
                from: self.state.to_string(),
                to: new_state.to_string(),
            });
        }

        tracing::info!("Session state: {} -> {}", self.state, new_state);
        let from = self.state;
        self.state = new_state;
        Ok(from)
    }
}
