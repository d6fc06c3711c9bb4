//! Platform capability detection.
//!
//! Engines report whether the capability they wrap actually exists on this
//! platform. The session controller consumes the answer exactly once at
//! construction; nothing re-checks availability ad hoc afterwards.

/// Result of a one-shot capability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Supported,
    Unsupported { reason: String },
}

impl Capability {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Capability::Unsupported {
            reason: reason.into(),
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported)
    }

    /// The reason the capability is missing, if it is.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Capability::Supported => None,
            Capability::Unsupported { reason } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_has_no_reason() {
        assert!(Capability::Supported.is_supported());
        assert_eq!(Capability::Supported.reason(), None);
    }

    #[test]
    fn unsupported_carries_reason() {
        let cap = Capability::unsupported("no speech service");
        assert!(!cap.is_supported());
        assert_eq!(cap.reason(), Some("no speech service"));
    }
}
