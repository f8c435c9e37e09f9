use crate::CoreError;
use std::fmt;

/// Registration state of a foreign thread with the runtime's root domain.
///
/// The thread that started the runtime never leaves the implicit attached
/// state and is not tracked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    NotAttached,
    Attached,
    Detached,
}

impl fmt::Display for AttachState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotAttached => "not_attached",
            Self::Attached => "attached",
            Self::Detached => "detached",
        })
    }
}

pub fn validate_transition(from: AttachState, to: AttachState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            AttachState::NotAttached | AttachState::Detached,
            AttachState::Attached
        ) | (AttachState::Attached, AttachState::Detached)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
