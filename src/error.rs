use std::fmt;
use std::time::Duration;

use crate::effect::EffectKind;

#[derive(Debug, Clone, PartialEq)]
pub enum LedError {
    /// The requested effect name is not one we know how to render
    UnknownEffect(String),
    /// The backend did not acknowledge a render command in time
    BackendTimeout(Duration),
    /// The backend task has stopped receiving render commands
    BackendClosed,
    /// The backend received the frame but could not show it
    BackendFailed(String),
    /// The backend has not reported the size of the array yet
    NotReady,
    /// The backend did not report any state during startup
    BackendUnavailable(Duration),
}

impl fmt::Display for LedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedError::UnknownEffect(name) => {
                let names: Vec<&str> = EffectKind::ALL.iter().map(|kind| kind.name()).collect();
                write!(
                    f,
                    "Unknown effect: {}. Available effects are {}.",
                    name,
                    names.join(", ")
                )
            }
            LedError::BackendTimeout(wait) => {
                write!(f, "Backend did not acknowledge render within {:?}", wait)
            }
            LedError::BackendClosed => write!(f, "Backend is no longer accepting renders"),
            LedError::BackendFailed(e) => write!(f, "Backend failed to render: {}", e),
            LedError::NotReady => write!(f, "LED count is not known yet"),
            LedError::BackendUnavailable(wait) => {
                write!(f, "Backend did not report its state within {:?}", wait)
            }
        }
    }
}

impl std::error::Error for LedError {}
