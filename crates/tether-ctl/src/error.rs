use tether_link::LinkError;

use crate::intent::ParseError;

/// Failures reported back to whoever issued an intent.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The intent makes no sense in the current state; nothing was sent.
    #[error("{0}")]
    Precondition(String),
    /// Not connected, and the one reconnect attempt failed too.
    #[error("link unavailable: {0}")]
    LinkUnavailable(LinkError),
    #[error("link error: {0}")]
    Transport(#[from] LinkError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl CommandError {
    pub fn must_take_off() -> Self {
        CommandError::Precondition("must take off first".into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// The vehicle may still be in the air; its own link-loss failsafe is
    /// all that is left.
    #[error("landing during shutdown failed: {0}")]
    LandingFailed(LinkError),
}
