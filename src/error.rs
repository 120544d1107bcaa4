//! Unified error types for the dispenser.
//!
//! A single [`PourError`] carries every reason a pour can end in the
//! `Failed` state. All variants are `Copy` so they can be handed to any
//! number of terminal handlers without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Pour failure reasons
// ---------------------------------------------------------------------------

/// Reason code attached to a failed pour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PourError {
    /// The hardware link was disconnected when a command had to be sent.
    NotConnected,
    /// No ingredient→pump binding exists for the requested beverage.
    Unavailable,
    /// Zero computed duration, empty recipe, or zero total rate.
    InvalidPourable,
    /// A command could not be written on a connected session.
    Transport(TransportError),
}

impl PourError {
    /// Whether retrying the same pour later can succeed without a
    /// configuration or topology change.
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// Short machine-readable reason code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotConnected => "errNotConnected",
            Self::Unavailable => "errUnavailable",
            Self::InvalidPourable => "errInvalidPourable",
            Self::Transport(_) => "errTransport",
        }
    }
}

impl fmt::Display for PourError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "hardware link not connected"),
            Self::Unavailable => write!(f, "beverage unavailable"),
            Self::InvalidPourable => write!(f, "invalid pourable"),
            Self::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl std::error::Error for PourError {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// I/O failure on a connected board session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Socket read or write failed.
    Io,
    /// The adapter did not acknowledge within the configured timeout.
    Timeout,
    /// The acknowledgement frame did not match the request.
    BadAck,
    /// The encoded request exceeds the maximum frame size.
    FrameTooLarge,
    /// The session was closed by the peer.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::Timeout => write!(f, "acknowledge timed out"),
            Self::BadAck => write!(f, "unexpected acknowledge"),
            Self::FrameTooLarge => write!(f, "frame too large"),
            Self::Closed => write!(f, "session closed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for PourError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => Self::Closed,
            _ => Self::Io,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating configuration and catalog data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// JSON could not be parsed into the expected shape.
    Malformed,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed document"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(_: serde_json::Error) -> Self {
        Self::Malformed
    }
}
