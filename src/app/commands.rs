//! Inbound operator commands.
//!
//! Parsed from one line of text by the host binary's `serve` loop and
//! handed to the pour engine.

use core::fmt;
use core::str::FromStr;

/// Commands an operator can send to a running dispenser.
#[derive(Debug, Clone, PartialEq)]
pub enum DispenseCommand {
    /// Pour `volume_ml` of a beverage.
    Pour { beverage_id: String, volume_ml: f64 },

    /// Cancel the pour in progress.
    Cancel,

    /// Report link and pour state.
    Status,

    /// Stop reading commands.
    Quit,
}

/// Why a command line could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandParseError {
    Empty,
    BadVolume,
    Unknown,
}

impl fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::BadVolume => write!(f, "volume must be a number of ml"),
            Self::Unknown => write!(f, "expected `<beverage> <volume>`, `cancel`, `status` or `quit`"),
        }
    }
}

impl std::error::Error for CommandParseError {}

impl FromStr for DispenseCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let first = words.next().ok_or(CommandParseError::Empty)?;
        let second = words.next();
        if words.next().is_some() {
            return Err(CommandParseError::Unknown);
        }
        match (first, second) {
            ("cancel", None) => Ok(Self::Cancel),
            ("status", None) => Ok(Self::Status),
            ("quit" | "exit", None) => Ok(Self::Quit),
            (beverage, Some(volume)) => {
                let volume_ml = volume.parse().map_err(|_| CommandParseError::BadVolume)?;
                Ok(Self::Pour {
                    beverage_id: beverage.into(),
                    volume_ml,
                })
            }
            (_, None) => Err(CommandParseError::Unknown),
        }
    }
}
