//! Dispenser configuration parameters
//!
//! All tunable parameters for the dispenser: pour limits, board layout,
//! ingredient assignments and the adapter link.
//! Values are loaded from a JSON document by the host binary; every field
//! has a default so a partial document is enough.

use serde::{Deserialize, Serialize};

use crate::drivers::pump::PumpKind;
use crate::error::ConfigError;

/// Core dispenser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispenserConfig {
    pub pour: PourConfig,
    pub board: BoardConfig,
    pub assignments: Vec<Assignment>,
    pub link: LinkConfig,
}

/// Limits and policies applied to every beverage pour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PourConfig {
    /// Upper bound on a single beverage pour (mL). Larger requests are clamped.
    pub max_pour_volume_ml: f64,
    /// Cancel the remaining pumps of a pour when one of them fails.
    pub cancel_siblings_on_failure: bool,
}

impl Default for PourConfig {
    fn default() -> Self {
        Self {
            max_pour_volume_ml: 350.0,
            cancel_siblings_on_failure: false,
        }
    }
}

/// One pump or valve on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpSpec {
    pub name: String,
    /// Position on the board bus (0-3 micros, 4/5 macros on the stock board).
    pub pos: u8,
    pub kind: PumpKind,
    /// Calibrated flow (mL/s). Required for fixed-rate valves, ignored otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibrated_rate_ml_s: Option<f64>,
}

impl PumpSpec {
    pub fn micro(name: &str, pos: u8) -> Self {
        Self {
            name: name.into(),
            pos,
            kind: PumpKind::VariableRate,
            calibrated_rate_ml_s: None,
        }
    }

    pub fn valve(name: &str, pos: u8, calibrated_rate_ml_s: f64) -> Self {
        Self {
            name: name.into(),
            pos,
            kind: PumpKind::FixedRate,
            calibrated_rate_ml_s: Some(calibrated_rate_ml_s),
        }
    }
}

/// Board layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub pumps: Vec<PumpSpec>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            pumps: vec![
                PumpSpec::micro("micro1", 0),
                PumpSpec::micro("micro2", 1),
                PumpSpec::micro("micro3", 2),
                PumpSpec::micro("micro4", 3),
                PumpSpec::valve("carb", 4, 30.0),
                PumpSpec::valve("water", 5, 30.0),
            ],
        }
    }
}

impl BoardConfig {
    /// Reject duplicate positions or names and uncalibrated valves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, spec) in self.pumps.iter().enumerate() {
            let rest = &self.pumps[i + 1..];
            if rest.iter().any(|other| other.pos == spec.pos) {
                return Err(ConfigError::ValidationFailed("board.pumps: duplicate position"));
            }
            if rest.iter().any(|other| other.name == spec.name) {
                return Err(ConfigError::ValidationFailed("board.pumps: duplicate name"));
            }
            if spec.kind == PumpKind::FixedRate {
                match spec.calibrated_rate_ml_s {
                    Some(rate) if rate.is_finite() && rate > 0.0 => {}
                    _ => {
                        return Err(ConfigError::ValidationFailed(
                            "board.pumps: fixed-rate valve needs a positive calibrated rate",
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Ingredient installed on a pump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub ingredient: String,
    pub pump: String,
}

impl Assignment {
    pub fn new(ingredient: &str, pump: &str) -> Self {
        Self {
            ingredient: ingredient.into(),
            pump: pump.into(),
        }
    }

    /// Stock assignments: water and carb on their valves, the four flavours
    /// on the micros in order.
    pub fn intrinsics() -> Vec<Self> {
        vec![
            Self::new("water", "water"),
            Self::new("carb", "carb"),
            Self::new("lemon", "micro1"),
            Self::new("lime", "micro2"),
            Self::new("cherry", "micro3"),
            Self::new("tropical", "micro4"),
        ]
    }
}

/// Native adapter connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Address the adapter connects back to.
    pub listen_addr: String,
    /// How long to wait for a command acknowledge (milliseconds).
    pub ack_timeout_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7070".into(),
            ack_timeout_ms: 1000,
        }
    }
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            pour: PourConfig::default(),
            board: BoardConfig::default(),
            assignments: Assignment::intrinsics(),
            link: LinkConfig::default(),
        }
    }
}

impl DispenserConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make pours meaningless or ambiguous.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pour.max_pour_volume_ml.is_finite() && self.pour.max_pour_volume_ml > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "pour.max_pour_volume_ml must be positive",
            ));
        }
        if self.link.ack_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "link.ack_timeout_ms must be non-zero",
            ));
        }
        self.board.validate()?;
        for assignment in &self.assignments {
            if !self.board.pumps.iter().any(|p| p.name == assignment.pump) {
                return Err(ConfigError::ValidationFailed("assignments: unknown pump"));
            }
        }
        Ok(())
    }
}
