//! The pump board: every channel, the shared link and the shared timer.

use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::TimerService;
use crate::config::BoardConfig;
use crate::drivers::pump::{Pump, PumpHandle, PumpId, PumpKind};
use crate::error::ConfigError;
use crate::link::HardwareLink;

pub struct Board {
    pumps: Vec<Pump>,
    link: HardwareLink,
}

impl Board {
    /// Build the pump table from `config`. Pump ids follow table order.
    pub fn new(
        config: &BoardConfig,
        link: HardwareLink,
        timer: Arc<dyn TimerService>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut pumps = Vec::with_capacity(config.pumps.len());
        for (idx, spec) in config.pumps.iter().enumerate() {
            let id = PumpId(
                u8::try_from(idx).map_err(|_| ConfigError::ValidationFailed("board.pumps: too many pumps"))?,
            );
            let pump = match (spec.kind, spec.calibrated_rate_ml_s) {
                (PumpKind::FixedRate, Some(rate)) => {
                    Pump::fixed_rate(id, &spec.name, spec.pos, rate, link.clone(), Arc::clone(&timer))
                }
                (PumpKind::FixedRate, None) => {
                    return Err(ConfigError::ValidationFailed(
                        "board.pumps: fixed-rate valve needs a positive calibrated rate",
                    ));
                }
                (PumpKind::VariableRate, _) => {
                    Pump::variable_rate(id, &spec.name, spec.pos, link.clone(), Arc::clone(&timer))
                }
            };
            pumps.push(pump);
        }
        info!("board: {} pumps", pumps.len());
        Ok(Self { pumps, link })
    }

    pub fn pumps(&self) -> &[Pump] {
        &self.pumps
    }

    pub fn pump(&self, handle: PumpHandle) -> Option<&Pump> {
        self.pumps
            .get(usize::from(handle.id().0))
            .filter(|p| p.handle() == handle)
    }

    pub fn pump_by_name(&self, name: &str) -> Option<&Pump> {
        self.pumps.iter().find(|p| p.name() == name)
    }

    pub fn link(&self) -> &HardwareLink {
        &self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Send a stop to every channel. Best effort: errors are logged.
    ///
    /// Returns the number of stops acknowledged.
    pub fn stop_all(&self) -> usize {
        let Some(iface) = self.link.iface() else {
            warn!("board: stop_all while disconnected");
            return 0;
        };
        let mut acked = 0;
        for pump in &self.pumps {
            match iface.stop_pump(pump.handle().pos()) {
                Ok(()) => acked += 1,
                Err(e) => warn!("board: stop {} failed: {}", pump.name(), e),
            }
        }
        acked
    }
}
