//! Base station (site).

use super::{BsId, CellId};
use raps_core::config::PowerModelConfig;
use raps_core::types::Position;
use serde::{Deserialize, Serialize};

/// A site with its supply power model and the cells it serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStation {
    pub id: BsId,
    pub position: Position,
    /// Supply power model shared by all of this site's cells.
    pub power: PowerModelConfig,
    /// One cell if omnidirectional, three if sectored.
    pub cells: Vec<CellId>,
}

impl BaseStation {
    pub fn new(id: BsId, position: Position, power: PowerModelConfig) -> Self {
        Self {
            id,
            position,
            power,
            cells: Vec::new(),
        }
    }

    /// Supply power while transmitting `ptx` Watts.
    #[inline]
    pub fn active_supply(&self, ptx: f64) -> f64 {
        self.power.p0 + self.power.m * ptx
    }

    /// Whether sleeping draws no more than idling.
    #[inline]
    pub fn sleep_is_cheaper(&self) -> bool {
        self.power.p_s <= self.power.p0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_supply_model() {
        let bs = BaseStation::new(BsId(0), Position::ORIGIN, PowerModelConfig::default());
        assert_relative_eq!(bs.active_supply(0.0), 200.0);
        assert_relative_eq!(bs.active_supply(40.0), 350.0);
        assert!(bs.sleep_is_cheaper());

        let awake = BaseStation::new(
            BsId(1),
            Position::ORIGIN,
            PowerModelConfig {
                p0: 50.0,
                m: 1.0,
                p_s: 90.0,
            },
        );
        assert!(!awake.sleep_is_cheaper());
    }
}
