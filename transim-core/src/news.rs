//! Player-visible advisories.
//!
//! The simulation appends events here; presenting them is up to the caller.

use crate::map::{CompanyId, TileIndex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NewsEvent {
    TrainCrash {
        tick: u64,
        tile: TileIndex,
        /// Crew lost across both consists, two per newly crashed train.
        victims: u32,
    },
    TrainStuck {
        tick: u64,
        company: CompanyId,
        train: usize,
    },
    TrainLost {
        tick: u64,
        company: CompanyId,
        train: usize,
    },
    ShipLost {
        tick: u64,
        company: CompanyId,
        ship: usize,
    },
}

impl NewsEvent {
    pub fn tick(&self) -> u64 {
        match self {
            NewsEvent::TrainCrash { tick, .. }
            | NewsEvent::TrainStuck { tick, .. }
            | NewsEvent::TrainLost { tick, .. }
            | NewsEvent::ShipLost { tick, .. } => *tick,
        }
    }
}
