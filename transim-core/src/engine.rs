//! Static engine table.
//!
//! Engine ids index into [`ENGINES`]; their order is shared by every
//! participant and must not change.

use crate::map::{RailType, WaterClass};
use serde::{Deserialize, Serialize};

pub type EngineId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    Train,
    Ship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineClass {
    /// Powered vehicle that can lead a train.
    Locomotive,
    /// Locomotive built as two parts, one at each end of the train.
    Multihead,
    /// Unpowered car.
    Wagon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineInfo {
    pub name: &'static str,
    pub vehicle_type: VehicleType,
    pub class: EngineClass,
    pub rail_type: RailType,
    /// Length of each physical part in movement units. More than one entry
    /// makes an articulated vehicle.
    pub parts: &'static [u16],
    /// Top speed in internal speed units.
    pub max_speed: u16,
    /// Speed gained per tick while accelerating.
    pub acceleration: u16,
    pub cost: i64,
    /// Cost per day of operation.
    pub running_cost: i64,
    /// Share of `max_speed` lost on canals and rivers, out of 256. Ships only.
    pub canal_speed_frac: u8,
    /// Share of `max_speed` lost at sea, out of 256. Ships only.
    pub ocean_speed_frac: u8,
}

impl EngineInfo {
    pub fn is_engine(&self) -> bool {
        self.class != EngineClass::Wagon
    }

    pub fn total_length(&self) -> u16 {
        self.parts.iter().sum()
    }

    /// Top speed of a ship on water of `class`.
    pub fn water_speed_limit(&self, class: WaterClass) -> u16 {
        let frac = match class {
            WaterClass::Sea => self.ocean_speed_frac,
            WaterClass::Canal => self.canal_speed_frac,
        } as u32;
        ((self.max_speed as u32 * (256 - frac)) >> 8).max(1) as u16
    }
}

#[allow(clippy::too_many_arguments)]
const fn rail(
    name: &'static str,
    class: EngineClass,
    rail_type: RailType,
    parts: &'static [u16],
    max_speed: u16,
    acceleration: u16,
    cost: i64,
    running_cost: i64,
) -> EngineInfo {
    EngineInfo {
        name,
        vehicle_type: VehicleType::Train,
        class,
        rail_type,
        parts,
        max_speed,
        acceleration,
        cost,
        running_cost,
        canal_speed_frac: 0,
        ocean_speed_frac: 0,
    }
}

pub const ENGINES: &[EngineInfo] = &[
    rail("Kirby Paul Tank", EngineClass::Locomotive, RailType::Rail, &[8], 256, 4, 5_000, 80),
    rail("Dual Diesel", EngineClass::Multihead, RailType::Rail, &[8], 384, 6, 12_000, 160),
    rail("Passenger Carriage", EngineClass::Wagon, RailType::Rail, &[8], 0, 0, 1_000, 0),
    rail("Mail Van", EngineClass::Wagon, RailType::Rail, &[6], 0, 0, 900, 0),
    rail("Tram Set", EngineClass::Wagon, RailType::Rail, &[6, 6], 0, 0, 1_600, 0),
    rail("Electra", EngineClass::Locomotive, RailType::Electric, &[8], 512, 8, 18_000, 200),
    rail("Maglink", EngineClass::Locomotive, RailType::Monorail, &[8], 640, 10, 24_000, 240),
    rail("Monorail Coach", EngineClass::Wagon, RailType::Monorail, &[8], 0, 0, 1_500, 0),
    EngineInfo {
        name: "Canal Barge",
        vehicle_type: VehicleType::Ship,
        class: EngineClass::Locomotive,
        rail_type: RailType::Rail,
        parts: &[8],
        max_speed: 192,
        acceleration: 4,
        cost: 7_000,
        running_cost: 90,
        canal_speed_frac: 128,
        ocean_speed_frac: 255,
    },
];

pub fn engine(id: EngineId) -> Option<&'static EngineInfo> {
    ENGINES.get(id as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_lengths_are_even() {
        // Part centres must mirror exactly when a train turns around
        for e in ENGINES {
            assert!(e.parts.iter().all(|l| l % 2 == 0), "{}", e.name);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(engine(4).map(|e| e.total_length()), Some(12));
        assert!(engine(ENGINES.len() as EngineId).is_none());
    }

    #[test]
    fn test_barge_crawls_at_sea() {
        let barge = engine(8).unwrap();
        assert_eq!(barge.water_speed_limit(WaterClass::Canal), 96);
        assert_eq!(barge.water_speed_limit(WaterClass::Sea), 1);
    }
}
