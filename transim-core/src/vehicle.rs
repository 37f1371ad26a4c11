//! Vehicle records.
//!
//! Every vehicle lives in one [`Pool`] addressed by [`VehicleId`]. A train is
//! a chain of [`TrainPart`]s linked by index; the [`Consist`] state of the
//! whole train is carried by its first part.

use crate::engine::EngineId;
use crate::map::{CompanyId, TileIndex};
use crate::order::OrderList;
use crate::pathpos::PathPos;
use crate::pool::Pool;
use crate::state::WorldState;
use crate::track::{Direction, TrackBits, Trackdir};
use crate::train::consist::{Consist, Placement};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub type VehicleId = usize;

/// Tracks covered by trains, per tile. Wormhole middles are booked on the
/// head the train entered through.
pub type Occupancy = FxHashMap<TileIndex, TrackBits>;

/// Where one part of a train is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartTrack {
    Track(Trackdir),
    /// Inside the middle of a tunnel or bridge; `tile` is the head entered.
    Wormhole { td: Trackdir, far: TileIndex },
    /// Inside a depot building.
    Depot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartLocation {
    pub tile: TileIndex,
    pub track: PartTrack,
    pub direction: Direction,
    /// Position in 1/16 tile units.
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl PartLocation {
    pub fn in_depot(tile: TileIndex, direction: Direction) -> Self {
        Self {
            tile,
            track: PartTrack::Depot,
            direction,
            x: 0,
            y: 0,
            z: 0,
        }
    }

    pub fn path_pos(&self) -> Option<PathPos> {
        match self.track {
            PartTrack::Track(td) => Some(PathPos::new(self.tile, td)),
            PartTrack::Wormhole { td, far } => Some(PathPos::in_wormhole(self.tile, td, far)),
            PartTrack::Depot => None,
        }
    }

    pub fn is_in_depot(&self) -> bool {
        self.track == PartTrack::Depot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartFlags {
    /// First part of a train, owning its [`Consist`].
    pub front: bool,
    pub engine: bool,
    /// Follower of an articulated vehicle; moves with the part before it.
    pub articulated: bool,
    /// Rear half of a dual-headed engine.
    pub rear_head: bool,
    /// Not drawn: inside a depot building.
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainPart {
    pub engine: EngineId,
    pub owner: CompanyId,
    /// Length in movement units.
    pub length: u16,
    pub first: VehicleId,
    pub next: Option<VehicleId>,
    pub prev: Option<VehicleId>,
    /// The other half of a dual-headed engine.
    pub other_multihead: Option<VehicleId>,
    pub flags: PartFlags,
    pub location: PartLocation,
    /// Only set on the front part of a train.
    pub consist: Option<Box<Consist>>,
}

impl TrainPart {
    /// Whether this part starts a chain that is a train rather than a row of
    /// free wagons.
    pub fn is_front_engine(&self) -> bool {
        self.flags.front && self.consist.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShipFlags {
    pub stopped: bool,
    pub lost: bool,
    pub in_depot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    pub engine: EngineId,
    pub owner: CompanyId,
    pub tile: TileIndex,
    /// Trackdir on `tile`; meaningless while in a depot.
    pub td: Trackdir,
    /// Far head while crossing an aqueduct.
    pub wormhole: Option<TileIndex>,
    /// Units travelled along `td` on the current tile.
    pub progress: u16,
    pub speed: u16,
    pub subspeed: u8,
    pub orders: OrderList,
    pub flags: ShipFlags,
}

impl Ship {
    pub fn pos(&self) -> PathPos {
        match self.wormhole {
            Some(far) => PathPos::in_wormhole(self.tile, self.td, far),
            None => PathPos::new(self.tile, self.td),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vehicle {
    Train(TrainPart),
    Ship(Ship),
}

impl Vehicle {
    pub fn owner(&self) -> CompanyId {
        match self {
            Vehicle::Train(p) => p.owner,
            Vehicle::Ship(s) => s.owner,
        }
    }

    pub fn engine(&self) -> EngineId {
        match self {
            Vehicle::Train(p) => p.engine,
            Vehicle::Ship(s) => s.engine,
        }
    }
}

pub fn part(vehicles: &Pool<Vehicle>, id: VehicleId) -> Option<&TrainPart> {
    match vehicles.get(id) {
        Some(Vehicle::Train(p)) => Some(p),
        _ => None,
    }
}

pub fn part_mut(vehicles: &mut Pool<Vehicle>, id: VehicleId) -> Option<&mut TrainPart> {
    match vehicles.get_mut(id) {
        Some(Vehicle::Train(p)) => Some(p),
        _ => None,
    }
}

pub fn ship(vehicles: &Pool<Vehicle>, id: VehicleId) -> Option<&Ship> {
    match vehicles.get(id) {
        Some(Vehicle::Ship(s)) => Some(s),
        _ => None,
    }
}

pub fn ship_mut(vehicles: &mut Pool<Vehicle>, id: VehicleId) -> Option<&mut Ship> {
    match vehicles.get_mut(id) {
        Some(Vehicle::Ship(s)) => Some(s),
        _ => None,
    }
}

/// Chain members from `first` on, in order.
pub fn chain(vehicles: &Pool<Vehicle>, first: VehicleId) -> Vec<VehicleId> {
    let mut out = Vec::new();
    let mut cur = Some(first);
    while let Some(id) = cur {
        let Some(p) = part(vehicles, id) else {
            break;
        };
        debug_assert!(out.len() <= vehicles.len(), "cycle in chain of {first}");
        out.push(id);
        cur = p.next;
    }
    out
}

/// Every track currently covered by a train.
pub fn rail_occupancy(state: &WorldState) -> Occupancy {
    let mut occ = Occupancy::default();
    for (_, v) in state.vehicles.iter() {
        let Vehicle::Train(p) = v else {
            continue;
        };
        let Some(consist) = &p.consist else {
            continue;
        };
        if let Placement::OnTrack(trail) = &consist.placement {
            for step in trail.steps() {
                *occ.entry(step.pos.tile).or_insert(TrackBits::NONE) |= step.pos.td.track().bit();
            }
        }
    }
    occ
}
