//! Route search for trains and ships.
//!
//! Both searches run on [`game_pathfinding::AStar`] with one node per
//! `(tile, trackdir)` position. A search only picks a direction; turning a
//! result into reserved track is the caller's business (see
//! [`crate::train::choose`]).

pub mod opf_ship;
pub mod yapf_rail;
pub mod yapf_ship;

use crate::map::{Map, StationId, TileIndex};
use crate::order::Order;
use crate::pbs::PbsTileInfo;
use crate::pool::Pool;
use crate::station::Station;
use crate::track::Trackdir;

/// What a search is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Any platform or dock tile of the station.
    Station(StationId),
    /// One specific tile, such as an ordered depot.
    Tile(TileIndex),
    AnyDepot,
    /// Any free position a train may stop at.
    AnySafeTile,
}

impl Destination {
    /// Search target of a vehicle's current order. `None` when the vehicle
    /// has nowhere to go.
    pub fn from_order(order: Order) -> Option<Destination> {
        match order {
            Order::None => None,
            Order::GoToStation { station, .. } | Order::GoToWaypoint { station } => {
                Some(Destination::Station(station))
            }
            Order::GoToDepot { depot: Some(t), .. } => Some(Destination::Tile(t)),
            Order::GoToDepot { depot: None, .. } => Some(Destination::AnyDepot),
        }
    }

    /// Tile the distance estimate aims at, if there is one.
    pub fn target_tile(
        &self,
        map: &Map,
        stations: &Pool<Station>,
        from: TileIndex,
    ) -> Option<TileIndex> {
        match *self {
            Destination::Station(id) => stations
                .get(id as usize)
                .map(|st| st.closest_tile(map, from)),
            Destination::Tile(t) => Some(t),
            Destination::AnyDepot | Destination::AnySafeTile => None,
        }
    }
}

/// Outcome of a track choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PfResult {
    /// Trackdir to take on the choice tile. `None` means every way is
    /// blocked and turning around is the better option.
    pub td: Option<Trackdir>,
    /// The destination was reached. When false, `td` is only a best guess.
    pub path_found: bool,
    /// End of the reservation made along the path, when one was requested.
    pub target: Option<PbsTileInfo>,
}

impl PfResult {
    pub fn none() -> Self {
        Self {
            td: None,
            path_found: false,
            target: None,
        }
    }
}

/// Outcome of a nearest-depot search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindDepotData {
    pub tile: Option<TileIndex>,
    /// Path cost to the depot.
    pub best_length: u32,
    /// The depot is reached by turning around first.
    pub reverse: bool,
}

/// Estimate used by every destination with a target tile: straight and
/// diagonal moves over doubled coordinates, measured from the edge the
/// vehicle leaves through.
pub fn distance_estimate(map: &Map, tile: TileIndex, td: Trackdir, dest: TileIndex) -> u32 {
    use crate::config::{YAPF_TILE_CORNER_LENGTH, YAPF_TILE_LENGTH};
    let (ox, oy) = td.exitdir().offset();
    let x1 = 2 * map.x(tile) as i32 + ox;
    let y1 = 2 * map.y(tile) as i32 + oy;
    let x2 = 2 * map.x(dest) as i32;
    let y2 = 2 * map.y(dest) as i32;
    let dx = (x1 - x2).abs();
    let dy = (y1 - y2).abs();
    let dmin = dx.min(dy);
    let dxy = (dx - dy).abs();
    let d = dmin * YAPF_TILE_CORNER_LENGTH + (dxy - 1) * (YAPF_TILE_LENGTH / 2);
    d.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_counts_from_exit_edge() {
        let map = Map::new(16, 16);
        let dest = map.tile(10, 4);
        // Leaving towards the target: one half-tile closer
        let toward = distance_estimate(&map, map.tile(4, 4), Trackdir::XSw, dest);
        let away = distance_estimate(&map, map.tile(4, 4), Trackdir::XNe, dest);
        assert_eq!(toward, 10 * 50);
        assert_eq!(away, 12 * 50);
        assert_eq!(distance_estimate(&map, map.tile(10, 4), Trackdir::XNe, map.tile(10, 4)), 0);
    }
}
