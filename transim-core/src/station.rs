//! Stations, waypoints and docks.

use crate::map::{CompanyId, Map, StationId, TileIndex};
use crate::tilearea::OrthogonalTileArea;
use crate::track::DiagDirection;
use serde::{Deserialize, Serialize};

/// Tiles searched around new station parts for a station to join.
pub const STATION_JOIN_RADIUS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub owner: Option<CompanyId>,
    /// Sign position.
    pub xy: TileIndex,
    pub waypoint: bool,
    /// Bounding box of the rail platforms.
    pub train_station: OrthogonalTileArea,
    /// Water tiles ships may dock on.
    pub dock: OrthogonalTileArea,
}

impl Station {
    pub fn new(owner: Option<CompanyId>, xy: TileIndex, waypoint: bool) -> Self {
        Self {
            owner,
            xy,
            waypoint,
            train_station: OrthogonalTileArea::empty(),
            dock: OrthogonalTileArea::empty(),
        }
    }

    /// Tile the pathfinders aim at from `from`.
    pub fn closest_tile(&self, map: &Map, from: TileIndex) -> TileIndex {
        let area = if self.train_station.is_empty() {
            &self.dock
        } else {
            &self.train_station
        };
        area.closest_tile(map.size(), from).unwrap_or(self.xy)
    }
}

fn is_platform_of(map: &Map, tile: TileIndex, station: StationId, dir: DiagDirection) -> bool {
    map.station(tile)
        .is_some_and(|st| st.station == station && st.axis == dir.axis())
}

/// Platform tiles from `tile` (inclusive) up to the platform end in `dir`.
pub fn platform_tiles_ahead(map: &Map, tile: TileIndex, dir: DiagDirection) -> u32 {
    let Some(st) = map.station(tile) else {
        return 0;
    };
    let id = st.station;
    let mut count = 1;
    let mut t = tile;
    while let Some(next) = map.add_diagdir(t, dir) {
        if !is_platform_of(map, next, id, dir) {
            break;
        }
        count += 1;
        t = next;
    }
    count
}

/// Length of the platform `tile` is part of, in tiles.
pub fn platform_length(map: &Map, tile: TileIndex) -> u32 {
    match map.station(tile) {
        Some(st) => {
            let dir = st.axis.track().forward().exitdir();
            platform_tiles_ahead(map, tile, dir) + platform_tiles_ahead(map, tile, dir.reverse()) - 1
        }
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MapBuilder;

    #[test]
    fn test_platform_length_counts_both_directions() {
        let map = MapBuilder::new(10, 4)
            .rail_x(1, 0..10)
            .station_x(1, 3..7, 0)
            .build();
        assert_eq!(platform_length(&map, map.tile(4, 1)), 4);
        assert_eq!(platform_tiles_ahead(&map, map.tile(4, 1), DiagDirection::SW), 3);
        assert_eq!(platform_tiles_ahead(&map, map.tile(4, 1), DiagDirection::NE), 2);
        assert_eq!(platform_length(&map, map.tile(2, 1)), 0);
    }
}
