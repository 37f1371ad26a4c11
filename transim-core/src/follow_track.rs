//! Step from one tile to the trackdirs reachable on the next.
//!
//! The follower is shared by the pathfinders, the reservation walker and the
//! train controller, so every rule about which tile can be entered from where
//! lives here: wormhole jumps, depot ends, ownership, rail type and 90 degree
//! turns.

use crate::map::{CompanyId, Map, RailTypes, TileIndex, TileKind};
use crate::pathpos::PathPos;
use crate::track::{DiagDirection, TrackBits, Trackdir, TrackdirBits};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FollowError {
    #[error("no connecting track")]
    NoWay,
    #[error("track owned by another company")]
    Owner,
    #[error("incompatible rail type")]
    RailType,
    #[error("only 90 degree turns available")]
    NinetyDegrees,
    #[error("track ahead is reserved")]
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Rail {
        compatible: RailTypes,
        owner: Option<CompanyId>,
    },
    Water,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowResult {
    pub old_tile: TileIndex,
    pub old_td: Trackdir,
    pub new_tile: TileIndex,
    pub new_td_bits: TrackdirBits,
    pub exitdir: DiagDirection,
    /// Middle tiles jumped over when crossing a tunnel or bridge.
    pub tiles_skipped: u32,
    pub is_wormhole: bool,
    pub is_station: bool,
    /// Turned around at the back wall of a depot.
    pub reversed_in_depot: bool,
}

impl FollowResult {
    /// The single reachable trackdir, if there is exactly one.
    pub fn single(&self) -> Option<Trackdir> {
        self.new_td_bits.single()
    }
}

/// Movement rules of one vehicle. The map is passed per call so callers can
/// mutate reservations between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFollower {
    mode: TransportMode,
    forbid_90: bool,
}

impl TrackFollower {
    pub fn rail(compatible: RailTypes, owner: Option<CompanyId>, forbid_90: bool) -> Self {
        Self {
            mode: TransportMode::Rail { compatible, owner },
            forbid_90,
        }
    }

    pub fn water(forbid_90: bool) -> Self {
        Self {
            mode: TransportMode::Water,
            forbid_90,
        }
    }

    pub fn forbid_90(&self) -> bool {
        self.forbid_90
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    fn is_rail(&self) -> bool {
        matches!(self.mode, TransportMode::Rail { .. })
    }

    fn track_bits(&self, map: &Map, tile: TileIndex) -> TrackBits {
        match self.mode {
            TransportMode::Rail { .. } => map.rail_track_bits(tile),
            TransportMode::Water => map.water_track_bits(tile),
        }
    }

    pub fn follow_pos(&self, map: &Map, pos: &PathPos) -> Result<FollowResult, FollowError> {
        match pos.wormhole {
            Some(far) => {
                let exitdir = pos.td.exitdir();
                Ok(FollowResult {
                    old_tile: pos.tile,
                    old_td: pos.td,
                    new_tile: far,
                    new_td_bits: exitdir.diagonal_trackdir().bit(),
                    exitdir,
                    tiles_skipped: 0,
                    is_wormhole: true,
                    is_station: false,
                    reversed_in_depot: false,
                })
            }
            None => self.follow(map, pos.tile, pos.td),
        }
    }

    pub fn follow(
        &self,
        map: &Map,
        old_tile: TileIndex,
        old_td: Trackdir,
    ) -> Result<FollowResult, FollowError> {
        let exitdir = old_td.exitdir();
        let mut res = FollowResult {
            old_tile,
            old_td,
            new_tile: old_tile,
            new_td_bits: TrackdirBits::NONE,
            exitdir,
            tiles_skipped: 0,
            is_wormhole: false,
            is_station: false,
            reversed_in_depot: false,
        };

        // Rail depots turn trains around at the back wall
        if let (true, Some(depot)) = (self.is_rail(), map.depot(old_tile)) {
            if depot.exit != exitdir {
                res.new_td_bits = old_td.reverse().bit();
                res.exitdir = depot.exit;
                res.reversed_in_depot = true;
                return Ok(res);
            }
        }
        if let TileKind::ShipDepot { exit } = map.get(old_tile).kind {
            if !self.is_rail() && exit != exitdir {
                return Err(FollowError::NoWay);
            }
        }

        match map.wormhole(old_tile) {
            Some(w) if w.dir == exitdir => {
                res.new_tile = w.other_end;
                res.tiles_skipped = map
                    .distance_manhattan(old_tile, w.other_end)
                    .saturating_sub(1);
                res.is_wormhole = true;
            }
            _ => {
                res.new_tile = map
                    .add_diagdir(old_tile, exitdir)
                    .ok_or(FollowError::NoWay)?;
            }
        }
        let new_tile = res.new_tile;
        res.is_station = self.is_rail() && map.station(new_tile).is_some();

        res.new_td_bits =
            self.track_bits(map, new_tile).to_trackdir_bits() & exitdir.reaches_trackdirs();
        if res.new_td_bits.is_empty() {
            return Err(FollowError::NoWay);
        }
        self.can_enter(map, &res)?;

        if self.forbid_90 {
            res.new_td_bits = res.new_td_bits & !old_td.crosses_trackdirs();
            if res.new_td_bits.is_empty() {
                return Err(FollowError::NinetyDegrees);
            }
        }
        Ok(res)
    }

    fn can_enter(&self, map: &Map, res: &FollowResult) -> Result<(), FollowError> {
        let tile = res.new_tile;
        let exitdir = res.exitdir;

        if !res.is_wormhole {
            if let Some(w) = map.wormhole(tile) {
                if w.dir != exitdir {
                    return Err(FollowError::NoWay);
                }
            }
        }
        match map.get(tile).kind {
            TileKind::Depot(depot) if depot.exit.reverse() != exitdir => {
                return Err(FollowError::NoWay)
            }
            TileKind::ShipDepot { exit } if exit.reverse() != exitdir => {
                return Err(FollowError::NoWay)
            }
            _ => {}
        }

        if let TransportMode::Rail { compatible, owner } = self.mode {
            if owner.is_some() && map.get(tile).owner != owner {
                return Err(FollowError::Owner);
            }
            match map.rail_type(tile) {
                Some(rt) if compatible.has(rt) => {}
                _ => return Err(FollowError::RailType),
            }
        }
        Ok(())
    }

    /// Remove trackdirs whose track is reserved, or would form a second path
    /// through the tile together with the existing reservation.
    pub fn mask_reserved_tracks(
        &self,
        map: &Map,
        res: &mut FollowResult,
    ) -> Result<(), FollowError> {
        let reserved = map.reserved_track_bits(res.new_tile);
        let mut bits = res.new_td_bits & !reserved.to_trackdir_bits();
        for track in bits.to_track_bits().iter() {
            if (reserved | track.bit()).overlap() {
                bits = bits & !track.trackdirs();
            }
        }
        res.new_td_bits = bits;
        if bits.is_empty() {
            return Err(FollowError::Reserved);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::RailType;
    use crate::testing::MapBuilder;

    #[test]
    fn test_follow_straight_and_off_map() {
        let map = MapBuilder::new(8, 4).rail_x(1, 0..8).build();
        let f = TrackFollower::rail(RailTypes::ALL, None, false);
        let res = f.follow(&map, map.tile(3, 1), Trackdir::XSw).unwrap();
        assert_eq!(res.new_tile, map.tile(4, 1));
        assert_eq!(res.single(), Some(Trackdir::XSw));

        assert_eq!(f.follow(&map, map.tile(7, 1), Trackdir::XSw), Err(FollowError::NoWay));
    }

    #[test]
    fn test_depot_reverses_at_back_wall() {
        let map = MapBuilder::new(8, 4)
            .rail_x(1, 1..8)
            .depot(0, 1, DiagDirection::SW)
            .build();
        let f = TrackFollower::rail(RailTypes::ALL, None, false);
        let depot = map.tile(0, 1);

        let res = f.follow(&map, depot, Trackdir::XNe).unwrap();
        assert!(res.reversed_in_depot);
        assert_eq!(res.new_tile, depot);
        assert_eq!(res.single(), Some(Trackdir::XSw));

        let into = f.follow(&map, map.tile(1, 1), Trackdir::XNe).unwrap();
        assert_eq!(into.new_tile, depot);
    }

    #[test]
    fn test_wormhole_jump_counts_skipped_tiles() {
        let map = MapBuilder::new(12, 4)
            .rail_x(1, 0..3)
            .tunnel_x(1, 3, 8)
            .rail_x(1, 9..12)
            .build();
        let f = TrackFollower::rail(RailTypes::ALL, None, false);

        let res = f.follow(&map, map.tile(3, 1), Trackdir::XSw).unwrap();
        assert!(res.is_wormhole);
        assert_eq!(res.new_tile, map.tile(8, 1));
        assert_eq!(res.tiles_skipped, 4);

        // Entering the head from outside is a plain step
        let side = f.follow(&map, map.tile(2, 1), Trackdir::XSw).unwrap();
        assert_eq!(side.new_tile, map.tile(3, 1));
    }

    #[test]
    fn test_rail_type_and_owner_checks() {
        let map = MapBuilder::new(8, 4)
            .rail_x(1, 0..4)
            .rail_type(RailType::Monorail)
            .rail_x(1, 4..8)
            .build();
        let f = TrackFollower::rail(RailType::Rail.compatible(), None, false);
        assert_eq!(
            f.follow(&map, map.tile(3, 1), Trackdir::XSw),
            Err(FollowError::RailType)
        );

        let owned = TrackFollower::rail(RailTypes::ALL, Some(1), false);
        assert_eq!(
            owned.follow(&map, map.tile(2, 1), Trackdir::XSw),
            Err(FollowError::Owner)
        );
    }

    #[test]
    fn test_forbid_90_masks_crossing_corner() {
        // Upper corner followed by a right corner is a 90 degree turn
        let map = MapBuilder::new(8, 8)
            .tracks(3, 3, TrackBits::UPPER)
            .tracks(3, 2, TrackBits::RIGHT)
            .build();
        let allowed = TrackFollower::rail(RailTypes::ALL, None, false);
        let res = allowed.follow(&map, map.tile(3, 3), Trackdir::UpperW).unwrap();
        assert_eq!(res.new_tile, map.tile(3, 2));
        assert_eq!(res.single(), Some(Trackdir::RightN));

        let forbidden = TrackFollower::rail(RailTypes::ALL, None, true);
        assert_eq!(
            forbidden.follow(&map, map.tile(3, 3), Trackdir::UpperW),
            Err(FollowError::NinetyDegrees)
        );
    }

    #[test]
    fn test_mask_reserved_tracks_blocks_crossing_path() {
        let mut map = MapBuilder::new(8, 8)
            .rail_x(3, 0..8)
            .tracks(4, 3, TrackBits::X | TrackBits::Y)
            .build();
        if let Some(rail) = map.rail_mut(map.tile(4, 3)) {
            rail.reserved = TrackBits::Y;
        }
        let f = TrackFollower::rail(RailTypes::ALL, None, false);
        let mut res = f.follow(&map, map.tile(3, 3), Trackdir::XSw).unwrap();
        assert_eq!(f.mask_reserved_tracks(&map, &mut res), Err(FollowError::Reserved));
    }
}
