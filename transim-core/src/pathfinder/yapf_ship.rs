//! Ship route search.

use super::{distance_estimate, Destination, PfResult};
use crate::config::{PathfinderSettings, YAPF_TILE_CORNER_LENGTH, YAPF_TILE_LENGTH};
use crate::engine::EngineInfo;
use crate::follow_track::{FollowResult, TrackFollower};
use crate::map::{Map, TileIndex, WaterClass};
use crate::pathpos::PathPos;
use crate::pool::Pool;
use crate::station::Station;
use crate::track::Trackdir;
use game_pathfinding::{AStar, SearchLimits, SearchSpace};
use tracing::instrument;

struct ShipSpace<'a> {
    map: &'a Map,
    stations: &'a Pool<Station>,
    settings: &'a PathfinderSettings,
    follower: TrackFollower,
    info: &'a EngineInfo,
    destination: Destination,
    target: Option<TileIndex>,
}

impl ShipSpace<'_> {
    fn step_cost(&self, prev: Trackdir, ft: &FollowResult, td: Trackdir) -> u32 {
        let s = self.settings;
        let mut c = if td.is_diagonal() {
            YAPF_TILE_LENGTH
        } else {
            YAPF_TILE_CORNER_LENGTH
        };
        if prev.crosses_trackdirs().has(td) {
            c += s.ship_curve90_penalty;
        } else if td != prev.next() {
            c += s.ship_curve45_penalty;
        }
        c += YAPF_TILE_LENGTH * ft.tiles_skipped as i32;

        let frac = match self.map.water_class(ft.new_tile) {
            Some(WaterClass::Sea) => self.info.ocean_speed_frac,
            _ => self.info.canal_speed_frac,
        } as i32;
        if frac > 0 {
            c += YAPF_TILE_LENGTH * (1 + ft.tiles_skipped as i32) * frac / (256 - frac).max(1);
        }
        c.max(0) as u32
    }

    fn goal(&self, pos: &PathPos) -> bool {
        match self.destination {
            Destination::Station(id) => self
                .stations
                .get(id as usize)
                .is_some_and(|st| st.dock.contains(self.map.size(), pos.tile)),
            Destination::Tile(t) => pos.tile == t,
            Destination::AnyDepot => matches!(
                self.map.get(pos.tile).kind,
                crate::map::TileKind::ShipDepot { exit } if exit != pos.td.exitdir()
            ),
            Destination::AnySafeTile => false,
        }
    }
}

impl SearchSpace for ShipSpace<'_> {
    type Node = PathPos;
    type Key = PathPos;

    fn key(&self, node: &PathPos) -> PathPos {
        *node
    }

    fn successors(&mut self, node: &PathPos, out: &mut Vec<(PathPos, u32)>) {
        let Ok(ft) = self.follower.follow_pos(self.map, node) else {
            return;
        };
        for td in ft.new_td_bits.iter() {
            out.push((PathPos::new(ft.new_tile, td), self.step_cost(node.td, &ft, td)));
        }
    }

    fn estimate(&self, node: &PathPos) -> u32 {
        if self.goal(node) {
            return 0;
        }
        self.target
            .map_or(0, |dest| distance_estimate(self.map, node.tile, node.td, dest))
    }

    fn is_goal(&self, node: &PathPos) -> bool {
        self.goal(node)
    }
}

/// Pick a trackdir for a ship entering the tile `choice` leads to.
#[instrument(skip_all, name = "yapf_ship_choose_track", level = "debug")]
pub fn yapf_ship_choose_track(
    map: &Map,
    stations: &Pool<Station>,
    settings: &PathfinderSettings,
    info: &EngineInfo,
    destination: Destination,
    choice: &FollowResult,
) -> PfResult {
    let mut space = ShipSpace {
        map,
        stations,
        settings,
        follower: TrackFollower::water(settings.forbid_90_deg),
        info,
        destination,
        target: destination.target_tile(map, stations, choice.old_tile),
    };
    let origins: Vec<(PathPos, u32)> = choice
        .new_td_bits
        .iter()
        .map(|td| (PathPos::new(choice.new_tile, td), space.step_cost(choice.old_td, choice, td)))
        .collect();
    let result = AStar::search(
        &mut space,
        &origins,
        SearchLimits {
            max_nodes: settings.max_search_nodes,
        },
    );
    log::trace!("ship search {destination:?}: {:?} after {} nodes", result.status, result.expanded);
    PfResult {
        td: result.path.first().map(|p| p.td),
        path_found: result.found(),
        target: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::engine;
    use crate::testing::MapBuilder;

    #[test]
    fn test_ship_prefers_canal_over_sea_for_barge() {
        // Two parallel water lanes from x=2: canal along y=1, sea along y=3,
        // joined at both ends by a canal column
        let map = MapBuilder::new(10, 5)
            .water(0..10, 1..4, WaterClass::Canal)
            .water(1..9, 2..4, WaterClass::Sea)
            .build();
        let barge = engine(8).unwrap();
        let settings = PathfinderSettings::default();
        let follower = TrackFollower::water(false);
        let choice = follower.follow(&map, map.tile(0, 2), Trackdir::XSw).unwrap();
        let res = yapf_ship_choose_track(
            &map,
            &Pool::new(),
            &settings,
            barge,
            Destination::Tile(map.tile(9, 2)),
            &choice,
        );
        assert!(res.path_found);
        // Sea tiles cost far more, so the ship heads up to the canal row
        assert_ne!(res.td, Some(Trackdir::XSw));
    }
}
