//! Train route search.
//!
//! Nodes are single track positions. A node also remembers how many signals
//! the path has passed and what the last one looked like; the cost of a step
//! depends on that history, but the closed list only looks at the position.

use super::{distance_estimate, Destination, FindDepotData, PfResult};
use crate::config::{PathfinderSettings, YAPF_TILE_CORNER_LENGTH, YAPF_TILE_LENGTH};
use crate::follow_track::{FollowResult, TrackFollower};
use crate::map::{Map, TileIndex};
use crate::pathpos::PathPos;
use crate::pbs::{
    is_safe_waiting_position, is_waiting_position_free, reserve_path, track_overlaps_tracks,
    PbsTileInfo,
};
use crate::pool::Pool;
use crate::signal::{signals_on, SignalState};
use crate::station::{platform_length, Station};
use crate::track::{Trackdir, TILE_UNITS};
use game_pathfinding::{AStar, SearchLimits, SearchResult, SearchSpace};
use tracing::instrument;

/// Who is searching and for what.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailRequest {
    pub follower: TrackFollower,
    pub destination: Destination,
    /// Train length in movement units.
    pub length: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RailNode {
    pos: PathPos,
    /// Signals facing the path passed so far.
    signals: u8,
    /// The last signal passed was a path signal. Origins count as one.
    last_pbs: bool,
    /// The last signal passed was a red block signal.
    last_red_block: bool,
}

impl RailNode {
    fn origin(pos: PathPos) -> Self {
        Self {
            pos,
            signals: 0,
            last_pbs: true,
            last_red_block: false,
        }
    }
}

struct RailSpace<'a> {
    map: &'a Map,
    settings: &'a PathfinderSettings,
    req: &'a RailRequest,
    target: Option<TileIndex>,
    /// Skip tracks reserved by anyone.
    free_only: bool,
}

impl<'a> RailSpace<'a> {
    fn new(
        map: &'a Map,
        stations: &Pool<Station>,
        settings: &'a PathfinderSettings,
        req: &'a RailRequest,
        from: TileIndex,
    ) -> Self {
        Self {
            map,
            settings,
            req,
            target: req.destination.target_tile(map, stations, from),
            free_only: req.destination == Destination::AnySafeTile,
        }
    }

    fn look_ahead_cost(&self, i: u32) -> i32 {
        let s = self.settings;
        if i >= s.rail_look_ahead_max_signals {
            return 0;
        }
        let i = i as i32;
        s.rail_look_ahead_signal_p0 + i * (s.rail_look_ahead_signal_p1 + i * s.rail_look_ahead_signal_p2)
    }

    fn platform_penalty(&self, tile: TileIndex) -> i32 {
        let s = self.settings;
        let needed = self.req.length.div_ceil(TILE_UNITS) as i32;
        let missing = needed - platform_length(self.map, tile) as i32;
        if missing < 0 {
            s.rail_longer_platform_penalty + s.rail_longer_platform_per_tile_penalty * -missing
        } else if missing > 0 {
            s.rail_shorter_platform_penalty + s.rail_shorter_platform_per_tile_penalty * missing
        } else {
            0
        }
    }

    fn goal_pos(&self, pos: &PathPos) -> bool {
        if pos.is_in_wormhole() {
            return false;
        }
        let map = self.map;
        match self.req.destination {
            Destination::Station(id) => map.station(pos.tile).is_some_and(|st| st.station == id),
            Destination::Tile(t) => {
                pos.tile == t && map.depot(t).map_or(true, |d| d.exit != pos.td.exitdir())
            }
            Destination::AnyDepot => map.depot(pos.tile).is_some_and(|d| d.exit != pos.td.exitdir()),
            Destination::AnySafeTile => {
                is_safe_waiting_position(map, &self.req.follower, pos, true)
                    && is_waiting_position_free(map, &self.req.follower, pos)
            }
        }
    }

    /// Node and step cost for moving from `parent` onto `td` of the tile
    /// `ft` leads to. `None` when a signal forbids the move.
    fn enter(&self, parent: &RailNode, ft: &FollowResult, td: Trackdir) -> Option<(RailNode, u32)> {
        let map = self.map;
        let s = self.settings;
        let tile = ft.new_tile;
        let pos = PathPos::new(tile, td);
        let mut node = RailNode { pos, ..*parent };

        let mut cost = if td.is_diagonal() {
            YAPF_TILE_LENGTH
        } else {
            YAPF_TILE_CORNER_LENGTH
        };
        cost += ft.tiles_skipped as i32 * YAPF_TILE_LENGTH;

        let prev = parent.pos.td;
        if ft.reversed_in_depot {
            cost += s.rail_depot_reverse_penalty;
        } else if prev.crosses_trackdirs().has(td) {
            cost += s.rail_curve90_penalty;
        } else if td != prev.next() {
            cost += s.rail_curve45_penalty;
        }

        if td.is_diagonal() && map.slope_effect(tile, td.enterdir()) == Some(true) {
            cost += s.rail_slope_penalty;
        }

        // Other trains' reservations count until a few signals ahead
        if (parent.signals as u32) < s.rail_look_ahead_max_signals / 2 && parent.last_pbs {
            if let Some(st) = map.station(tile) {
                if st.reserved {
                    cost += s.rail_pbs_station_penalty;
                }
            } else if track_overlaps_tracks(map.reserved_track_bits(tile), td.track()) {
                let mut c = s.rail_pbs_cross_penalty;
                if !td.is_diagonal() {
                    c = c * YAPF_TILE_CORNER_LENGTH / YAPF_TILE_LENGTH;
                }
                cost += c * (ft.tiles_skipped as i32 + 1);
            }
        }

        let goal = self.goal_pos(&pos);
        if map.station(tile).is_some() && !goal {
            cost += s.rail_station_penalty;
        }

        if let Some(sig) = signals_on(map, tile, td.track()) {
            let passed = parent.signals as u32;
            if sig.has_on(td) {
                let ahead = self.look_ahead_cost(passed);
                let red = sig.state(td) == SignalState::Red;
                if !red {
                    if ahead < 0 {
                        cost -= ahead;
                    }
                } else if !sig.is_pbs() {
                    if passed == 0 {
                        cost += s.rail_firstred_penalty;
                    }
                    if ahead > 0 {
                        cost += ahead;
                    }
                }
                node.signals = parent.signals.saturating_add(1);
                node.last_pbs = sig.is_pbs();
                node.last_red_block = red && !sig.is_pbs();
            } else if sig.has_on(td.reverse()) {
                if sig.is_oneway() {
                    return None;
                }
                if passed < s.rail_look_ahead_max_signals {
                    cost += s.rail_pbs_signal_back_penalty;
                }
            }
        }

        if goal {
            if node.last_red_block {
                cost += s.rail_lastred_penalty;
            }
            if matches!(self.req.destination, Destination::Station(_)) {
                cost += self.platform_penalty(tile);
            }
        }
        Some((node, cost.max(0) as u32))
    }
}

impl SearchSpace for RailSpace<'_> {
    type Node = RailNode;
    type Key = PathPos;

    fn key(&self, node: &RailNode) -> PathPos {
        node.pos
    }

    fn successors(&mut self, node: &RailNode, out: &mut Vec<(RailNode, u32)>) {
        let follower = &self.req.follower;
        let Ok(mut ft) = follower.follow_pos(self.map, &node.pos) else {
            return;
        };
        if self.free_only && follower.mask_reserved_tracks(self.map, &mut ft).is_err() {
            return;
        }
        for td in ft.new_td_bits.iter() {
            if let Some(step) = self.enter(node, &ft, td) {
                out.push(step);
            }
        }
    }

    fn estimate(&self, node: &RailNode) -> u32 {
        if self.goal_pos(&node.pos) {
            return 0;
        }
        match self.target {
            Some(dest) => distance_estimate(self.map, node.pos.tile, node.pos.td, dest),
            None => 0,
        }
    }

    fn is_goal(&self, node: &RailNode) -> bool {
        self.goal_pos(&node.pos)
    }
}

fn limits(settings: &PathfinderSettings) -> SearchLimits {
    SearchLimits {
        max_nodes: settings.max_search_nodes,
    }
}

/// Index of the node a reservation along `path` should end at: the first
/// safe waiting position reached before passing a second signal, or the end
/// of the path.
fn reservation_target(map: &Map, follower: &TrackFollower, path: &[RailNode]) -> usize {
    let last = path.len().saturating_sub(1);
    (0..path.len())
        .find(|&i| {
            let parent_signals = if i == 0 { 0 } else { path[i - 1].signals };
            parent_signals < 2 && is_safe_waiting_position(map, follower, &path[i].pos, true)
        })
        .unwrap_or(last)
}

/// Reserve `path[from..=target]`, all or nothing.
fn try_reserve_path(
    map: &mut Map,
    follower: &TrackFollower,
    path: &[RailNode],
    from: usize,
) -> PbsTileInfo {
    let target = reservation_target(map, follower, path);
    let end = path[target].pos;
    if target < from || !is_waiting_position_free(map, follower, &end) {
        return PbsTileInfo::new(end, false);
    }
    let positions: Vec<PathPos> = path[from..=target].iter().map(|n| n.pos).collect();
    match reserve_path(map, &positions) {
        Ok(()) => PbsTileInfo::new(end, true),
        Err(tile) => {
            log::trace!("path reservation failed at {tile}");
            PbsTileInfo::new(end, false)
        }
    }
}

fn run(space: &mut RailSpace<'_>, origins: &[(RailNode, u32)]) -> SearchResult<RailNode> {
    let result = AStar::search(space, origins, limits(space.settings));
    log::trace!(
        "rail search {:?}: {:?} after {} nodes, cost {}",
        space.req.destination,
        result.status,
        result.expanded,
        result.cost
    );
    result
}

/// Pick a trackdir on the tile `choice` leads to. With `reserve`, also
/// reserve along the chosen path up to a safe waiting position.
#[instrument(skip_all, name = "yapf_train_choose_track", level = "debug")]
pub fn yapf_train_choose_track(
    map: &mut Map,
    stations: &Pool<Station>,
    settings: &PathfinderSettings,
    req: &RailRequest,
    choice: &FollowResult,
    reserve: bool,
) -> PfResult {
    let result = {
        let mut space = RailSpace::new(map, stations, settings, req, choice.old_tile);
        let parent = RailNode::origin(PathPos::new(choice.old_tile, choice.old_td));
        let origins: Vec<(RailNode, u32)> = choice
            .new_td_bits
            .iter()
            .filter_map(|td| space.enter(&parent, choice, td))
            .collect();
        if origins.is_empty() {
            return PfResult::none();
        }
        run(&mut space, &origins)
    };
    let Some(first) = result.path.first() else {
        return PfResult::none();
    };
    let path_found = result.found();
    let target = (reserve && path_found)
        .then(|| try_reserve_path(map, &req.follower, &result.path, 0));
    PfResult {
        td: Some(first.pos.td),
        path_found,
        target,
    }
}

/// Nearest depot reachable from the front, or from the rear after turning
/// around. `max_cost` of zero means no limit.
#[instrument(skip_all, name = "yapf_train_find_nearest_depot", level = "debug")]
pub fn yapf_train_find_nearest_depot(
    map: &Map,
    stations: &Pool<Station>,
    settings: &PathfinderSettings,
    req: &RailRequest,
    front: PathPos,
    rear_reversed: PathPos,
    max_cost: u32,
) -> FindDepotData {
    let req = RailRequest {
        destination: Destination::AnyDepot,
        ..*req
    };
    let mut space = RailSpace::new(map, stations, settings, &req, front.tile);
    let origins = [
        (RailNode::origin(front), 0),
        (
            RailNode::origin(rear_reversed),
            settings.rail_depot_reverse_penalty.max(0) as u32,
        ),
    ];
    let result = run(&mut space, &origins);
    let not_found = FindDepotData {
        tile: None,
        best_length: u32::MAX,
        reverse: false,
    };
    if !result.found() || (max_cost != 0 && result.cost > max_cost) {
        return not_found;
    }
    match (result.path.first(), result.path.last()) {
        (Some(origin), Some(goal)) => FindDepotData {
            tile: Some(goal.pos.tile),
            best_length: result.cost,
            reverse: origin.pos == rear_reversed && rear_reversed != front,
        },
        _ => not_found,
    }
}

/// Whether the destination is better reached by turning around.
#[instrument(skip_all, name = "yapf_train_check_reverse", level = "debug")]
pub fn yapf_train_check_reverse(
    map: &Map,
    stations: &Pool<Station>,
    settings: &PathfinderSettings,
    req: &RailRequest,
    front: PathPos,
    rear_reversed: PathPos,
) -> bool {
    let mut space = RailSpace::new(map, stations, settings, req, front.tile);
    let origins = [
        (RailNode::origin(front), 0),
        (RailNode::origin(rear_reversed), 0),
    ];
    let result = run(&mut space, &origins);
    result.found() && result.origin().is_some_and(|o| o.pos == rear_reversed && o.pos != front)
}

/// Find and reserve a path from the reservation end `origin` to any free
/// safe waiting position, avoiding reserved track.
#[instrument(skip_all, name = "yapf_train_find_safe_tile", level = "debug")]
pub fn yapf_train_find_safe_tile(
    map: &mut Map,
    stations: &Pool<Station>,
    settings: &PathfinderSettings,
    req: &RailRequest,
    origin: PathPos,
) -> Option<PbsTileInfo> {
    let req = RailRequest {
        destination: Destination::AnySafeTile,
        ..*req
    };
    let result = {
        let mut space = RailSpace::new(map, stations, settings, &req, origin.tile);
        run(&mut space, &[(RailNode::origin(origin), 0)])
    };
    if !result.found() || result.path.len() < 2 {
        return None;
    }
    let positions: Vec<PathPos> = result.path[1..].iter().map(|n| n.pos).collect();
    let end = *positions.last()?;
    reserve_path(map, &positions).ok()?;
    Some(PbsTileInfo::new(end, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::RailTypes;
    use crate::signal::{SignalVariant, TrackSignals};
    use crate::testing::MapBuilder;
    use crate::track::{DiagDirection, TrackBits};

    fn request(dest: Destination) -> RailRequest {
        RailRequest {
            follower: TrackFollower::rail(RailTypes::ALL, None, false),
            destination: dest,
            length: 16,
        }
    }

    /// Line along y=2 with a spur branching off at x=3 that ends after one
    /// tile.
    fn junction_map() -> Map {
        MapBuilder::new(12, 5)
            .rail_x(2, 0..12)
            .tracks(3, 2, TrackBits::X | TrackBits::UPPER)
            .tracks(3, 1, TrackBits::LOWER)
            .build()
    }

    #[test]
    fn test_choose_straight_when_destination_ahead() {
        let mut map = junction_map();
        let dest = map.tile(10, 2);
        let choice = request(Destination::Tile(dest))
            .follower
            .follow(&map, map.tile(2, 2), Trackdir::XSw)
            .unwrap();
        let res = yapf_train_choose_track(
            &mut map,
            &Pool::new(),
            &PathfinderSettings::default(),
            &request(Destination::Tile(dest)),
            &choice,
            false,
        );
        assert!(res.path_found);
        assert_eq!(res.td, Some(Trackdir::XSw));
        assert_eq!(res.target, None);
    }

    #[test]
    fn test_dead_end_reports_no_path_with_best_guess() {
        let mut map = MapBuilder::new(8, 3).rail_x(1, 0..5).build();
        let req = request(Destination::Tile(map.tile(7, 1)));
        let choice = req.follower.follow(&map, map.tile(1, 1), Trackdir::XSw).unwrap();
        let res = yapf_train_choose_track(
            &mut map,
            &Pool::new(),
            &PathfinderSettings::default(),
            &req,
            &choice,
            false,
        );
        assert!(!res.path_found);
        assert_eq!(res.td, Some(Trackdir::XSw));
    }

    #[test]
    fn test_red_block_signal_penalties() {
        let settings = PathfinderSettings::default();
        let base = MapBuilder::new(12, 4).rail_x(1, 0..12).build();
        let mut map = base.clone();
        if let Some(rail) = map.rail_mut(map.tile(5, 1)) {
            rail.signals[0] = Some(TrackSignals::facing(SignalVariant::Block, Trackdir::XSw));
        }
        let req = request(Destination::Tile(map.tile(10, 1)));
        let mut space = RailSpace::new(&map, &Pool::new(), &settings, &req, map.tile(0, 1));
        let with_signal = run(&mut space, &[(RailNode::origin(PathPos::new(map.tile(0, 1), Trackdir::XSw)), 0)]);
        let mut plain = RailSpace::new(&base, &Pool::new(), &settings, &req, base.tile(0, 1));
        let without = run(&mut plain, &[(RailNode::origin(PathPos::new(base.tile(0, 1), Trackdir::XSw)), 0)]);
        assert!(with_signal.found() && without.found());
        // First red, look-ahead of the first signal, and last red at the end
        assert_eq!(with_signal.cost, without.cost + 1000 + 500 + 1000);
    }

    #[test]
    fn test_oneway_signal_against_is_dead_end() {
        let mut map = MapBuilder::new(8, 3).rail_x(1, 0..8).build();
        if let Some(rail) = map.rail_mut(map.tile(4, 1)) {
            rail.signals[0] = Some(TrackSignals::facing(SignalVariant::PbsOneway, Trackdir::XNe));
        }
        let settings = PathfinderSettings::default();
        let req = request(Destination::Tile(map.tile(7, 1)));
        let mut space = RailSpace::new(&map, &Pool::new(), &settings, &req, map.tile(0, 1));
        let result = run(&mut space, &[(RailNode::origin(PathPos::new(map.tile(0, 1), Trackdir::XSw)), 0)]);
        assert!(!result.found());
    }

    #[test]
    fn test_nearest_depot_behind_needs_reverse() {
        let map = MapBuilder::new(10, 3)
            .rail_x(1, 1..10)
            .depot(0, 1, DiagDirection::SW)
            .build();
        let settings = PathfinderSettings::default();
        let req = request(Destination::AnyDepot);
        let front = PathPos::new(map.tile(4, 1), Trackdir::XSw);
        let rear = PathPos::new(map.tile(3, 1), Trackdir::XNe);
        let found = yapf_train_find_nearest_depot(&map, &Pool::new(), &settings, &req, front, rear, 0);
        assert_eq!(found.tile, Some(map.tile(0, 1)));
        assert!(found.reverse);
    }

    #[test]
    fn test_safe_tile_search_reserves_to_signal() {
        let mut map = MapBuilder::new(10, 3).rail_x(1, 0..10).build();
        if let Some(rail) = map.rail_mut(map.tile(6, 1)) {
            rail.signals[0] = Some(TrackSignals::facing(SignalVariant::Block, Trackdir::XSw));
        }
        let settings = PathfinderSettings::default();
        let req = request(Destination::Tile(map.tile(9, 1)));
        let origin = PathPos::new(map.tile(3, 1), Trackdir::XSw);
        let end = yapf_train_find_safe_tile(&mut map, &Pool::new(), &settings, &req, origin).unwrap();
        assert_eq!(end.pos, PathPos::new(map.tile(6, 1), Trackdir::XSw));
        for x in 4..=6 {
            assert_eq!(map.reserved_track_bits(map.tile(x, 1)), TrackBits::X);
        }
        assert_eq!(map.reserved_track_bits(map.tile(3, 1)), TrackBits::NONE);
    }
}
