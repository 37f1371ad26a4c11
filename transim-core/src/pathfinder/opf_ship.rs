//! Original ship pathfinder: a short bounded flood ahead of the ship that
//! only ever looks at bird distance to the destination.

use super::PfResult;
use crate::follow_track::{FollowResult, TrackFollower};
use crate::map::{Map, TileIndex};
use crate::pathpos::PathPos;
use crate::rng::SimRandom;
use crate::track::{Direction, Track, Trackdir};

/// Tiles followed from the choice tile before a branch is abandoned.
const MAX_SEARCH_LENGTH: u32 = 50;
/// Junctions turned at before a branch is abandoned.
const MAX_SEARCH_DEPTH: u32 = 4;

/// Heavier weight on the longer axis, so diagonal progress is preferred.
fn distance_max_plus_manhattan(map: &Map, a: TileIndex, b: TileIndex) -> u32 {
    let dx = map.x(a).abs_diff(map.x(b));
    let dy = map.y(a).abs_diff(map.y(b));
    if dx > dy { 2 * dx + dy } else { 2 * dy + dx }
}

struct Flood<'a> {
    map: &'a Map,
    follower: TrackFollower,
    dest: TileIndex,
    best_bird_dist: u32,
    best_length: u32,
}

impl Flood<'_> {
    fn visit(&mut self, pos: PathPos, length: u32, depth: u32, last_track: Track) {
        if pos.tile == self.dest {
            self.best_bird_dist = 0;
            self.best_length = self.best_length.min(length);
            return;
        }
        // Length only counts once the destination has been reached
        let dist = distance_max_plus_manhattan(self.map, pos.tile, self.dest);
        self.best_bird_dist = self.best_bird_dist.min(dist);
        if length >= MAX_SEARCH_LENGTH {
            return;
        }
        let Ok(ft) = self.follower.follow_pos(self.map, &pos) else {
            return;
        };
        let branching = ft.new_td_bits.count() > 1;
        for td in ft.new_td_bits.iter() {
            let mut depth = depth;
            if branching && td.track() != last_track {
                depth += 1;
                if depth > MAX_SEARCH_DEPTH {
                    continue;
                }
            }
            let next = PathPos::new(ft.new_tile, td);
            self.visit(next, length + 1 + ft.tiles_skipped, depth, td.track());
        }
    }
}

/// Tie-break between two equal candidates from a random byte `r`. The
/// bias wraps around, so a low draw still favours a new candidate against
/// one that keeps the heading.
fn coin_prefers_new(r: u32, new_keeps_heading: bool, best_keeps_heading: bool) -> bool {
    let mut r = r;
    if new_keeps_heading {
        r = r.wrapping_add(80);
    }
    if best_keeps_heading {
        r = r.wrapping_sub(80);
    }
    r > 127
}

/// Choose among the trackdirs `choice` offers. Equal candidates are settled
/// by a biased coin that favours keeping the ship's heading.
pub fn opf_ship_choose_track(
    map: &Map,
    heading: Direction,
    dest: TileIndex,
    choice: &FollowResult,
    forbid_90: bool,
    rng: &mut SimRandom,
) -> PfResult {
    let mut best: Option<(Trackdir, u32, u32)> = None;

    for td in choice.new_td_bits.iter() {
        let mut flood = Flood {
            map,
            follower: TrackFollower::water(forbid_90),
            dest,
            best_bird_dist: u32::MAX,
            best_length: u32::MAX,
        };
        flood.visit(PathPos::new(choice.new_tile, td), 0, 0, td.track());
        let (bird, length) = (flood.best_bird_dist, flood.best_length);

        let better = match best {
            None => true,
            Some((best_td, best_bird, best_length)) => {
                // Unreached candidates compare by bird distance, reached ones
                // by path length
                let ordering = if bird != 0 {
                    bird.cmp(&best_bird)
                } else {
                    length.cmp(&best_length)
                };
                match ordering {
                    std::cmp::Ordering::Less => true,
                    std::cmp::Ordering::Greater => false,
                    std::cmp::Ordering::Equal => coin_prefers_new(
                        rng.next_u32() & 0xFF,
                        td.direction() == heading,
                        best_td.direction() == heading,
                    ),
                }
            }
        };
        if better {
            best = Some((td, bird, length));
        }
    }

    match best {
        Some((td, bird, _)) => PfResult {
            td: Some(td),
            path_found: bird == 0,
            target: None,
        },
        None => PfResult::none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::WaterClass;
    use crate::testing::MapBuilder;

    #[test]
    fn test_distance_weights_longer_axis() {
        let map = Map::new(16, 16);
        assert_eq!(distance_max_plus_manhattan(&map, map.tile(0, 0), map.tile(4, 1)), 9);
        assert_eq!(distance_max_plus_manhattan(&map, map.tile(0, 0), map.tile(1, 4)), 9);
        assert_eq!(distance_max_plus_manhattan(&map, map.tile(3, 3), map.tile(3, 3)), 0);
    }

    #[test]
    fn test_coin_bias() {
        assert!(coin_prefers_new(50, true, false));
        assert!(!coin_prefers_new(40, false, false));
        assert!(coin_prefers_new(200, false, false));
        assert!(!coin_prefers_new(100, false, true));
        // Draws below the bias wrap and pick the new candidate
        assert!(coin_prefers_new(10, false, true));
        assert!(!coin_prefers_new(127, true, true));
    }

    #[test]
    fn test_heads_for_reachable_destination() {
        // Canal running along y=2 with a branch up to a dead end at (4,0)
        let map = MapBuilder::new(12, 4)
            .water(0..12, 2..3, WaterClass::Canal)
            .water(4..5, 0..2, WaterClass::Canal)
            .build();
        let follower = TrackFollower::water(false);
        let choice = follower.follow(&map, map.tile(2, 2), Trackdir::XSw).unwrap();
        let mut rng = SimRandom::new(7);
        let res = opf_ship_choose_track(
            &map,
            Direction::SW,
            map.tile(10, 2),
            &choice,
            false,
            &mut rng,
        );
        assert!(res.path_found);
        assert_eq!(res.td, Some(Trackdir::XSw));
    }

    #[test]
    fn test_unreachable_destination_still_picks_a_way() {
        let map = MapBuilder::new(8, 3)
            .water(0..6, 1..2, WaterClass::Canal)
            .build();
        let follower = TrackFollower::water(false);
        let choice = follower.follow(&map, map.tile(1, 1), Trackdir::XSw).unwrap();
        let mut rng = SimRandom::new(1);
        let res = opf_ship_choose_track(
            &map,
            Direction::SW,
            map.tile(7, 2),
            &choice,
            false,
            &mut rng,
        );
        assert!(!res.path_found);
        assert!(res.td.is_some());
    }
}
