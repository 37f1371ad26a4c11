//! Track choice and path reservation for the lead part of a train.

use super::consist::Consist;
use super::train_follower;
use crate::follow_track::{FollowResult, TrackFollower};
use crate::map::CompanyId;
use crate::news::NewsEvent;
use crate::pathfinder::yapf_rail::{
    yapf_train_choose_track, yapf_train_find_safe_tile, RailRequest,
};
use crate::pathfinder::Destination;
use crate::pathpos::PathPos;
use crate::pbs::{
    extend_train_reservation, follow_train_reservation, free_reservation_ahead,
    is_safe_waiting_position, Extension,
};
use crate::state::WorldState;
use crate::track::Trackdir;
use crate::vehicle::VehicleId;
use tracing::instrument;

fn request(c: &Consist, follower: TrackFollower) -> Option<RailRequest> {
    Destination::from_order(c.orders.current()).map(|destination| RailRequest {
        follower,
        destination,
        length: c.length,
    })
}

/// Straight on when possible, else the lowest trackdir.
fn default_trackdir(choice: &FollowResult) -> Option<Trackdir> {
    let straight = choice.old_td.next();
    if choice.new_td_bits.has(straight) {
        Some(straight)
    } else {
        choice.new_td_bits.first()
    }
}

fn set_lost(state: &mut WorldState, c: &mut Consist, front: VehicleId, owner: CompanyId, lost: bool) {
    if lost && !c.flags.lost {
        log::debug!("train {front} is lost");
        state.news.push(NewsEvent::TrainLost {
            tick: state.tick,
            company: owner,
            train: front,
        });
    }
    c.flags.lost = lost;
}

/// Pick the trackdir for the lead part on the tile `choice` leads to.
///
/// An existing reservation of the train is followed as is. Otherwise, in
/// reservation mode the path ahead is reserved first; `None` means no path
/// could be reserved and the train has to wait.
#[instrument(skip_all, name = "choose_train_track", level = "debug")]
pub fn choose_train_track(
    state: &mut WorldState,
    c: &mut Consist,
    front: VehicleId,
    owner: CompanyId,
    choice: &FollowResult,
    reserve: bool,
) -> Option<Trackdir> {
    let reserved =
        choice.new_td_bits & state.map.reserved_track_bits(choice.new_tile).to_trackdir_bits();
    if c.flags.path_reserved {
        if let Some(td) = reserved.single() {
            return Some(td);
        }
    }

    if !reserve {
        let follower = train_follower(state, c, owner);
        let Some(req) = request(c, follower) else {
            return default_trackdir(choice);
        };
        if choice.new_td_bits.single().is_some() {
            return choice.new_td_bits.single();
        }
        let res = yapf_train_choose_track(
            &mut state.map,
            &state.stations,
            &state.settings.pathfinder,
            &req,
            choice,
            false,
        );
        set_lost(state, c, front, owner, !res.path_found);
        return res.td.or_else(|| default_trackdir(choice));
    }

    let head = PathPos::new(choice.old_tile, choice.old_td);
    if !try_path_reserve(state, c, front, owner, head) {
        return None;
    }
    let reserved =
        choice.new_td_bits & state.map.reserved_track_bits(choice.new_tile).to_trackdir_bits();
    reserved.first()
}

/// Reserve a path from the train's front at `head` to a safe waiting
/// position. On failure nothing beyond `head` stays reserved.
#[instrument(skip_all, name = "try_path_reserve", level = "debug")]
pub fn try_path_reserve(
    state: &mut WorldState,
    c: &mut Consist,
    front: VehicleId,
    owner: CompanyId,
    head: PathPos,
) -> bool {
    let follower = train_follower(state, c, owner);
    let origin = follow_train_reservation(&state.map, &follower, head);
    if origin.okay && origin.pos != head {
        c.flags.path_reserved = true;
        return true;
    }

    let reserved = match extend_train_reservation(&mut state.map, &follower, origin) {
        Extension::Safe(end) => {
            log::trace!("train {front} reserved up to {end}");
            true
        }
        Extension::Failed => false,
        Extension::Unsafe { end, choice } => {
            let mut target = None;
            if let Some(req) = request(c, follower) {
                let res = yapf_train_choose_track(
                    &mut state.map,
                    &state.stations,
                    &state.settings.pathfinder,
                    &req,
                    &choice,
                    true,
                );
                set_lost(state, c, front, owner, !res.path_found);
                target = res.target.filter(|t| t.okay).map(|t| t.pos);
            }
            match target {
                Some(pos) if is_safe_waiting_position(&state.map, &follower, &pos, true) => true,
                // Reserved up to the destination, which is no place to stop
                Some(pos) => reserve_to_safe_tile(state, c, follower, pos),
                // Lost or nowhere to go: any safe spot will do
                None => reserve_to_safe_tile(state, c, follower, end),
            }
        }
    };

    if !reserved {
        log::debug!("train {front} could not reserve a path from {head}");
        free_reservation_ahead(&mut state.map, &follower, head);
    }
    c.flags.path_reserved = reserved;
    reserved
}

fn reserve_to_safe_tile(
    state: &mut WorldState,
    c: &Consist,
    follower: TrackFollower,
    from: PathPos,
) -> bool {
    let req = RailRequest {
        follower,
        destination: Destination::AnySafeTile,
        length: c.length,
    };
    yapf_train_find_safe_tile(
        &mut state.map,
        &state.stations,
        &state.settings.pathfinder,
        &req,
        from,
    )
    .is_some()
}

/// Drop the train's reservation ahead of its front.
pub fn free_train_reservation(state: &mut WorldState, c: &mut Consist, owner: CompanyId) {
    let Some(head) = c.trail().map(|t| t.head_pos()) else {
        return;
    };
    let follower = train_follower(state, c, owner);
    free_reservation_ahead(&mut state.map, &follower, head);
    c.flags.path_reserved = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::RailTypes;
    use crate::order::{Order, StopLocation};
    use crate::pbs::force_reserve_rail_track;
    use crate::testing::MapBuilder;
    use crate::track::{Track, TrackBits};

    fn consist_to(order: Order) -> Consist {
        let mut c = Consist::in_depot(crate::map::TileIndex(0));
        c.length = 16;
        c.orders.orders.push(order);
        c
    }

    fn follower() -> TrackFollower {
        TrackFollower::rail(RailTypes::ALL, Some(0), false)
    }

    #[test]
    fn test_no_orders_goes_straight() {
        let map = MapBuilder::new(12, 4)
            .rail_x(2, 0..12)
            .tracks(3, 2, TrackBits::X | TrackBits::UPPER)
            .tracks(3, 1, TrackBits::LOWER)
            .build();
        let mut state = crate::testing::WorldStateBuilder::new(map).company(0, 0).build();
        let mut c = consist_to(Order::None);
        let choice = follower()
            .follow(&state.map, state.map.tile(2, 2), Trackdir::XSw)
            .unwrap();
        assert_eq!(choice.new_td_bits.count(), 2);
        let td = choose_train_track(&mut state, &mut c, 0, 0, &choice, false);
        assert_eq!(td, Some(Trackdir::XSw));
        assert!(!c.flags.lost);
    }

    #[test]
    fn test_reservation_to_dead_end_is_safe() {
        let map = MapBuilder::new(8, 3).rail_x(1, 0..6).build();
        let mut state = crate::testing::WorldStateBuilder::new(map).company(0, 0).build();
        let mut c = consist_to(Order::None);
        let head = PathPos::new(state.map.tile(1, 1), Trackdir::XSw);
        force_reserve_rail_track(&mut state.map, head.tile, Track::X);

        assert!(try_path_reserve(&mut state, &mut c, 0, 0, head));
        assert!(c.flags.path_reserved);
        for x in 1..6 {
            assert_eq!(state.map.reserved_track_bits(state.map.tile(x, 1)), TrackBits::X);
        }

        free_train_reservation_at(&mut state, &mut c, head);
        for x in 2..6 {
            assert_eq!(state.map.reserved_track_bits(state.map.tile(x, 1)), TrackBits::NONE);
        }
        assert_eq!(state.map.reserved_track_bits(head.tile), TrackBits::X);
    }

    #[test]
    fn test_reservation_into_dead_end_platform_runs_to_its_end() {
        let map = MapBuilder::new(12, 3)
            .rail_x(1, 0..8)
            .station_x(1, 8..11, 0)
            .build();
        let mut state = crate::testing::WorldStateBuilder::new(map).company(0, 0).build();
        let mut c = consist_to(Order::GoToStation {
            station: 0,
            stop: StopLocation::FarEnd,
        });
        let head = PathPos::new(state.map.tile(5, 1), Trackdir::XSw);
        force_reserve_rail_track(&mut state.map, head.tile, Track::X);

        assert!(try_path_reserve(&mut state, &mut c, 0, 0, head));
        assert!(c.flags.path_reserved);
        for x in 5..=10 {
            assert_eq!(state.map.reserved_track_bits(state.map.tile(x, 1)), TrackBits::X, "tile {x}");
        }

        let end = follow_train_reservation(&state.map, &follower(), head);
        assert_eq!(end.pos, PathPos::new(state.map.tile(10, 1), Trackdir::XSw));
        assert!(is_safe_waiting_position(&state.map, &follower(), &end.pos, true));
        // Nothing lies beyond the platform
        assert_eq!(
            extend_train_reservation(&mut state.map, &follower(), end),
            Extension::Safe(end.pos)
        );
        assert_eq!(state.map.reserved_track_bits(state.map.tile(11, 1)), TrackBits::NONE);
    }

    #[test]
    fn test_failed_reservation_leaves_nothing_behind() {
        let map = MapBuilder::new(8, 3).rail_x(1, 0..8).build();
        let mut state = crate::testing::WorldStateBuilder::new(map).company(0, 0).build();
        let mut c = consist_to(Order::None);
        let head = PathPos::new(state.map.tile(1, 1), Trackdir::XSw);
        force_reserve_rail_track(&mut state.map, head.tile, Track::X);
        // Another train holds the far end
        let far = state.map.tile(5, 1);
        force_reserve_rail_track(&mut state.map, far, Track::X);

        assert!(!try_path_reserve(&mut state, &mut c, 0, 0, head));
        assert!(!c.flags.path_reserved);
        for x in 2..5 {
            assert_eq!(state.map.reserved_track_bits(state.map.tile(x, 1)), TrackBits::NONE);
        }
        assert_eq!(state.map.reserved_track_bits(state.map.tile(5, 1)), TrackBits::X);
    }

    fn free_train_reservation_at(state: &mut WorldState, c: &mut Consist, head: PathPos) {
        let f = follower();
        free_reservation_ahead(&mut state.map, &f, head);
        c.flags.path_reserved = false;
    }
}
