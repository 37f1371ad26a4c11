//! Trains leaving and entering depots.

use super::choose::{free_train_reservation, try_path_reserve};
use super::consist::{Consist, Placement};
use super::trail::{step_len, Trail, TrailStep};
use crate::map::{CompanyId, TileIndex};
use crate::order::Order;
use crate::pathpos::PathPos;
use crate::pbs::{force_reserve_rail_track, unreserve_rail_track};
use crate::signal::{segment_state, SigSegState, SignalUpdateBatch};
use crate::state::WorldState;
use crate::vehicle::VehicleId;

/// Put a started train inside `depot` on the track, if the way out is
/// clear. Returns whether the train left.
pub(super) fn leave_depot(
    state: &mut WorldState,
    batch: &mut SignalUpdateBatch,
    front: VehicleId,
    c: &mut Consist,
    owner: CompanyId,
    depot: TileIndex,
) -> bool {
    let Some(info) = state.map.depot(depot).copied() else {
        return false;
    };
    // Someone is using the depot entrance
    if info.reserved {
        return false;
    }
    let seg = segment_state(state, depot, info.exit);
    if seg == SigSegState::Full {
        return false;
    }

    let head = PathPos::new(depot, info.exit.diagonal_trackdir());
    let len = step_len(&state.map, &head, c.length);
    force_reserve_rail_track(&mut state.map, depot, head.td.track());
    c.placement = Placement::OnTrack(Trail::new(TrailStep::new(head, len), c.length.clamp(1, len)));

    if seg == SigSegState::Pbs && !try_path_reserve(state, c, front, owner, head) {
        unreserve_rail_track(&mut state.map, depot, head.td.track());
        c.placement = Placement::InDepot(depot);
        return false;
    }
    batch.add_depot(&state.map, depot);
    c.speed = 0;
    c.progress = 0;
    log::debug!("train {front} leaves depot {depot}");
    true
}

/// The whole train has driven into `depot`.
pub(super) fn enter_depot(
    state: &mut WorldState,
    batch: &mut SignalUpdateBatch,
    front: VehicleId,
    c: &mut Consist,
    owner: CompanyId,
    depot: TileIndex,
) {
    free_train_reservation(state, c, owner);
    if let Some(trail) = c.trail() {
        for step in trail.steps() {
            if !step.pos.is_in_wormhole() {
                unreserve_rail_track(&mut state.map, step.pos.tile, step.pos.td.track());
            }
        }
    }
    batch.add_depot(&state.map, depot);

    c.placement = Placement::InDepot(depot);
    c.speed = 0;
    c.progress = 0;
    c.wait_counter = 0;
    c.flags.path_reserved = false;
    c.flags.stuck = false;
    c.stuck = Default::default();

    if let Order::GoToDepot { depot: target, halt } = c.orders.current() {
        if target.map_or(true, |t| t == depot) {
            if halt {
                c.flags.stopped = true;
            }
            c.orders.advance();
        }
    }
    log::debug!("train {front} entered depot {depot} (stopped: {})", c.flags.stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_train, MapBuilder, WorldStateBuilder};
    use crate::track::{DiagDirection, TrackBits};
    use crate::train::tick_train;

    #[test]
    fn test_started_train_leaves_and_reserves_exit() {
        let map = MapBuilder::new(10, 3)
            .rail_x(1, 1..10)
            .depot(0, 1, DiagDirection::SW)
            .build();
        let depot = map.tile(0, 1);
        let mut state = WorldStateBuilder::new(map).company(0, 100_000).build();
        let front = build_train(&mut state, depot, &[0, 2]);
        state.consist_mut(front).unwrap().flags.stopped = false;

        tick_train(&mut state, front);
        let c = state.consist(front).unwrap();
        assert!(c.trail().is_some());
        assert_eq!(state.map.reserved_track_bits(depot), TrackBits::X);
    }

    #[test]
    fn test_train_stays_while_depot_entrance_is_reserved() {
        let map = MapBuilder::new(10, 3)
            .rail_x(1, 1..10)
            .depot(0, 1, DiagDirection::SW)
            .build();
        let depot = map.tile(0, 1);
        let mut state = WorldStateBuilder::new(map).company(0, 100_000).build();
        let front = build_train(&mut state, depot, &[0]);
        state.consist_mut(front).unwrap().flags.stopped = false;
        force_reserve_rail_track(&mut state.map, depot, crate::track::Track::X);

        tick_train(&mut state, front);
        assert_eq!(state.consist(front).unwrap().depot(), Some(depot));
    }
}
