//! Turning a train around.
//!
//! Parts are placed at fixed distances behind the front, so a reversal is a
//! mirror of the trail: the old rear end becomes the front, and every part
//! lands at its old distance measured from the other end. Parts of uneven
//! length keep their couplings closed because their centres are placed from
//! the summed lengths of the parts before them, both before and after.

use super::choose::{free_train_reservation, try_path_reserve};
use super::consist::{update_part_positions, Consist, Placement};
use crate::map::CompanyId;
use crate::pbs::force_reserve_rail_track;
use crate::signal::{segment_state, SigSegState};
use crate::state::WorldState;
use crate::vehicle::{part, VehicleId};

/// Reverse a train whose consist has been taken out of the world.
pub fn reverse_consist(state: &mut WorldState, c: &mut Consist, front: VehicleId, owner: CompanyId) {
    c.flags.reverse_pending = false;
    if !matches!(c.placement, Placement::OnTrack(_)) {
        return;
    }
    free_train_reservation(state, c, owner);

    let length = c.length;
    let Placement::OnTrack(trail) = &mut c.placement else {
        return;
    };
    // The trail must end exactly at the rear before it is mirrored
    let stale = trail.trim(length);
    debug_assert!(stale.is_empty(), "train {front} reversed with track left behind");
    let reversed = trail.reversed(length);
    for step in reversed.steps() {
        if !step.pos.is_in_wormhole() {
            force_reserve_rail_track(&mut state.map, step.pos.tile, step.pos.td.track());
        }
    }
    let head = reversed.head_pos();
    *trail = reversed;

    c.speed = 0;
    c.progress = 0;
    c.wait_counter = 0;
    c.flags.stuck = false;
    c.stuck = Default::default();
    log::debug!("train {front} reversed, now heading {head}");

    if segment_state(state, head.tile, head.td.exitdir()) == SigSegState::Pbs {
        try_path_reserve(state, c, front, owner, head);
    }
}

/// Reverse train `front` now if it stands still, or once it has stopped.
pub fn reverse_train(state: &mut WorldState, front: VehicleId) {
    let Some(owner) = part(&state.vehicles, front).map(|p| p.owner) else {
        return;
    };
    let Some(mut c) = state.take_consist(front) else {
        return;
    };
    if c.speed == 0 {
        reverse_consist(state, &mut c, front, owner);
    } else {
        c.flags.reverse_pending = !c.flags.reverse_pending;
    }
    state.put_consist(front, c);
    update_part_positions(state, front);
}
