//! Trains: composition, movement and the decisions taken along the way.
//!
//! The per-tick entry point is [`tick_train`]. While a train is being moved
//! its [`Consist`] is taken out of the front part, so the rest of the world
//! (map, other trains, stations) stays freely borrowable; it is put back
//! before signals are recomputed and collisions checked.

pub mod choose;
pub mod collision;
pub mod consist;
pub mod controller;
pub mod crash;
pub mod depot;
pub mod reverse;
pub mod trail;

use crate::follow_track::TrackFollower;
use crate::map::CompanyId;
use crate::signal::SignalUpdateBatch;
use crate::state::WorldState;
use crate::vehicle::{part, VehicleId};
use consist::{update_part_positions, Consist};
use tracing::instrument;

/// Track follower with the movement rules of train `c`.
pub fn train_follower(state: &WorldState, c: &Consist, owner: CompanyId) -> TrackFollower {
    TrackFollower::rail(
        c.compatible,
        Some(owner),
        state.settings.pathfinder.forbid_90_deg,
    )
}

/// Advance one train by one tick.
#[instrument(skip_all, name = "tick_train", level = "trace")]
pub fn tick_train(state: &mut WorldState, front: VehicleId) {
    let Some(owner) = part(&state.vehicles, front).map(|p| p.owner) else {
        return;
    };
    let Some(crashed) = state.consist(front).map(|c| c.flags.crashed) else {
        return;
    };
    if crashed {
        crash::handle_crashed_train(state, front);
        return;
    }

    let before = controller::motion_snapshot(state, front);
    let Some(mut c) = state.take_consist(front) else {
        return;
    };
    c.tick_counter = c.tick_counter.wrapping_add(1);

    let mut batch = SignalUpdateBatch::begin(state);
    controller::run(state, &mut batch, front, &mut c, owner);
    state.put_consist(front, c);
    update_part_positions(state, front);
    batch.drain(state);

    controller::apply_motion_effects(state, front, &before);
    collision::check_train_collision(state, front);
}
