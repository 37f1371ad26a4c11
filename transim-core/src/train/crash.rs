//! Crashed trains: marking a wreck and clearing it away over time.

use super::choose::free_train_reservation;
use super::consist::{update_part_positions, Placement};
use super::controller::release_behind;
use crate::pbs::{force_reserve_rail_track, unreserve_rail_track};
use crate::signal::SignalUpdateBatch;
use crate::state::WorldState;
use crate::vehicle::{chain, part, part_mut, Vehicle, VehicleId};

/// Crew lost per train that crashes.
pub const VICTIMS_PER_TRAIN: u32 = 2;

/// Smoke is raised while the animation counter is at most this.
const SMOKE_UNTIL: u16 = 200;
/// Wreck parts keep tumbling while the animation counter is at most this.
const TUMBLE_UNTIL: u16 = 240;
/// Parts start disappearing from the rear at this animation counter.
const CLEAR_FROM: u16 = 4440;

/// Mark train `front` crashed. Its reservation ahead is dropped and the
/// track under it stays blocked. Returns the crew lost, zero when the
/// train had already crashed.
pub fn mark_crashed(state: &mut WorldState, front: VehicleId) -> u32 {
    let Some(owner) = part(&state.vehicles, front).map(|p| p.owner) else {
        return 0;
    };
    let Some(mut c) = state.take_consist(front) else {
        return 0;
    };
    if c.flags.crashed {
        state.put_consist(front, c);
        return 0;
    }
    free_train_reservation(state, &mut c, owner);
    c.flags.crashed = true;
    c.flags.stuck = false;
    c.flags.reverse_pending = false;
    c.speed = 0;
    c.progress = 0;
    c.crash_anim_pos = 0;
    if let Some(trail) = c.trail() {
        for step in trail.steps() {
            if !step.pos.is_in_wormhole() {
                force_reserve_rail_track(&mut state.map, step.pos.tile, step.pos.td.track());
            }
        }
    }
    state.put_consist(front, c);
    log::warn!("train {front} of company {owner} crashed");
    VICTIMS_PER_TRAIN
}

/// One tick of a crashed train's animation.
pub fn handle_crashed_train(state: &mut WorldState, front: VehicleId) {
    let Some(c) = state.consist_mut(front) else {
        return;
    };
    c.crash_anim_pos = c.crash_anim_pos.saturating_add(1);
    c.tick_counter = c.tick_counter.wrapping_add(1);
    let anim = c.crash_anim_pos;
    let tick = c.tick_counter;

    if anim <= SMOKE_UNTIL {
        // Smoke is not simulated; the draw keeps the random sequence in step
        let _smoke_roll = state.rng.chance16(1, 7);
    }
    if anim <= TUMBLE_UNTIL && tick & 3 == 0 {
        tumble(state, front);
    }
    if anim >= CLEAR_FROM && tick & 0x1F == 0 {
        remove_last_part(state, front);
    }
}

fn tumble(state: &mut WorldState, front: VehicleId) {
    const TURNS: [i8; 4] = [-1, 0, 0, 1];
    for id in chain(&state.vehicles, front) {
        let turn = TURNS[(state.rng.next_u32() & 3) as usize];
        if let Some(p) = part_mut(&mut state.vehicles, id) {
            p.location.direction = p.location.direction.turn(turn);
        }
    }
}

/// Delete the rearmost part of a wreck, or the whole wreck once only the
/// front is left.
fn remove_last_part(state: &mut WorldState, front: VehicleId) {
    let parts = chain(&state.vehicles, front);
    let Some(&last) = parts.last() else {
        return;
    };
    let mut batch = SignalUpdateBatch::begin(state);

    if last == front {
        if let Some(c) = state.take_consist(front) {
            if let Placement::OnTrack(trail) = &c.placement {
                for step in trail.steps() {
                    batch.add_pos(&step.pos);
                    if !step.pos.is_in_wormhole() {
                        unreserve_rail_track(&mut state.map, step.pos.tile, step.pos.td.track());
                    }
                }
            }
        }
        state.vehicles.remove(front);
        batch.drain(state);
        log::info!("wreck of train {front} cleared");
        return;
    }

    let Some(removed) = state.vehicles.remove(last) else {
        batch.drain(state);
        return;
    };
    let (length, other) = match &removed {
        Vehicle::Train(p) => (p.length, p.other_multihead),
        Vehicle::Ship(_) => (0, None),
    };
    if let Some(prev) = parts.len().checked_sub(2).map(|i| parts[i]) {
        if let Some(p) = part_mut(&mut state.vehicles, prev) {
            p.next = None;
        }
    }
    if let Some(p) = other.and_then(|o| part_mut(&mut state.vehicles, o)) {
        p.other_multihead = None;
    }
    if let Some(mut c) = state.take_consist(front) {
        c.length = c.length.saturating_sub(length);
        release_behind(state, &mut batch, &mut c);
        state.put_consist(front, c);
    }
    update_part_positions(state, front);
    batch.drain(state);
    log::debug!("wreck of train {front} lost part {last}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathpos::PathPos;
    use crate::testing::{build_train, place_train, MapBuilder, WorldStateBuilder};
    use crate::track::{DiagDirection, TrackBits, Trackdir};

    fn crashed_world() -> (WorldState, VehicleId) {
        let map = MapBuilder::new(12, 3)
            .rail_x(1, 1..12)
            .depot(0, 1, DiagDirection::SW)
            .build();
        let depot = map.tile(0, 1);
        let mut state = WorldStateBuilder::new(map).company(0, 100_000).build();
        let front = build_train(&mut state, depot, &[0, 2]);
        let positions: Vec<PathPos> = (1..=4)
            .map(|x| PathPos::new(state.map.tile(x, 1), Trackdir::XSw))
            .collect();
        place_train(&mut state, front, &positions, 8);
        (state, front)
    }

    #[test]
    fn test_crash_counts_victims_once() {
        let (mut state, front) = crashed_world();
        assert_eq!(mark_crashed(&mut state, front), VICTIMS_PER_TRAIN);
        assert_eq!(mark_crashed(&mut state, front), 0);
        let c = state.consist(front).unwrap();
        assert!(c.flags.crashed);
        assert_eq!(c.speed, 0);
    }

    #[test]
    fn test_smoking_wreck_draws_once_per_tick() {
        let (mut state, front) = crashed_world();
        mark_crashed(&mut state, front);
        let mut expected = state.rng;
        expected.chance16(1, 7);

        // First animation tick: smoke only, no tumbling yet
        handle_crashed_train(&mut state, front);
        assert_eq!(state.rng, expected);
    }

    #[test]
    fn test_wreck_is_cleared_and_track_freed() {
        let (mut state, front) = crashed_world();
        mark_crashed(&mut state, front);
        let tile = state.map.tile(4, 1);
        assert_eq!(state.map.reserved_track_bits(tile), TrackBits::X);

        for _ in 0..6000 {
            if !state.vehicles.contains(front) {
                break;
            }
            handle_crashed_train(&mut state, front);
        }
        assert!(!state.vehicles.contains(front));
        for x in 1..=4 {
            assert_eq!(state.map.reserved_track_bits(state.map.tile(x, 1)), TrackBits::NONE);
        }
    }
}
