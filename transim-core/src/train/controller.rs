//! Moving a train along the track.
//!
//! Only the lead part makes decisions. Every other part sits at a fixed
//! distance behind it on the [`Trail`], so following the leader, keeping
//! couplings closed and passing through tunnels all fall out of the trail.

use super::choose::choose_train_track;
use super::consist::{Consist, Placement};
use super::trail::{step_len, TrailStep};
use super::{depot, reverse, train_follower};
use crate::config::AccelerationModel;
use crate::follow_track::FollowResult;
use crate::map::{CompanyId, RailType, StationId, TileIndex};
use crate::news::NewsEvent;
use crate::order::{Order, StopLocation};
use crate::pathpos::PathPos;
use crate::pbs::{force_reserve_rail_track, unreserve_rail_track};
use crate::signal::{
    has_oneway_signal_blocking_trackdir, set_signal_state, signals_on, segment_state,
    SigSegState, SignalState, SignalUpdateBatch, TrackSignals,
};
use crate::state::WorldState;
use crate::station::{platform_length, platform_tiles_ahead};
use crate::track::{DirDiff, Direction, Trackdir, TILE_UNITS};
use crate::vehicle::{chain, part, PartTrack, Vehicle, VehicleId};

/// Speed units that make one movement unit per tick.
const SPEED_PER_UNIT_SHIFT: u32 = 7;

/// Speed lost per turn of the lead part and per part climbing, in 1/256.
const SMALL_TURN_SLOWDOWN: u32 = 256 / 4;
const LARGE_TURN_SLOWDOWN: u32 = 256 / 2;
const Z_UP_SLOWDOWN: u32 = 256 / 4;
/// Speed gained per part going downhill.
const Z_DOWN_SPEEDUP: u16 = 2;

/// Outcome of looking past the end of the lead part's current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    Enter(PathPos),
    Wait,
    Reverse,
    EnterDepot(TileIndex),
}

/// One tick of movement and bookkeeping for a train whose consist has been
/// taken out of the world.
pub(super) fn run(
    state: &mut WorldState,
    batch: &mut SignalUpdateBatch,
    front: VehicleId,
    c: &mut Consist,
    owner: CompanyId,
) {
    if let Placement::InDepot(tile) = c.placement {
        if !c.flags.stopped {
            depot::leave_depot(state, batch, front, c, owner, tile);
        }
        return;
    }
    if c.flags.stopped {
        c.speed = 0;
        c.progress = 0;
        return;
    }
    if c.loading_ticks > 0 {
        c.loading_ticks -= 1;
        if c.loading_ticks == 0 {
            log::debug!("train {front} leaves station {:?}", c.last_station);
            c.orders.advance();
        }
        return;
    }
    if c.flags.reverse_pending && c.speed == 0 {
        reverse::reverse_consist(state, c, front, owner);
        return;
    }
    if c.flags.stuck {
        c.stuck.ticks += 1;
        if c.stuck.ticks >= state.settings.train.stuck_advisory_ticks() && !c.stuck.advised {
            c.stuck.advised = true;
            log::warn!("train {front} has been stuck for {} ticks", c.stuck.ticks);
            state.news.push(NewsEvent::TrainStuck {
                tick: state.tick,
                company: owner,
                train: front,
            });
        }
        if c.stuck.retry_in > 0 {
            c.stuck.retry_in -= 1;
            return;
        }
    }

    update_speed(state, c);
    let total = c.progress as u32 + c.speed as u32;
    c.progress = (total & ((1 << SPEED_PER_UNIT_SHIFT) - 1)) as u8;
    let units = (total >> SPEED_PER_UNIT_SHIFT) as u16;
    advance(state, batch, front, c, owner, units);
    release_behind(state, batch, c);
}

fn update_speed(state: &WorldState, c: &mut Consist) {
    let limit = if c.flags.reverse_pending {
        0
    } else {
        c.max_speed.min(c.curve_limit)
    };
    let mut accel = c.acceleration.max(1);
    if state.settings.train.acceleration_model == AccelerationModel::Realistic {
        let climbing = c.trail().is_some_and(|t| {
            let head = t.head_pos();
            state.map.slope_effect(head.tile, head.td.enterdir()) == Some(true)
        });
        if climbing {
            accel = (accel / 2).max(1);
        }
    }
    if c.speed < limit {
        c.speed = (c.speed + accel).min(limit);
    } else if c.speed > limit {
        c.speed = c.speed.saturating_sub(accel * 2).max(limit);
    }
}

/// Units left until the front reaches its stopping point on the platform
/// of the ordered station, if `pos` is on that platform.
fn stop_remaining(state: &WorldState, c: &Consist, pos: &PathPos, head: u16) -> Option<i32> {
    let Order::GoToStation { station, stop } = c.orders.current() else {
        return None;
    };
    if pos.is_in_wormhole() || !pos.td.is_diagonal() || c.last_station == Some(station) {
        return None;
    }
    let tile = state.map.station(pos.tile)?;
    if tile.station != station || tile.waypoint {
        return None;
    }
    let platform = platform_length(&state.map, pos.tile) as i32 * TILE_UNITS as i32;
    let ahead = platform_tiles_ahead(&state.map, pos.tile, pos.td.exitdir()) as i32;
    let length = c.length as i32;
    let stop_at = match stop {
        _ if length > platform => platform,
        StopLocation::FarEnd => platform,
        StopLocation::NearEnd => length,
        StopLocation::Middle => (platform + length) / 2,
    };
    let travelled = platform - ahead * TILE_UNITS as i32 + head as i32;
    Some(stop_at - travelled)
}

fn arrive_at_station(state: &WorldState, front: VehicleId, c: &mut Consist, station: StationId) {
    log::debug!("train {front} arrived at station {station}");
    c.speed = 0;
    c.progress = 0;
    c.last_station = Some(station);
    c.loading_ticks = state.settings.train.station_dwell_ticks;
    if c.loading_ticks == 0 {
        c.orders.advance();
    }
}

fn advance(
    state: &mut WorldState,
    batch: &mut SignalUpdateBatch,
    front: VehicleId,
    c: &mut Consist,
    owner: CompanyId,
    mut units: u16,
) {
    // A train held at a tile edge looks ahead every tick
    if units == 0 && c.trail().is_some_and(|t| t.room() == 0) {
        units = 1;
    }
    loop {
        let Some(trail) = c.trail() else {
            return;
        };
        let (head_pos, head, room) = (trail.head_pos(), trail.head(), trail.room());
        let remaining = stop_remaining(state, c, &head_pos, head);
        if remaining == Some(0) {
            if let Some(st) = c.orders.current().station() {
                arrive_at_station(state, front, c, st);
            }
            return;
        }
        if units == 0 {
            return;
        }

        if room > 0 {
            let mut step = units.min(room);
            if let Some(rem) = remaining.filter(|&r| r > 0) {
                step = step.min(rem as u16);
            }
            if let Some(trail) = c.trail_mut() {
                units -= trail.advance(step);
            }
            continue;
        }

        match next_step(state, front, c, owner, head_pos) {
            NextStep::Enter(pos) => {
                let len = step_len(&state.map, &pos, c.length);
                let mut n = units;
                if let Some(rem) = stop_remaining(state, c, &pos, 0).filter(|&r| r > 0) {
                    n = n.min(rem as u16);
                }
                if let Some(trail) = c.trail_mut() {
                    let used = trail.push(TrailStep::new(pos, len), n);
                    units = units.saturating_sub(used);
                }
                entered(state, batch, front, c, &pos);
            }
            NextStep::Wait => {
                c.speed = 0;
                c.progress = 0;
                return;
            }
            NextStep::Reverse => {
                c.speed = 0;
                c.progress = 0;
                release_behind(state, batch, c);
                reverse::reverse_consist(state, c, front, owner);
                return;
            }
            NextStep::EnterDepot(tile) => {
                depot::enter_depot(state, batch, front, c, owner, tile);
                return;
            }
        }
    }
}

/// Side effects of the front moving onto `pos`.
fn entered(
    state: &mut WorldState,
    batch: &mut SignalUpdateBatch,
    front: VehicleId,
    c: &mut Consist,
    pos: &PathPos,
) {
    if !pos.is_in_wormhole() {
        force_reserve_rail_track(&mut state.map, pos.tile, pos.td.track());
        if signals_on(&state.map, pos.tile, pos.td.track()).is_some_and(|s| s.is_pbs() && s.has_on(pos.td)) {
            set_signal_state(&mut state.map, pos.tile, pos.td, SignalState::Red);
        }
    }
    batch.add_pos(pos);

    match state.map.station(pos.tile) {
        Some(st) => {
            if st.waypoint && c.orders.current() == (Order::GoToWaypoint { station: st.station }) {
                log::debug!("train {front} passed waypoint {}", st.station);
                c.orders.advance();
            }
        }
        None => c.last_station = None,
    }
}

/// Release the track behind the rear of the train.
pub(super) fn release_behind(state: &mut WorldState, batch: &mut SignalUpdateBatch, c: &mut Consist) {
    let length = c.length;
    let Some(trail) = c.trail_mut() else {
        return;
    };
    let released = trail.trim(length);
    if released.is_empty() {
        return;
    }
    let still_covered: Vec<PathPos> = trail.steps().map(|s| s.pos).collect();
    for step in released {
        let pos = step.pos;
        batch.add_pos(&pos);
        if pos.is_in_wormhole() {
            continue;
        }
        let track = pos.td.track();
        if still_covered.iter().any(|p| p.tile == pos.tile && p.td.track() == track) {
            continue;
        }
        unreserve_rail_track(&mut state.map, pos.tile, track);
    }
}

fn mark_stuck(state: &WorldState, front: VehicleId, c: &mut Consist) {
    if !c.flags.stuck {
        log::debug!("train {front} is stuck");
        c.flags.stuck = true;
        c.stuck = Default::default();
    }
    c.stuck.back_off(state.settings.train.stuck_retry_max_interval);
}

fn clear_stuck(c: &mut Consist) {
    c.flags.stuck = false;
    c.stuck = Default::default();
}

/// Decide what the front does at the end of its current step.
fn next_step(
    state: &mut WorldState,
    front: VehicleId,
    c: &mut Consist,
    owner: CompanyId,
    head: PathPos,
) -> NextStep {
    if head.enters_wormhole(&state.map) {
        if let Some(w) = state.map.wormhole(head.tile) {
            return NextStep::Enter(PathPos::in_wormhole(head.tile, head.td, w.other_end));
        }
    }
    let follower = train_follower(state, c, owner);
    let ft = match follower.follow_pos(&state.map, &head) {
        Ok(ft) => ft,
        Err(e) => {
            log::trace!("train {front} reached the end of the line at {head}: {e}");
            return NextStep::Reverse;
        }
    };
    if ft.reversed_in_depot {
        return NextStep::EnterDepot(head.tile);
    }
    if head.is_in_wormhole() {
        return match ft.single() {
            Some(td) => NextStep::Enter(PathPos::new(ft.new_tile, td)),
            None => NextStep::Wait,
        };
    }

    let path_signal_ahead = ft.new_td_bits.iter().any(|td| {
        signals_on(&state.map, ft.new_tile, td.track()).is_some_and(|s| s.is_pbs() && s.has_on(td))
    });
    let reserved_ahead =
        ft.new_td_bits & state.map.reserved_track_bits(ft.new_tile).to_trackdir_bits();
    if c.flags.path_reserved && reserved_ahead.single().is_none() {
        // Reached the end of our reservation
        c.flags.path_reserved = false;
    }
    let reserve = path_signal_ahead || c.flags.path_reserved;
    let chosen = if reserve || ft.new_td_bits.count() > 1 {
        choose_train_track(state, c, front, owner, &ft, reserve)
    } else {
        ft.single()
    };
    let force = c.flags.force_proceed
        && (c.flags.stuck || c.wait_counter >= state.settings.train.force_proceed_min_wait);
    let td = match chosen {
        Some(td) => td,
        None if force => match default_choice(&ft) {
            Some(td) => td,
            None => return NextStep::Wait,
        },
        None => {
            mark_stuck(state, front, c);
            return NextStep::Wait;
        }
    };

    if let Some(sig) = signals_on(&state.map, ft.new_tile, td.track()).copied() {
        if sig.has_on(td) && sig.state(td) == SignalState::Red && !sig.is_pbs() {
            if force {
                log::debug!("train {front} passes red signal at {} by order", ft.new_tile);
            } else {
                return red_signal(state, c, &ft, td, &sig);
            }
        }
    }
    if force {
        c.flags.force_proceed = false;
    }
    c.wait_counter = 0;
    clear_stuck(c);
    NextStep::Enter(PathPos::new(ft.new_tile, td))
}

fn default_choice(ft: &FollowResult) -> Option<Trackdir> {
    let straight = ft.old_td.next();
    if ft.new_td_bits.has(straight) {
        Some(straight)
    } else {
        ft.new_td_bits.first()
    }
}

/// A train waiting at a red block signal: keep waiting, or turn around once
/// the configured wait is over and reversing at signals is enabled. A train
/// facing another one through a two-way signal turns around regardless.
fn red_signal(
    state: &WorldState,
    c: &mut Consist,
    ft: &FollowResult,
    td: Trackdir,
    sig: &TrackSignals,
) -> NextStep {
    if c.flags.stuck {
        return NextStep::Wait;
    }
    let s = &state.settings.train;
    c.wait_counter = c.wait_counter.saturating_add(1);
    if !sig.has_on(td.reverse()) {
        if !s.reverse_at_signals || c.wait_counter < s.oneway_signal_wait_ticks() {
            return NextStep::Wait;
        }
    } else if (!s.reverse_at_signals || c.wait_counter < s.twoway_signal_wait_ticks())
        && !train_waiting_facing(state, ft.new_tile, td)
    {
        return NextStep::Wait;
    }
    // Inside a path signal block a reservation will come; do not turn
    if !s.reverse_at_signals
        && !has_oneway_signal_blocking_trackdir(&state.map, ft.new_tile, td)
        && segment_state(state, ft.old_tile, ft.exitdir) == SigSegState::Pbs
    {
        c.wait_counter = 0;
        return NextStep::Wait;
    }
    c.wait_counter = 0;
    NextStep::Reverse
}

/// Whether a stopped train waits on the far side of the two-way signal at
/// `tile`, facing us.
fn train_waiting_facing(state: &WorldState, tile: TileIndex, td: Trackdir) -> bool {
    let Some(other_side) = state.map.add_diagdir(tile, td.exitdir()) else {
        return false;
    };
    let facing = td.exitdir().reverse();
    state.vehicles.iter().any(|(_, v)| match v {
        Vehicle::Train(p) => {
            p.location.tile == other_side
                && matches!(p.location.track, PartTrack::Track(t) if t.exitdir() == facing)
                && p.consist.as_ref().is_some_and(|c| c.speed == 0)
        }
        Vehicle::Ship(_) => false,
    })
}

/// Height and heading of every part, front first.
pub(super) fn motion_snapshot(state: &WorldState, front: VehicleId) -> Vec<(i32, Direction)> {
    chain(&state.vehicles, front)
        .into_iter()
        .filter_map(|id| part(&state.vehicles, id))
        .map(|p| (p.location.z, p.location.direction))
        .collect()
}

/// Speed effects of the move just made: turning and climbing slow the
/// train down, descending speeds it up; the curve limit follows the parts'
/// headings.
pub(super) fn apply_motion_effects(state: &mut WorldState, front: VehicleId, before: &[(i32, Direction)]) {
    let after = motion_snapshot(state, front);
    let original = state.settings.train.acceleration_model == AccelerationModel::Original;
    let rail_type = state
        .consist(front)
        .and_then(|c| c.trail())
        .and_then(|t| state.map.rail_type(t.head_pos().tile))
        .unwrap_or(RailType::Rail);
    let turned = before.len() != after.len()
        || before.iter().zip(&after).any(|(b, a)| b.1 != a.1);
    let Some(c) = state.consist_mut(front) else {
        return;
    };

    if original {
        if let (Some(b), Some(a)) = (before.first(), after.first()) {
            let slowdown = match b.1.difference(a.1) {
                DirDiff::Same => 0,
                DirDiff::Left45 | DirDiff::Right45 => SMALL_TURN_SLOWDOWN,
                _ => LARGE_TURN_SLOWDOWN,
            };
            c.speed -= ((c.speed as u32 * slowdown) >> 8) as u16;
        }
        for (b, a) in before.iter().zip(&after) {
            if a.0 > b.0 {
                c.speed -= ((c.speed as u32 * Z_UP_SLOWDOWN) >> 8) as u16;
            } else if a.0 < b.0 {
                let faster = c.speed + Z_DOWN_SPEEDUP;
                if faster <= c.max_speed {
                    c.speed = faster;
                }
            }
        }
    }
    if turned {
        let headings: Vec<Direction> = after.iter().map(|a| a.1).collect();
        c.curve_limit = curve_speed_limit(&headings, rail_type);
    }
}

/// Speed limit from the curves under a train whose parts have `headings`.
pub fn curve_speed_limit(headings: &[Direction], rail_type: RailType) -> u16 {
    const UNLIMITED: i32 = u16::MAX as i32;
    let mut limit = UNLIMITED;
    let mut curves = [0u32; 2];
    let mut num_curves = 0;
    let mut sum = 0i32;
    let mut last: Option<i32> = None;

    for (pos, pair) in headings.windows(2).enumerate() {
        let pos = pos as i32;
        let diff = pair[0].difference(pair[1]);
        match diff {
            DirDiff::Same => continue,
            DirDiff::Left45 => curves[0] += 1,
            DirDiff::Right45 => curves[1] += 1,
            _ => {}
        }
        if matches!(diff, DirDiff::Left45 | DirDiff::Right45) {
            if let Some(l) = last {
                num_curves += 1;
                sum += pos - l;
                if pos - l == 1 && limit > 88 {
                    limit = 88;
                }
            }
            last = Some(pos);
        }
        if matches!(diff, DirDiff::Left90 | DirDiff::Right90) {
            limit = 61;
        }
    }
    if num_curves > 0 && limit > 88 {
        if curves == [1, 1] {
            limit = UNLIMITED;
        } else {
            let spread = 13 - (sum / num_curves).clamp(1, 12);
            limit = 232 - spread * spread;
        }
    }
    if limit != UNLIMITED {
        limit += (limit / 2) * rail_type.curve_speed() as i32;
    }
    limit.min(UNLIMITED) as u16
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
