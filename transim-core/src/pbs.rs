//! Path reservations.
//!
//! A tile's reserved tracks always stay a subset of its tracks, and on a
//! junction the reserved tracks form at most one path through the tile. All
//! reservation changes go through [`try_reserve_rail_track`] and
//! [`unreserve_rail_track`].

use crate::follow_track::{FollowError, FollowResult, TrackFollower};
use crate::map::{Map, TileIndex, TileKind};
use crate::pathpos::PathPos;
use crate::signal::{
    has_oneway_signal_blocking_trackdir, has_pbs_signal_on_trackdir, set_signal_state,
    signal_state, signals_on, SignalState, SignalVariant,
};
use crate::track::{Track, TrackBits};

/// End of a reservation, and whether a train may stop there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PbsTileInfo {
    pub pos: PathPos,
    pub okay: bool,
}

impl PbsTileInfo {
    pub fn new(pos: PathPos, okay: bool) -> Self {
        Self { pos, okay }
    }
}

/// Outcome of [`extend_train_reservation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// Reserved up to a position the train may stop at.
    Safe(PathPos),
    /// Reserved up to `end`; the next tile is a choice or a possible target,
    /// so the pathfinder has to continue from `choice`.
    Unsafe { end: PathPos, choice: FollowResult },
    /// Nothing could be added; everything this call reserved was released.
    Failed,
}

/// Reserve one track, refusing when it is already taken or would make a
/// second path through the tile.
pub fn try_reserve_rail_track(map: &mut Map, tile: TileIndex, track: Track) -> bool {
    debug_assert!(
        map.rail_track_bits(tile).has(track),
        "reserving missing track {track:?} on {tile}"
    );
    match &mut map.get_mut(tile).kind {
        TileKind::Rail(rail) => {
            if !rail.tracks.has(track)
                || rail.reserved.has(track)
                || (rail.reserved | track.bit()).overlap()
            {
                return false;
            }
            rail.reserved |= track.bit();
            true
        }
        TileKind::Depot(d) => !std::mem::replace(&mut d.reserved, true),
        TileKind::Station(st) => !std::mem::replace(&mut st.reserved, true),
        TileKind::Wormhole(w) => !std::mem::replace(&mut w.reserved, true),
        _ => false,
    }
}

pub fn unreserve_rail_track(map: &mut Map, tile: TileIndex, track: Track) {
    match &mut map.get_mut(tile).kind {
        TileKind::Rail(rail) => rail.reserved = rail.reserved & !track.bit(),
        TileKind::Depot(d) => d.reserved = false,
        TileKind::Station(st) => st.reserved = false,
        TileKind::Wormhole(w) => w.reserved = false,
        _ => {}
    }
}

/// Reserve a track no matter what is already reserved. Used for crashed
/// trains, which block their tracks whatever else holds them.
pub fn force_reserve_rail_track(map: &mut Map, tile: TileIndex, track: Track) {
    match &mut map.get_mut(tile).kind {
        TileKind::Rail(rail) if rail.tracks.has(track) => rail.reserved |= track.bit(),
        TileKind::Depot(d) => d.reserved = true,
        TileKind::Station(st) => st.reserved = true,
        TileKind::Wormhole(w) => w.reserved = true,
        _ => {}
    }
}

pub fn has_reserved_tracks(map: &Map, tile: TileIndex, tracks: TrackBits) -> bool {
    map.reserved_track_bits(tile).intersects(tracks)
}

/// Whether `track` is reserved, or could not be reserved next to what is.
pub fn track_overlaps_tracks(tracks: TrackBits, track: Track) -> bool {
    tracks.has(track) || (tracks | track.bit()).overlap()
}

/// Whether a train may end its reservation at `pos`.
pub fn is_safe_waiting_position(
    map: &Map,
    follower: &TrackFollower,
    pos: &PathPos,
    include_line_end: bool,
) -> bool {
    if pos.is_in_wormhole() {
        return false;
    }
    if map.depot(pos.tile).is_some() {
        return true;
    }
    // Conventional signals: stop on the signal tile
    if signals_on(map, pos.tile, pos.td.track())
        .is_some_and(|s| !s.is_pbs() && s.has_on(pos.td))
    {
        return true;
    }

    let Ok(ft) = follower.follow(map, pos.tile, pos.td) else {
        // End of the line, such as the last tile of a terminus
        return include_line_end;
    };
    if ft.reversed_in_depot {
        return include_line_end;
    }
    match ft.single() {
        Some(td) => {
            if has_pbs_signal_on_trackdir(map, ft.new_tile, td) {
                return true;
            }
            if signals_on(map, ft.new_tile, td.track()).is_some_and(|s| {
                s.variant == SignalVariant::PbsOneway && s.has_on(td.reverse()) && !s.has_on(td)
            }) {
                return include_line_end;
            }
            false
        }
        None => false,
    }
}

/// Whether the waiting position at `pos` is not claimed by another
/// reservation, including the track just past a path signal ahead of it.
pub fn is_waiting_position_free(map: &Map, follower: &TrackFollower, pos: &PathPos) -> bool {
    let track = pos.td.track();
    if track_overlaps_tracks(map.reserved_track_bits(pos.tile), track) {
        return false;
    }
    if map.depot(pos.tile).is_some() {
        return true;
    }
    if signals_on(map, pos.tile, track).is_some_and(|s| !s.is_pbs() && s.has_on(pos.td)) {
        return true;
    }
    match follower.follow(map, pos.tile, pos.td) {
        Ok(ft) => !has_reserved_tracks(map, ft.new_tile, ft.new_td_bits.to_track_bits()),
        Err(_) => true,
    }
}

/// Walk the reservation that starts at `start` to its end.
pub fn follow_reservation(
    map: &Map,
    follower: &TrackFollower,
    start: PathPos,
    ignore_oneway: bool,
) -> PathPos {
    let mut pos = start;
    // Two trains on one tile: the reservation ahead is not ours
    if !pos.is_in_wormhole() && !has_reserved_tracks(map, pos.tile, pos.td.track().bit()) {
        return pos;
    }
    let mut first: Option<PathPos> = None;
    while let Ok(ft) = follower.follow_pos(map, &pos) {
        let reserved = ft.new_td_bits & map.reserved_track_bits(ft.new_tile).to_trackdir_bits();
        let Some(td) = reserved.first() else {
            break;
        };
        if !ignore_oneway && has_oneway_signal_blocking_trackdir(map, ft.new_tile, td) {
            break;
        }
        pos = PathPos::new(ft.new_tile, td);
        match first {
            None => first = Some(pos),
            Some(f) if f == pos => break,
            Some(_) => {}
        }
        if map.depot(pos.tile).is_some() {
            break;
        }
        if signals_on(map, pos.tile, td.track()).is_some_and(|s| !s.is_pbs() && s.has_on(td)) {
            break;
        }
    }
    pos
}

/// End of the reservation ahead of a train whose lead part is at `head`.
pub fn follow_train_reservation(
    map: &Map,
    follower: &TrackFollower,
    head: PathPos,
) -> PbsTileInfo {
    if map.depot(head.tile).is_some_and(|d| !d.reserved) {
        return PbsTileInfo::new(head, false);
    }
    let end = follow_reservation(map, follower, head, false);
    PbsTileInfo::new(end, is_safe_waiting_position(map, follower, &end, true))
}

/// Reserve `pos` and turn a path signal facing along it green.
pub fn reserve_pos(map: &mut Map, pos: &PathPos) -> bool {
    if pos.is_in_wormhole() {
        return true;
    }
    if !try_reserve_rail_track(map, pos.tile, pos.td.track()) {
        return false;
    }
    if has_pbs_signal_on_trackdir(map, pos.tile, pos.td) {
        set_signal_state(map, pos.tile, pos.td, SignalState::Green);
    }
    true
}

pub fn unreserve_pos(map: &mut Map, pos: &PathPos) {
    if pos.is_in_wormhole() {
        return;
    }
    unreserve_rail_track(map, pos.tile, pos.td.track());
    if has_pbs_signal_on_trackdir(map, pos.tile, pos.td) {
        set_signal_state(map, pos.tile, pos.td, SignalState::Red);
    }
}

/// Reserve a sequence of positions, all or nothing.
pub fn reserve_path(map: &mut Map, path: &[PathPos]) -> Result<(), TileIndex> {
    for (i, pos) in path.iter().enumerate() {
        if !reserve_pos(map, pos) {
            for done in path[..i].iter().rev() {
                unreserve_pos(map, done);
            }
            return Err(pos.tile);
        }
    }
    Ok(())
}

/// Extend the reservation ending at `origin` greedily, one unambiguous tile
/// at a time.
pub fn extend_train_reservation(
    map: &mut Map,
    follower: &TrackFollower,
    origin: PbsTileInfo,
) -> Extension {
    let mut pos = origin.pos;
    let mut reserved: Vec<PathPos> = Vec::new();

    let err = loop {
        let ft = match follower.follow_pos(map, &pos) {
            Ok(ft) => ft,
            Err(e) => break e,
        };
        if ft.reversed_in_depot {
            break FollowError::NoWay;
        }
        if let Some(td) = ft.single() {
            if has_oneway_signal_blocking_trackdir(map, ft.new_tile, td) {
                break FollowError::Reserved;
            }
        }

        let target_seen = ft.is_station
            || map.depot(ft.new_tile).is_some()
            || map.rail(ft.new_tile).is_some_and(|r| r.has_signals());
        if target_seen || ft.new_td_bits.count() > 1 {
            let reachable = ft.exitdir.reaches_trackdirs().to_track_bits();
            if has_reserved_tracks(map, ft.new_tile, reachable) {
                break FollowError::Reserved;
            }
            return Extension::Unsafe {
                end: pos,
                choice: ft,
            };
        }

        let Some(td) = ft.single() else {
            break FollowError::NoWay;
        };
        let next = PathPos::new(ft.new_tile, td);

        if is_safe_waiting_position(map, follower, &next, true) {
            if is_waiting_position_free(map, follower, &next) && reserve_pos(map, &next) {
                return Extension::Safe(next);
            }
            break FollowError::Reserved;
        }
        if !reserve_pos(map, &next) {
            break FollowError::Reserved;
        }
        reserved.push(next);
        pos = next;
    };

    match err {
        FollowError::NoWay | FollowError::Owner => Extension::Safe(pos),
        _ => {
            for p in reserved.iter().rev() {
                unreserve_pos(map, p);
            }
            log::trace!("reservation from {} rolled back ({err})", origin.pos);
            Extension::Failed
        }
    }
}

/// Release the reservation ahead of `origin`, stopping where it stops
/// being ours. The origin tile itself stays reserved.
pub fn free_reservation_ahead(map: &mut Map, follower: &TrackFollower, origin: PathPos) {
    if map.depot(origin.tile).is_some_and(|d| d.exit != origin.td.exitdir()) {
        return;
    }
    if !origin.is_in_wormhole()
        && (map.reserved_track_bits(origin.tile) | origin.td.track().bit()).overlap()
    {
        return;
    }
    // The far head of a wormhole we are inside of guards the middle section
    let mut keep_next = origin.is_in_wormhole();
    let mut pos = origin;
    let mut seen: Option<PathPos> = None;

    while let Ok(ft) = follower.follow_pos(map, &pos) {
        if ft.reversed_in_depot {
            break;
        }
        let bits = ft.new_td_bits & map.reserved_track_bits(ft.new_tile).to_trackdir_bits();
        let Some(td) = bits.first() else {
            break;
        };
        debug_assert!(bits.single().is_some(), "two reserved trackdirs on {}", ft.new_tile);
        let next = PathPos::new(ft.new_tile, td);
        if seen == Some(next) {
            break;
        }
        seen.get_or_insert(next);

        if let Some(sig) = signals_on(map, next.tile, td.track()) {
            if sig.has_on(td) && !sig.is_pbs() {
                unreserve_rail_track(map, next.tile, td.track());
                break;
            }
            if sig.has_on(td) && sig.is_pbs() {
                if signal_state(map, next.tile, td) == Some(SignalState::Red) {
                    break;
                }
                set_signal_state(map, next.tile, td, SignalState::Red);
            } else if has_oneway_signal_blocking_trackdir(map, next.tile, td) {
                break;
            }
        }

        if !keep_next {
            unreserve_rail_track(map, next.tile, td.track());
        }
        keep_next = false;
        pos = next;
    }
}

#[cfg(test)]
#[path = "pbs_tests.rs"]
mod tests;
