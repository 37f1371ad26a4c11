use super::{
    axis_dir, check_tile_owner, ensure_no_train, ensure_track_free, line_between, owner_of, price,
    MAX_PLATFORM_LENGTH,
};
use crate::command::{do_command, Command, CommandCost, CommandError, CommandResult, DoFlags, ExecutionContext};
use crate::company::{Actor, ExpenseType};
use crate::map::{
    DepotTile, RailTile, RailType, StationId, StationTile, TileIndex, TileKind, Transport,
    WormholeKind, WormholeTile,
};
use crate::signal::{SignalUpdateBatch, SignalVariant, TrackSignals};
use crate::state::WorldState;
use crate::station::{Station, STATION_JOIN_RADIUS};
use crate::tilearea::{CircularTileIterator, OrthogonalTileArea};
use crate::track::{Axis, DiagDirection, Track, Trackdir};
use std::collections::BTreeSet;

fn construction(cost: i64) -> CommandCost {
    CommandCost::with_cost(ExpenseType::Construction, cost)
}

pub(super) fn build_track(
    state: &mut WorldState,
    actor: Actor,
    tile: TileIndex,
    track: Track,
    rail_type: RailType,
    flags: DoFlags,
) -> CommandResult {
    let t = state.map.get(tile);
    if let Some(rises) = t.slope {
        // Only straight up or down a slope
        if track != rises.axis().track() {
            return Err(CommandError::SiteUnsuitable);
        }
    }
    match &t.kind {
        TileKind::Clear => {}
        TileKind::Rail(rail) => {
            check_tile_owner(&state.map, tile, actor)?;
            if rail.rail_type != rail_type {
                return Err(CommandError::IncompatibleRailType);
            }
            if rail.tracks.has(track) {
                return Err(CommandError::AlreadyBuilt);
            }
            if rail.has_signals() && (rail.tracks | track.bit()).overlap() {
                return Err(CommandError::MustRemoveSignals);
            }
        }
        _ => return Err(CommandError::SiteUnsuitable),
    }

    if flags.exec {
        match state.map.rail_mut(tile) {
            Some(rail) => rail.tracks |= track.bit(),
            None => {
                let t = state.map.get_mut(tile);
                t.kind = TileKind::Rail(RailTile::new(track.bit(), rail_type));
                t.owner = owner_of(actor);
            }
        }
        let mut batch = SignalUpdateBatch::begin(state);
        batch.add_track(tile, track);
        batch.drain(state);
        log::debug!("built {track:?} track on {tile}");
    }
    Ok(construction(price::BUILD_TRACK))
}

/// Remove one track. Signals on it go first, through a nested command.
pub(super) fn remove_track(
    state: &mut WorldState,
    actor: Actor,
    tile: TileIndex,
    track: Track,
    flags: DoFlags,
    ctx: ExecutionContext,
) -> CommandResult {
    let has_signals = match state.map.rail(tile) {
        Some(rail) if rail.tracks.has(track) => rail.signals_on(track).is_some(),
        _ => return Err(CommandError::NoSuitableTrack),
    };
    check_tile_owner(&state.map, tile, actor)?;
    ensure_track_free(state, tile, track.bit())?;

    let mut cost = construction(price::REMOVE_TRACK);
    if has_signals {
        let remove_signals = Command::RemoveSingleSignal { tile, track };
        cost.add(do_command(state, actor, &remove_signals, flags, ctx.nested())?);
    }

    if flags.exec {
        let mut now_empty = false;
        if let Some(rail) = state.map.rail_mut(tile) {
            rail.tracks = rail.tracks & !track.bit();
            rail.signals[track as usize] = None;
            now_empty = rail.tracks.is_empty();
        }
        if now_empty {
            let t = state.map.get_mut(tile);
            t.kind = TileKind::Clear;
            t.owner = None;
        }
        let mut batch = SignalUpdateBatch::begin(state);
        batch.add_track(tile, track);
        batch.drain(state);
        log::debug!("removed {track:?} track from {tile}");
    }
    Ok(cost)
}

pub(super) fn build_signal(
    state: &mut WorldState,
    actor: Actor,
    tile: TileIndex,
    track: Track,
    variant: SignalVariant,
    facing: Option<Trackdir>,
    flags: DoFlags,
) -> CommandResult {
    let rail = state.map.rail(tile).ok_or(CommandError::NoSuitableTrack)?;
    if !rail.tracks.has(track)
        || rail.tracks.overlap()
        || facing.is_some_and(|td| td.track() != track)
    {
        return Err(CommandError::NoSuitableTrack);
    }
    let signals = match facing {
        Some(td) => TrackSignals::facing(variant, td),
        None => TrackSignals::two_way(variant),
    };
    if let Some(old) = rail.signals_on(track) {
        if old.variant == signals.variant && old.along == signals.along && old.against == signals.against {
            return Err(CommandError::AlreadyBuilt);
        }
    }
    check_tile_owner(&state.map, tile, actor)?;
    ensure_no_train(state, tile, track.bit())?;

    if flags.exec {
        if let Some(rail) = state.map.rail_mut(tile) {
            rail.signals[track as usize] = Some(signals);
        }
        let mut batch = SignalUpdateBatch::begin(state);
        batch.add_track(tile, track);
        batch.drain(state);
        log::debug!("built {variant:?} signals on {tile} {track:?}");
    }
    Ok(construction(price::BUILD_SIGNAL))
}

pub(super) fn remove_signal(
    state: &mut WorldState,
    actor: Actor,
    tile: TileIndex,
    track: Track,
    flags: DoFlags,
) -> CommandResult {
    let has_signal = state
        .map
        .rail(tile)
        .is_some_and(|rail| rail.tracks.has(track) && rail.signals_on(track).is_some());
    if !has_signal {
        return Err(CommandError::NoSignal);
    }
    check_tile_owner(&state.map, tile, actor)?;
    ensure_no_train(state, tile, track.bit())?;

    if flags.exec {
        if let Some(rail) = state.map.rail_mut(tile) {
            rail.signals[track as usize] = None;
        }
        let mut batch = SignalUpdateBatch::begin(state);
        batch.add_track(tile, track);
        batch.drain(state);
    }
    Ok(construction(price::REMOVE_SIGNAL))
}

pub(super) fn build_depot(
    state: &mut WorldState,
    actor: Actor,
    tile: TileIndex,
    exit: DiagDirection,
    rail_type: RailType,
    flags: DoFlags,
) -> CommandResult {
    let t = state.map.get(tile);
    if t.kind != TileKind::Clear || t.slope.is_some() {
        return Err(CommandError::SiteUnsuitable);
    }

    if flags.exec {
        let t = state.map.get_mut(tile);
        t.kind = TileKind::Depot(DepotTile {
            exit,
            rail_type,
            reserved: false,
        });
        t.owner = owner_of(actor);
        let mut batch = SignalUpdateBatch::begin(state);
        batch.add_depot(&state.map, tile);
        batch.drain(state);
        log::debug!("built train depot on {tile} facing {exit:?}");
    }
    Ok(construction(price::BUILD_DEPOT))
}

/// A tile that can take a platform or waypoint: plain straight track along
/// `axis` without signals and without trains.
fn check_plain_track(
    state: &WorldState,
    actor: Actor,
    tile: TileIndex,
    axis: Axis,
) -> Result<RailType, CommandError> {
    let rail = state.map.rail(tile).ok_or(CommandError::SiteUnsuitable)?;
    if rail.tracks != axis.track().bit() || rail.has_signals() {
        return Err(CommandError::SiteUnsuitable);
    }
    check_tile_owner(&state.map, tile, actor)?;
    ensure_track_free(state, tile, rail.tracks)?;
    Ok(rail.rail_type)
}

/// The one station of `actor` next to `area`, if any.
fn adjacent_station(
    state: &WorldState,
    actor: Actor,
    area: OrthogonalTileArea,
) -> Result<Option<StationId>, CommandError> {
    let owner = owner_of(actor);
    let size = state.map.size();
    let found: BTreeSet<StationId> = CircularTileIterator::around_area(size, area, STATION_JOIN_RADIUS)
        .filter(|&t| state.map.get(t).owner == owner)
        .filter_map(|t| state.map.station(t))
        .filter(|st| !st.waypoint)
        .map(|st| st.station)
        .collect();
    if found.len() > 1 {
        return Err(CommandError::AdjoinsMoreThanOneStation);
    }
    Ok(found.into_iter().next())
}

pub(super) fn build_station(
    state: &mut WorldState,
    actor: Actor,
    tile: TileIndex,
    axis: Axis,
    length: u8,
    rail_type: RailType,
    flags: DoFlags,
) -> CommandResult {
    if length == 0 || length > MAX_PLATFORM_LENGTH {
        return Err(CommandError::SiteUnsuitable);
    }
    let mut tiles = vec![tile];
    for _ in 1..length {
        let last = tiles[tiles.len() - 1];
        let next = state
            .map
            .add_diagdir(last, axis_dir(axis))
            .ok_or(CommandError::TileOutOfBounds(last))?;
        tiles.push(next);
    }
    for &t in &tiles {
        let clear = {
            let t = state.map.get(t);
            t.kind == TileKind::Clear && t.slope.is_none()
        };
        if !clear && check_plain_track(state, actor, t, axis)? != rail_type {
            return Err(CommandError::IncompatibleRailType);
        }
    }
    let size = state.map.size();
    let area = OrthogonalTileArea::from_corners(size, tiles[0], tiles[tiles.len() - 1]);
    let join = adjacent_station(state, actor, area)?;

    if flags.exec {
        let owner = owner_of(actor);
        let id = match join {
            Some(id) => id,
            None => state.stations.insert_with(|_| Station::new(owner, tile, false)) as StationId,
        };
        for &t in &tiles {
            let tile = state.map.get_mut(t);
            tile.kind = TileKind::Station(StationTile {
                station: id,
                axis,
                rail_type,
                reserved: false,
                waypoint: false,
            });
            tile.owner = owner;
        }
        if let Some(st) = state.stations.get_mut(id as usize) {
            st.train_station.add_area(size, &area);
        }
        let mut batch = SignalUpdateBatch::begin(state);
        for &t in &tiles {
            batch.add_tile(&state.map, t);
        }
        batch.drain(state);
        log::debug!("built {length} tile platform of station {id} at {tile}");
    }
    Ok(construction(price::BUILD_STATION_TILE * length as i64))
}

pub(super) fn build_waypoint(
    state: &mut WorldState,
    actor: Actor,
    tile: TileIndex,
    axis: Axis,
    flags: DoFlags,
) -> CommandResult {
    let rail_type = check_plain_track(state, actor, tile, axis)?;

    if flags.exec {
        let owner = owner_of(actor);
        let size = state.map.size();
        let id = state.stations.insert_with(|_| Station::new(owner, tile, true)) as StationId;
        if let Some(st) = state.stations.get_mut(id as usize) {
            st.train_station.add_tile(size, tile);
        }
        state.map.get_mut(tile).kind = TileKind::Station(StationTile {
            station: id,
            axis,
            rail_type,
            reserved: false,
            waypoint: true,
        });
        let mut batch = SignalUpdateBatch::begin(state);
        batch.add_tile(&state.map, tile);
        batch.drain(state);
        log::debug!("built waypoint {id} at {tile}");
    }
    Ok(construction(price::BUILD_WAYPOINT))
}

/// Check the two heads of a bridge or tunnel. Returns the direction from
/// `start` to `end` and their distance.
fn check_heads(
    state: &WorldState,
    start: TileIndex,
    end: TileIndex,
) -> Result<(DiagDirection, u32), CommandError> {
    if !state.map.is_valid(end) {
        return Err(CommandError::TileOutOfBounds(end));
    }
    let (dir, dist) = line_between(&state.map, start, end).ok_or(CommandError::EndsNotInLine)?;
    if dist < 2 {
        return Err(CommandError::TooShort);
    }
    for head in [start, end] {
        let t = state.map.get(head);
        if t.kind != TileKind::Clear || t.slope.is_some() {
            return Err(CommandError::SiteUnsuitable);
        }
    }
    Ok((dir, dist))
}

#[allow(clippy::too_many_arguments)]
fn place_heads(
    state: &mut WorldState,
    actor: Actor,
    start: TileIndex,
    end: TileIndex,
    dir: DiagDirection,
    kind: WormholeKind,
    transport: Transport,
) {
    let owner = owner_of(actor);
    for (head, head_dir, other_end) in [(start, dir, end), (end, dir.reverse(), start)] {
        let t = state.map.get_mut(head);
        t.kind = TileKind::Wormhole(WormholeTile {
            kind,
            dir: head_dir,
            other_end,
            transport,
            reserved: false,
        });
        t.owner = owner;
    }
    if let Transport::Rail(_) = transport {
        let mut batch = SignalUpdateBatch::begin(state);
        batch.add_tile(&state.map, start);
        batch.add_tile(&state.map, end);
        batch.drain(state);
    }
}

pub(super) fn build_bridge(
    state: &mut WorldState,
    actor: Actor,
    start: TileIndex,
    end: TileIndex,
    transport: Transport,
    flags: DoFlags,
) -> CommandResult {
    let (dir, dist) = check_heads(state, start, end)?;
    if flags.exec {
        place_heads(state, actor, start, end, dir, WormholeKind::Bridge, transport);
        log::debug!("built bridge from {start} to {end}");
    }
    Ok(construction(
        price::BUILD_BRIDGE + price::BRIDGE_PER_TILE * (dist as i64 - 1),
    ))
}

pub(super) fn build_tunnel(
    state: &mut WorldState,
    actor: Actor,
    start: TileIndex,
    end: TileIndex,
    rail_type: RailType,
    flags: DoFlags,
) -> CommandResult {
    let (dir, dist) = check_heads(state, start, end)?;
    if flags.exec {
        let transport = Transport::Rail(rail_type);
        place_heads(state, actor, start, end, dir, WormholeKind::Tunnel, transport);
        log::debug!("built tunnel from {start} to {end}");
    }
    Ok(construction(price::TUNNEL_PER_TILE * (dist as i64 + 1)))
}
