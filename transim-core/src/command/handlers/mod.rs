//! Command handlers.
//!
//! Every handler validates first and returns the same cost in both phases;
//! only with `flags.exec` set does it change the world. Handlers that change
//! track layout recompute the affected signal segments through exactly one
//! [`crate::signal::SignalUpdateBatch`], opened after any nested commands
//! have run.

mod misc;
mod rail;
mod vehicle;
mod water;

use super::{Command, CommandError, CommandResult, DoFlags, ExecutionContext};
use crate::company::Actor;
use crate::map::{CompanyId, Map, TileIndex};
use crate::state::WorldState;
use crate::track::{Axis, DiagDirection, TrackBits};
use crate::vehicle::{rail_occupancy, Vehicle, VehicleId};

/// Prices of construction work.
pub mod price {
    pub const BUILD_TRACK: i64 = 100;
    pub const REMOVE_TRACK: i64 = 30;
    pub const BUILD_SIGNAL: i64 = 40;
    pub const REMOVE_SIGNAL: i64 = 10;
    pub const BUILD_DEPOT: i64 = 300;
    pub const CLEAR_DEPOT: i64 = 100;
    pub const BUILD_STATION_TILE: i64 = 250;
    pub const CLEAR_STATION_TILE: i64 = 80;
    pub const BUILD_WAYPOINT: i64 = 200;
    pub const BUILD_BRIDGE: i64 = 200;
    pub const BRIDGE_PER_TILE: i64 = 150;
    pub const TUNNEL_PER_TILE: i64 = 300;
    pub const CLEAR_WORMHOLE_PER_TILE: i64 = 60;
    pub const BUILD_CANAL: i64 = 200;
    pub const CLEAR_CANAL: i64 = 100;
    pub const BUILD_SHIP_DEPOT: i64 = 400;
    pub const BUILD_DOCK: i64 = 350;
}

/// Longest platform a single command builds.
pub const MAX_PLATFORM_LENGTH: u8 = 16;

pub(super) fn dispatch(
    state: &mut WorldState,
    actor: Actor,
    command: &Command,
    flags: DoFlags,
    ctx: ExecutionContext,
) -> CommandResult {
    match *command {
        Command::BuildRailroadTrack {
            tile,
            track,
            rail_type,
        } => rail::build_track(state, actor, tile, track, rail_type, flags),
        Command::RemoveRailroadTrack { tile, track } => {
            rail::remove_track(state, actor, tile, track, flags, ctx)
        }
        Command::BuildSingleSignal {
            tile,
            track,
            variant,
            facing,
        } => rail::build_signal(state, actor, tile, track, variant, facing, flags),
        Command::RemoveSingleSignal { tile, track } => {
            rail::remove_signal(state, actor, tile, track, flags)
        }
        Command::BuildTrainDepot {
            tile,
            exit,
            rail_type,
        } => rail::build_depot(state, actor, tile, exit, rail_type, flags),
        Command::BuildRailStation {
            tile,
            axis,
            length,
            rail_type,
        } => rail::build_station(state, actor, tile, axis, length, rail_type, flags),
        Command::BuildRailWaypoint { tile, axis } => {
            rail::build_waypoint(state, actor, tile, axis, flags)
        }
        Command::BuildBridge {
            start,
            end,
            transport,
        } => rail::build_bridge(state, actor, start, end, transport, flags),
        Command::BuildTunnel {
            start,
            end,
            rail_type,
        } => rail::build_tunnel(state, actor, start, end, rail_type, flags),
        Command::LandscapeClear { tile } => misc::clear_tile(state, actor, tile, flags, ctx),
        Command::BuildCanal { start, end } => water::build_canal(state, actor, start, end, flags),
        Command::BuildShipDepot { tile, exit } => {
            water::build_ship_depot(state, actor, tile, exit, flags)
        }
        Command::BuildDock { tile, station } => {
            water::build_dock(state, actor, tile, station, flags)
        }
        Command::BuildVehicle { depot, engine } => {
            vehicle::build_vehicle(state, actor, depot, engine, flags)
        }
        Command::SellVehicle {
            vehicle,
            whole_chain,
        } => vehicle::sell_vehicle(state, actor, vehicle, whole_chain, flags),
        Command::MoveRailVehicle {
            src,
            dest,
            whole_chain,
        } => vehicle::move_vehicle(state, actor, src, dest, whole_chain, flags),
        Command::StartStopVehicle { vehicle } => {
            vehicle::start_stop(state, actor, vehicle, flags)
        }
        Command::ReverseTrainDirection { train } => {
            vehicle::reverse(state, actor, train, flags)
        }
        Command::ForceTrainProceed { train } => {
            vehicle::force_proceed(state, actor, train, flags)
        }
        Command::SendVehicleToDepot { vehicle } => {
            vehicle::send_to_depot(state, actor, vehicle, flags, ctx)
        }
        Command::SetVehicleOrder {
            vehicle,
            index,
            order,
            replace,
        } => vehicle::set_order(state, actor, vehicle, index, order, replace, flags),
        Command::Pause { paused } => misc::pause(state, paused, flags),
        Command::GiveMoney { to, amount } => misc::give_money(state, actor, to, amount, flags),
    }
}

/// Owner of what `actor` builds. The deity builds unowned.
fn owner_of(actor: Actor) -> Option<CompanyId> {
    match actor {
        Actor::Company(c) => Some(c),
        Actor::Deity | Actor::Spectator => None,
    }
}

/// The company behind a command that needs one.
fn company_of(actor: Actor) -> Result<CompanyId, CommandError> {
    owner_of(actor).ok_or(CommandError::NotPermitted)
}

/// The deity may touch anything; companies only what is theirs or unowned.
fn check_tile_owner(map: &Map, tile: TileIndex, actor: Actor) -> Result<(), CommandError> {
    let owner = map.get(tile).owner;
    match actor {
        Actor::Deity => Ok(()),
        _ if owner.is_none() || owner == owner_of(actor) => Ok(()),
        _ => Err(CommandError::OwnedByOther),
    }
}

fn check_vehicle_owner(state: &WorldState, id: VehicleId, actor: Actor) -> Result<(), CommandError> {
    let v = state
        .vehicles
        .get(id)
        .ok_or(CommandError::UnknownVehicle(id))?;
    match actor {
        Actor::Deity => Ok(()),
        _ if Some(v.owner()) == owner_of(actor) => Ok(()),
        _ => Err(CommandError::NotVehicleOwner),
    }
}

/// Refuse when a train stands on any of `tracks`.
fn ensure_no_train(state: &WorldState, tile: TileIndex, tracks: TrackBits) -> Result<(), CommandError> {
    let occupied = rail_occupancy(state)
        .get(&tile)
        .copied()
        .unwrap_or(TrackBits::NONE);
    if occupied.intersects(tracks) {
        return Err(CommandError::TrainInTheWay);
    }
    Ok(())
}

/// Refuse when a train stands on or has reserved a path over `tracks`.
fn ensure_track_free(state: &WorldState, tile: TileIndex, tracks: TrackBits) -> Result<(), CommandError> {
    ensure_no_train(state, tile, tracks)?;
    if state.map.reserved_track_bits(tile).intersects(tracks) {
        return Err(CommandError::TrainInTheWay);
    }
    Ok(())
}

/// Refuse when any train part stands inside the depot at `tile`.
fn ensure_depot_empty(state: &WorldState, tile: TileIndex) -> Result<(), CommandError> {
    let inside = state.vehicles.iter().any(|(_, v)| match v {
        Vehicle::Train(p) => p.location.is_in_depot() && p.location.tile == tile,
        Vehicle::Ship(s) => s.flags.in_depot && s.tile == tile,
    });
    if inside {
        return Err(CommandError::TrainInTheWay);
    }
    Ok(())
}

fn ensure_no_ship(state: &WorldState, tile: TileIndex) -> Result<(), CommandError> {
    let present = state.vehicles.iter().any(|(_, v)| match v {
        Vehicle::Ship(s) => s.tile == tile || s.wormhole == Some(tile),
        Vehicle::Train(_) => false,
    });
    if present {
        return Err(CommandError::ShipInTheWay);
    }
    Ok(())
}

/// Direction of travel along `axis` towards growing coordinates.
fn axis_dir(axis: Axis) -> DiagDirection {
    match axis {
        Axis::X => DiagDirection::SW,
        Axis::Y => DiagDirection::SE,
    }
}

/// Direction from `a` to `b` and their distance, when both lie on one row
/// or column.
fn line_between(map: &Map, a: TileIndex, b: TileIndex) -> Option<(DiagDirection, u32)> {
    let (ax, ay, bx, by) = (map.x(a), map.y(a), map.x(b), map.y(b));
    if a == b {
        return None;
    }
    if ay == by {
        let dir = if bx > ax { DiagDirection::SW } else { DiagDirection::NE };
        Some((dir, ax.abs_diff(bx)))
    } else if ax == bx {
        let dir = if by > ay { DiagDirection::SE } else { DiagDirection::NW };
        Some((dir, ay.abs_diff(by)))
    } else {
        None
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
