//! Ships: movement on water and the choice of way at every fork.
//!
//! A ship occupies one position at a time. At the edge of each tile it asks
//! the configured ship pathfinder which way to go whenever the water ahead
//! offers more than one trackdir.

use crate::config::ShipPathfinder;
use crate::engine::{engine, EngineId, EngineInfo, VehicleType};
use crate::follow_track::{FollowResult, TrackFollower};
use crate::map::{CompanyId, TileIndex, TileKind, WaterClass};
use crate::news::NewsEvent;
use crate::order::{Order, OrderList};
use crate::pathfinder::opf_ship::opf_ship_choose_track;
use crate::pathfinder::yapf_ship::yapf_ship_choose_track;
use crate::pathfinder::Destination;
use crate::pathpos::PathPos;
use crate::state::WorldState;
use crate::track::{Trackdir, TILE_UNITS};
use crate::vehicle::{ship, ship_mut, Ship, ShipFlags, Vehicle, VehicleId};
use thiserror::Error;
use tracing::instrument;

const SPEED_PER_UNIT_SHIFT: u32 = 7;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipError {
    #[error("engine {0} is not a ship")]
    NotAShip(EngineId),
    #[error("ships can only be built in a ship depot")]
    NotShipDepot,
    #[error("vehicle {0} is not a ship")]
    UnknownShip(VehicleId),
    #[error("ship must be stopped inside a depot")]
    NotStoppedInDepot,
}

/// Build a stopped ship of `engine_id` inside `depot`.
pub fn build_ship(
    state: &mut WorldState,
    depot: TileIndex,
    engine_id: EngineId,
    owner: CompanyId,
) -> Result<VehicleId, ShipError> {
    let info = engine(engine_id).ok_or(ShipError::NotAShip(engine_id))?;
    if info.vehicle_type != VehicleType::Ship {
        return Err(ShipError::NotAShip(engine_id));
    }
    let TileKind::ShipDepot { exit } = state.map.get(depot).kind else {
        return Err(ShipError::NotShipDepot);
    };
    let id = state.vehicles.insert_with(|_| {
        Vehicle::Ship(Ship {
            engine: engine_id,
            owner,
            tile: depot,
            td: exit.diagonal_trackdir(),
            wormhole: None,
            progress: 0,
            speed: 0,
            subspeed: 0,
            orders: OrderList::default(),
            flags: ShipFlags {
                stopped: true,
                lost: false,
                in_depot: true,
            },
        })
    });
    log::debug!("built ship {} as {id} in depot {depot}", info.name);
    Ok(id)
}

/// Remove a ship stopped in its depot.
pub fn sell_ship(state: &mut WorldState, id: VehicleId) -> Result<(), ShipError> {
    let s = ship(&state.vehicles, id).ok_or(ShipError::UnknownShip(id))?;
    if !(s.flags.stopped && s.flags.in_depot) {
        return Err(ShipError::NotStoppedInDepot);
    }
    state.vehicles.remove(id);
    Ok(())
}

/// Units from entering the current position to leaving it.
fn step_length(state: &WorldState, s: &Ship) -> u16 {
    match s.wormhole {
        Some(far) => {
            let skipped = state.map.distance_manhattan(s.tile, far).saturating_sub(1).max(1);
            skipped as u16 * TILE_UNITS
        }
        None => s.td.track().units(),
    }
}

/// Advance one ship by one tick.
#[instrument(skip_all, name = "tick_ship", level = "trace")]
pub fn tick_ship(state: &mut WorldState, id: VehicleId) {
    let Some(mut s) = ship(&state.vehicles, id).cloned() else {
        return;
    };
    let Some(info) = engine(s.engine) else {
        return;
    };
    run(state, id, &mut s, info);
    if let Some(slot) = ship_mut(&mut state.vehicles, id) {
        *slot = s;
    }
}

fn run(state: &mut WorldState, id: VehicleId, s: &mut Ship, info: &EngineInfo) {
    if s.flags.stopped {
        s.speed = 0;
        s.subspeed = 0;
        return;
    }
    if s.flags.in_depot {
        s.flags.in_depot = false;
        s.progress = TILE_UNITS / 2;
        log::debug!("ship {id} leaves depot {}", s.tile);
    }

    let class = state.map.water_class(s.tile).unwrap_or(WaterClass::Canal);
    let limit = info.water_speed_limit(class);
    if s.speed < limit {
        s.speed = (s.speed + info.acceleration.max(1)).min(limit);
    } else {
        s.speed = limit;
    }
    let total = s.subspeed as u32 + s.speed as u32;
    s.subspeed = (total & ((1 << SPEED_PER_UNIT_SHIFT) - 1)) as u8;
    let mut units = (total >> SPEED_PER_UNIT_SHIFT) as u16;

    while units > 0 {
        let room = step_length(state, s).saturating_sub(s.progress);
        if room > 0 {
            let m = units.min(room);
            s.progress += m;
            units -= m;
            continue;
        }
        if !next_position(state, id, s, info) {
            return;
        }
    }
}

/// Move `s` onto the next position. Returns whether it keeps moving this
/// tick.
fn next_position(state: &mut WorldState, id: VehicleId, s: &mut Ship, info: &EngineInfo) -> bool {
    let pos = s.pos();
    if pos.enters_wormhole(&state.map) {
        if let Some(w) = state.map.wormhole(pos.tile) {
            s.wormhole = Some(w.other_end);
            s.progress = 0;
            return true;
        }
    }
    let follower = TrackFollower::water(state.settings.pathfinder.forbid_90_deg);
    let ft = match follower.follow_pos(&state.map, &pos) {
        Ok(ft) => ft,
        Err(e) => {
            log::trace!("ship {id} turns around at {pos}: {e}");
            turn_around(s);
            return false;
        }
    };

    if let TileKind::ShipDepot { .. } = state.map.get(ft.new_tile).kind {
        if wants_depot(s.orders.current(), ft.new_tile) {
            enter_depot(id, s, ft.new_tile);
            return false;
        }
        turn_around(s);
        return false;
    }

    let td = match ft.single() {
        Some(td) => td,
        None => match choose_ship_track(state, id, s, info, &ft) {
            Some(td) => td,
            None => {
                turn_around(s);
                return false;
            }
        },
    };
    s.tile = ft.new_tile;
    s.td = td;
    s.wormhole = None;
    s.progress = 0;
    !check_arrival(state, id, s)
}

fn turn_around(s: &mut Ship) {
    let back = s.pos().reverse();
    s.tile = back.tile;
    s.td = back.td;
    s.wormhole = back.wormhole;
    s.progress = 0;
    s.speed = 0;
    s.subspeed = 0;
}

fn wants_depot(order: Order, depot: TileIndex) -> bool {
    matches!(order, Order::GoToDepot { depot: target, .. } if target.map_or(true, |t| t == depot))
}

fn enter_depot(id: VehicleId, s: &mut Ship, depot: TileIndex) {
    s.tile = depot;
    s.wormhole = None;
    s.progress = 0;
    s.speed = 0;
    s.subspeed = 0;
    s.flags.in_depot = true;
    if let Order::GoToDepot { halt, .. } = s.orders.current() {
        s.flags.stopped = halt;
        s.orders.advance();
    }
    log::debug!("ship {id} entered depot {depot}");
}

/// Whether the ship has reached the dock it is ordered to. Arriving
/// completes the order.
fn check_arrival(state: &WorldState, id: VehicleId, s: &mut Ship) -> bool {
    let Order::GoToStation { station, .. } = s.orders.current() else {
        return false;
    };
    let at_dock = state
        .station(station)
        .is_some_and(|st| st.dock.contains(state.map.size(), s.tile));
    if at_dock {
        log::debug!("ship {id} arrived at dock of station {station}");
        s.speed = 0;
        s.subspeed = 0;
        s.orders.advance();
    }
    at_dock
}

fn default_choice(ft: &FollowResult) -> Option<Trackdir> {
    let straight = ft.old_td.next();
    if ft.new_td_bits.has(straight) {
        Some(straight)
    } else {
        ft.new_td_bits.first()
    }
}

/// Ask the configured pathfinder which way to take at a fork.
fn choose_ship_track(
    state: &mut WorldState,
    id: VehicleId,
    s: &mut Ship,
    info: &EngineInfo,
    ft: &FollowResult,
) -> Option<Trackdir> {
    let Some(dest) = Destination::from_order(s.orders.current()) else {
        return default_choice(ft);
    };
    let settings = &state.settings.pathfinder;
    let res = match settings.ship_pathfinder {
        ShipPathfinder::Yapf => {
            yapf_ship_choose_track(&state.map, &state.stations, settings, info, dest, ft)
        }
        ShipPathfinder::Opf => match dest.target_tile(&state.map, &state.stations, ft.new_tile) {
            Some(target) => opf_ship_choose_track(
                &state.map,
                s.td.direction(),
                target,
                ft,
                settings.forbid_90_deg,
                &mut state.rng,
            ),
            // Without a target tile the flood has nothing to aim at
            None => yapf_ship_choose_track(&state.map, &state.stations, settings, info, dest, ft),
        },
    };
    set_lost(state, id, s, !res.path_found);
    res.td.or_else(|| default_choice(ft))
}

fn set_lost(state: &mut WorldState, id: VehicleId, s: &mut Ship, lost: bool) {
    if lost && !s.flags.lost {
        log::info!("ship {id} is lost");
        state.news.push(NewsEvent::ShipLost {
            tick: state.tick,
            company: s.owner,
            ship: id,
        });
    }
    s.flags.lost = lost;
}

/// Current position of ship `id`, if it is on the water.
pub fn ship_position(state: &WorldState, id: VehicleId) -> Option<PathPos> {
    ship(&state.vehicles, id)
        .filter(|s| !s.flags.in_depot)
        .map(Ship::pos)
}
