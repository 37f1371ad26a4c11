use super::{check_tile_owner, check_vehicle_owner, company_of, owner_of};
use crate::command::{do_command, Command, CommandCost, CommandError, CommandResult, DoFlags, ExecutionContext};
use crate::company::{Actor, ExpenseType};
use crate::engine::{engine, EngineId, VehicleType};
use crate::map::{TileIndex, TileKind};
use crate::order::{Order, OrderList};
use crate::pathfinder::yapf_rail::{yapf_train_find_nearest_depot, RailRequest};
use crate::pathfinder::Destination;
use crate::ship::{build_ship, sell_ship, ShipError};
use crate::state::WorldState;
use crate::train::consist::{
    build_rail_vehicle, check_sell_rail_vehicle, move_rail_vehicle, plan_move_rail_vehicle,
    sale_value, sell_rail_vehicle, Consist, ConsistError,
};
use crate::train::reverse::reverse_train;
use crate::train::train_follower;
use crate::vehicle::{ship, ship_mut, Vehicle, VehicleId};

pub(super) fn build_vehicle(
    state: &mut WorldState,
    actor: Actor,
    depot: TileIndex,
    engine_id: EngineId,
    flags: DoFlags,
) -> CommandResult {
    let owner = company_of(actor)?;
    let info = engine(engine_id).ok_or(ConsistError::UnknownEngine(engine_id))?;
    check_tile_owner(&state.map, depot, actor)?;
    match info.vehicle_type {
        VehicleType::Train => {
            let d = state.map.depot(depot).ok_or(CommandError::SiteUnsuitable)?;
            if !info.rail_type.compatible().has(d.rail_type) {
                return Err(CommandError::IncompatibleRailType);
            }
            if flags.exec {
                build_rail_vehicle(state, depot, engine_id, owner)?;
            }
        }
        VehicleType::Ship => {
            if !matches!(state.map.get(depot).kind, TileKind::ShipDepot { .. }) {
                return Err(ShipError::NotShipDepot.into());
            }
            if flags.exec {
                build_ship(state, depot, engine_id, owner)?;
            }
        }
    }
    Ok(CommandCost::with_cost(ExpenseType::NewVehicles, info.cost))
}

pub(super) fn sell_vehicle(
    state: &mut WorldState,
    actor: Actor,
    vehicle: VehicleId,
    whole_chain: bool,
    flags: DoFlags,
) -> CommandResult {
    check_vehicle_owner(state, vehicle, actor)?;
    let value = match state.vehicles.get(vehicle) {
        Some(Vehicle::Train(_)) => {
            check_sell_rail_vehicle(state, vehicle)?;
            let value = sale_value(state, vehicle, whole_chain);
            if flags.exec {
                sell_rail_vehicle(state, vehicle, whole_chain)?;
            }
            value
        }
        Some(Vehicle::Ship(s)) => {
            if !(s.flags.stopped && s.flags.in_depot) {
                return Err(ShipError::NotStoppedInDepot.into());
            }
            let value = engine(s.engine).map_or(0, |info| info.cost / 2);
            if flags.exec {
                sell_ship(state, vehicle)?;
            }
            value
        }
        None => return Err(CommandError::UnknownVehicle(vehicle)),
    };
    if flags.exec {
        log::debug!("sold vehicle {vehicle} for {value}");
    }
    Ok(CommandCost::with_cost(ExpenseType::NewVehicles, -value))
}

pub(super) fn move_vehicle(
    state: &mut WorldState,
    actor: Actor,
    src: VehicleId,
    dest: Option<VehicleId>,
    whole_chain: bool,
    flags: DoFlags,
) -> CommandResult {
    check_vehicle_owner(state, src, actor)?;
    if let Some(d) = dest {
        check_vehicle_owner(state, d, actor)?;
    }
    plan_move_rail_vehicle(state, src, dest, whole_chain)?;
    if flags.exec {
        move_rail_vehicle(state, src, dest, whole_chain)?;
    }
    Ok(CommandCost::new(ExpenseType::NewVehicles))
}

/// Train state of the train led by `front`, which must not be wrecked.
fn live_consist(state: &WorldState, front: VehicleId) -> Result<&Consist, CommandError> {
    let c = state
        .consist(front)
        .ok_or(ConsistError::NotATrain(front))?;
    if c.flags.crashed {
        return Err(CommandError::VehicleCrashed);
    }
    Ok(c)
}

pub(super) fn start_stop(
    state: &mut WorldState,
    actor: Actor,
    vehicle: VehicleId,
    flags: DoFlags,
) -> CommandResult {
    check_vehicle_owner(state, vehicle, actor)?;
    match state.vehicles.get(vehicle) {
        Some(Vehicle::Train(_)) => {
            live_consist(state, vehicle)?;
            if flags.exec {
                if let Some(c) = state.consist_mut(vehicle) {
                    c.flags.stopped = !c.flags.stopped;
                    log::debug!("train {vehicle} stopped: {}", c.flags.stopped);
                }
            }
        }
        Some(Vehicle::Ship(_)) => {
            if flags.exec {
                if let Some(s) = ship_mut(&mut state.vehicles, vehicle) {
                    s.flags.stopped = !s.flags.stopped;
                    log::debug!("ship {vehicle} stopped: {}", s.flags.stopped);
                }
            }
        }
        None => return Err(CommandError::UnknownVehicle(vehicle)),
    }
    Ok(CommandCost::new(ExpenseType::Other))
}

pub(super) fn reverse(
    state: &mut WorldState,
    actor: Actor,
    train: VehicleId,
    flags: DoFlags,
) -> CommandResult {
    check_vehicle_owner(state, train, actor)?;
    live_consist(state, train)?;
    if flags.exec {
        reverse_train(state, train);
    }
    Ok(CommandCost::new(ExpenseType::TrainRun))
}

pub(super) fn force_proceed(
    state: &mut WorldState,
    actor: Actor,
    train: VehicleId,
    flags: DoFlags,
) -> CommandResult {
    check_vehicle_owner(state, train, actor)?;
    live_consist(state, train)?;
    if flags.exec {
        if let Some(c) = state.consist_mut(train) {
            c.flags.force_proceed = !c.flags.force_proceed;
        }
    }
    Ok(CommandCost::new(ExpenseType::TrainRun))
}

fn orders(state: &WorldState, id: VehicleId) -> Option<&OrderList> {
    match state.vehicles.get(id)? {
        Vehicle::Train(_) => state.consist(id).map(|c| &c.orders),
        Vehicle::Ship(s) => Some(&s.orders),
    }
}

fn orders_mut(state: &mut WorldState, id: VehicleId) -> Option<&mut OrderList> {
    match state.vehicles.get(id)? {
        Vehicle::Train(_) => state.consist_mut(id).map(|c| &mut c.orders),
        Vehicle::Ship(_) => ship_mut(&mut state.vehicles, id).map(|s| &mut s.orders),
    }
}

/// Send a vehicle to its nearest depot to stop there. Sending it again
/// cancels the trip.
pub(super) fn send_to_depot(
    state: &mut WorldState,
    actor: Actor,
    vehicle: VehicleId,
    flags: DoFlags,
    ctx: ExecutionContext,
) -> CommandResult {
    check_vehicle_owner(state, vehicle, actor)?;
    let mut cost = CommandCost::new(ExpenseType::Other);
    let heading_for_depot = orders(state, vehicle)
        .and_then(|o| o.interrupt)
        .is_some_and(|o| o.is_depot());

    let (is_ship, owner, in_depot) = match state.vehicles.get(vehicle) {
        Some(Vehicle::Train(p)) => (false, p.owner, false),
        Some(Vehicle::Ship(s)) => (true, s.owner, s.flags.in_depot),
        None => return Err(CommandError::UnknownVehicle(vehicle)),
    };

    // Some(depot) to go, None to cancel
    let target = if heading_for_depot {
        if !is_ship {
            live_consist(state, vehicle)?;
        }
        None
    } else if is_ship {
        if in_depot {
            return Err(CommandError::NoDepotFound);
        }
        Some(None)
    } else {
        let c = live_consist(state, vehicle)?;
        let trail = c.trail().ok_or(CommandError::NoDepotFound)?;
        let req = RailRequest {
            follower: train_follower(state, c, owner),
            destination: Destination::AnyDepot,
            length: c.length,
        };
        let front = trail.head_pos();
        let rear_reversed = trail.steps().last().map_or(front, |s| s.pos.reverse());
        let found = yapf_train_find_nearest_depot(
            &state.map,
            &state.stations,
            &state.settings.pathfinder,
            &req,
            front,
            rear_reversed,
            0,
        );
        let depot = found.tile.ok_or(CommandError::NoDepotFound)?;
        if found.reverse {
            let turn = Command::ReverseTrainDirection { train: vehicle };
            cost.add(do_command(state, actor, &turn, flags, ctx.nested())?);
        }
        Some(Some(depot))
    };

    if flags.exec {
        if let Some(list) = orders_mut(state, vehicle) {
            list.interrupt = target.map(|depot| Order::GoToDepot { depot, halt: true });
        }
        match target {
            Some(depot) => log::debug!("vehicle {vehicle} heading for depot {depot:?}"),
            None => log::debug!("vehicle {vehicle} no longer heading for a depot"),
        }
    }
    Ok(cost)
}

pub(super) fn set_order(
    state: &mut WorldState,
    actor: Actor,
    vehicle: VehicleId,
    index: usize,
    order: Order,
    replace: bool,
    flags: DoFlags,
) -> CommandResult {
    check_vehicle_owner(state, vehicle, actor)?;
    let is_ship = ship(&state.vehicles, vehicle).is_some();
    let len = orders(state, vehicle)
        .ok_or(ConsistError::NotATrain(vehicle))?
        .orders
        .len();

    match order {
        Order::None => {}
        Order::GoToStation { station, .. } | Order::GoToWaypoint { station } => {
            let st = state
                .station(station)
                .ok_or(CommandError::UnknownStation(station))?;
            if actor != Actor::Deity && st.owner.is_some() && st.owner != owner_of(actor) {
                return Err(CommandError::OwnedByOther);
            }
            let wants_waypoint = matches!(order, Order::GoToWaypoint { .. });
            let area = if is_ship { &st.dock } else { &st.train_station };
            if st.waypoint != wants_waypoint || area.is_empty() || (is_ship && wants_waypoint) {
                return Err(CommandError::UnknownStation(station));
            }
        }
        Order::GoToDepot { depot: Some(t), .. } => {
            if !state.map.is_valid(t) {
                return Err(CommandError::TileOutOfBounds(t));
            }
            let fits = match state.map.get(t).kind {
                TileKind::Depot(_) => !is_ship,
                TileKind::ShipDepot { .. } => is_ship,
                _ => false,
            };
            if !fits {
                return Err(CommandError::NoDepotFound);
            }
            check_tile_owner(&state.map, t, actor)?;
        }
        Order::GoToDepot { depot: None, .. } => {}
    }

    let in_range = if replace { index < len } else { index <= len };
    if !in_range {
        return Err(CommandError::InvalidOrderIndex(index));
    }

    if flags.exec {
        if let Some(list) = orders_mut(state, vehicle) {
            list.set(index, order, replace);
        }
        log::debug!("vehicle {vehicle} order {index} set to {order:?}");
    }
    Ok(CommandCost::new(ExpenseType::Other))
}
