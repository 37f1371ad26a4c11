use super::{
    check_tile_owner, company_of, ensure_depot_empty, ensure_no_ship, ensure_track_free, price,
};
use crate::command::{do_command, Command, CommandCost, CommandError, CommandResult, DoFlags, ExecutionContext};
use crate::company::{Actor, ExpenseType};
use crate::map::{CompanyId, StationId, TileIndex, TileKind, Transport, WaterClass};
use crate::signal::SignalUpdateBatch;
use crate::state::WorldState;
use crate::track::TrackBits;
use crate::vehicle::Vehicle;

fn construction(cost: i64) -> CommandCost {
    CommandCost::with_cost(ExpenseType::Construction, cost)
}

fn make_clear(state: &mut WorldState, tile: TileIndex) {
    let t = state.map.get_mut(tile);
    t.kind = TileKind::Clear;
    t.owner = None;
}

/// Shrink the areas of `id` after one of its tiles went away and delete the
/// station once nothing is left of it.
fn shrink_station(state: &mut WorldState, id: StationId) {
    let size = state.map.size();
    let map = &state.map;
    let Some(station) = state.stations.get_mut(id as usize) else {
        return;
    };
    station
        .train_station
        .shrink_after_removal(size, |t| map.station(t).is_some_and(|st| st.station == id));
    station
        .dock
        .shrink_after_removal(size, |t| map.water_class(t).is_some());
    if !(station.train_station.is_empty() && station.dock.is_empty()) {
        return;
    }
    state.stations.remove(id as usize);
    for (_, v) in state.vehicles.iter_mut() {
        match v {
            Vehicle::Train(p) => {
                if let Some(c) = p.consist.as_mut() {
                    c.orders.remove_station(id);
                }
            }
            Vehicle::Ship(s) => s.orders.remove_station(id),
        }
    }
    log::debug!("station {id} removed");
}

/// Stations whose dock area covers `tile`.
fn docks_at(state: &WorldState, tile: TileIndex) -> Vec<StationId> {
    let size = state.map.size();
    state
        .stations
        .iter()
        .filter(|(_, st)| st.dock.contains(size, tile))
        .map(|(id, _)| id as StationId)
        .collect()
}

/// Demolish whatever stands on `tile`. Plain track is taken up one track at
/// a time through nested removals.
pub(super) fn clear_tile(
    state: &mut WorldState,
    actor: Actor,
    tile: TileIndex,
    flags: DoFlags,
    ctx: ExecutionContext,
) -> CommandResult {
    let kind = state.map.get(tile).kind.clone();
    if kind == TileKind::Clear {
        return Err(CommandError::NothingToClear);
    }
    if kind == TileKind::Water(WaterClass::Sea) {
        return Err(CommandError::ObjectInTheWay);
    }
    check_tile_owner(&state.map, tile, actor)?;

    match kind {
        TileKind::Rail(rail) => {
            let mut cost = construction(0);
            for track in rail.tracks.iter() {
                let remove = Command::RemoveRailroadTrack { tile, track };
                cost.add(do_command(state, actor, &remove, flags, ctx.nested())?);
            }
            Ok(cost)
        }
        TileKind::Depot(depot) => {
            ensure_depot_empty(state, tile)?;
            ensure_track_free(state, tile, TrackBits::ALL)?;
            if flags.exec {
                make_clear(state, tile);
                let mut batch = SignalUpdateBatch::begin(state);
                batch.add_side(tile, depot.exit);
                batch.drain(state);
                log::debug!("removed train depot {tile}");
            }
            Ok(construction(price::CLEAR_DEPOT))
        }
        TileKind::Station(st) => {
            ensure_track_free(state, tile, TrackBits::ALL)?;
            if flags.exec {
                make_clear(state, tile);
                shrink_station(state, st.station);
                let mut batch = SignalUpdateBatch::begin(state);
                batch.add_track(tile, st.axis.track());
                batch.drain(state);
            }
            Ok(construction(price::CLEAR_STATION_TILE))
        }
        TileKind::Wormhole(w) => {
            let far = w.other_end;
            check_tile_owner(&state.map, far, actor)?;
            match w.transport {
                Transport::Rail(_) => {
                    ensure_track_free(state, tile, TrackBits::ALL)?;
                    ensure_track_free(state, far, TrackBits::ALL)?;
                }
                Transport::Water => {
                    ensure_no_ship(state, tile)?;
                    ensure_no_ship(state, far)?;
                }
            }
            let dist = state.map.distance_manhattan(tile, far) as i64;
            if flags.exec {
                make_clear(state, tile);
                make_clear(state, far);
                if let Transport::Rail(_) = w.transport {
                    let mut batch = SignalUpdateBatch::begin(state);
                    batch.add_side(tile, w.dir.reverse());
                    batch.add_side(far, w.dir);
                    batch.drain(state);
                }
                log::debug!("removed {:?} from {tile} to {far}", w.kind);
            }
            Ok(construction(price::CLEAR_WORMHOLE_PER_TILE * (dist + 1)))
        }
        TileKind::Water(_) => {
            ensure_no_ship(state, tile)?;
            if flags.exec {
                make_clear(state, tile);
                for id in docks_at(state, tile) {
                    shrink_station(state, id);
                }
            }
            Ok(construction(price::CLEAR_CANAL))
        }
        TileKind::ShipDepot { .. } => {
            ensure_no_ship(state, tile)?;
            ensure_depot_empty(state, tile)?;
            if flags.exec {
                // The depot was built on water and leaves a canal behind
                state.map.get_mut(tile).kind = TileKind::Water(WaterClass::Canal);
                log::debug!("removed ship depot {tile}");
            }
            Ok(construction(price::CLEAR_DEPOT))
        }
        TileKind::Clear => Err(CommandError::NothingToClear),
    }
}

pub(super) fn pause(state: &mut WorldState, paused: bool, flags: DoFlags) -> CommandResult {
    if flags.exec && state.paused != paused {
        state.paused = paused;
        log::info!("game {}", if paused { "paused" } else { "unpaused" });
    }
    Ok(CommandCost::new(ExpenseType::Other))
}

/// Transfer money to another company. The giver pays through the command
/// cost; the recipient is credited here.
pub(super) fn give_money(
    state: &mut WorldState,
    actor: Actor,
    to: CompanyId,
    amount: i64,
    flags: DoFlags,
) -> CommandResult {
    let from = company_of(actor)?;
    if from == to || amount <= 0 {
        return Err(CommandError::NotPermitted);
    }
    if !state.companies.contains_key(&to) {
        return Err(CommandError::UnknownCompany(to));
    }
    if flags.exec {
        if let Some(c) = state.companies.get_mut(&to) {
            c.money += amount;
        }
        log::debug!("company {from} gave {amount} to company {to}");
    }
    Ok(CommandCost::with_cost(ExpenseType::Other, amount))
}
