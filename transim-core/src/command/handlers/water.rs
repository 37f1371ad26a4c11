use super::{check_tile_owner, ensure_no_ship, owner_of, price};
use crate::command::{CommandCost, CommandError, CommandResult, DoFlags};
use crate::company::{Actor, ExpenseType};
use crate::map::{StationId, TileIndex, TileKind, WaterClass};
use crate::state::WorldState;
use crate::station::Station;
use crate::tilearea::OrthogonalTileArea;
use crate::track::DiagDirection;

fn construction(cost: i64) -> CommandCost {
    CommandCost::with_cost(ExpenseType::Construction, cost)
}

/// Dig canal over the rectangle between `start` and `end`. Tiles already
/// under water are left alone.
pub(super) fn build_canal(
    state: &mut WorldState,
    actor: Actor,
    start: TileIndex,
    end: TileIndex,
    flags: DoFlags,
) -> CommandResult {
    if !state.map.is_valid(end) {
        return Err(CommandError::TileOutOfBounds(end));
    }
    let size = state.map.size();
    let area = OrthogonalTileArea::from_corners(size, start, end);
    let mut dig = Vec::new();
    for tile in area.iter(size) {
        let t = state.map.get(tile);
        match t.kind {
            TileKind::Water(_) => {}
            TileKind::Clear if t.slope.is_none() => dig.push(tile),
            _ => return Err(CommandError::SiteUnsuitable),
        }
    }
    if dig.is_empty() {
        return Err(CommandError::AlreadyBuilt);
    }

    if flags.exec {
        let owner = owner_of(actor);
        for &tile in &dig {
            let t = state.map.get_mut(tile);
            t.kind = TileKind::Water(WaterClass::Canal);
            t.owner = owner;
        }
        log::debug!("dug {} canal tiles from {start} to {end}", dig.len());
    }
    Ok(construction(price::BUILD_CANAL * dig.len() as i64))
}

pub(super) fn build_ship_depot(
    state: &mut WorldState,
    actor: Actor,
    tile: TileIndex,
    exit: DiagDirection,
    flags: DoFlags,
) -> CommandResult {
    if !matches!(state.map.get(tile).kind, TileKind::Water(_)) {
        return Err(CommandError::SiteUnsuitable);
    }
    check_tile_owner(&state.map, tile, actor)?;
    ensure_no_ship(state, tile)?;

    if flags.exec {
        let t = state.map.get_mut(tile);
        t.kind = TileKind::ShipDepot { exit };
        t.owner = owner_of(actor);
        log::debug!("built ship depot on {tile} facing {exit:?}");
    }
    Ok(construction(price::BUILD_SHIP_DEPOT))
}

/// Make a water tile a place where ships load at `station`, or at a new
/// station when none is given.
pub(super) fn build_dock(
    state: &mut WorldState,
    actor: Actor,
    tile: TileIndex,
    station: Option<StationId>,
    flags: DoFlags,
) -> CommandResult {
    if !matches!(state.map.get(tile).kind, TileKind::Water(_)) {
        return Err(CommandError::SiteUnsuitable);
    }
    let size = state.map.size();
    if let Some(id) = station {
        let st = state.station(id).ok_or(CommandError::UnknownStation(id))?;
        if st.waypoint {
            return Err(CommandError::SiteUnsuitable);
        }
        if actor != Actor::Deity && st.owner != owner_of(actor) {
            return Err(CommandError::OwnedByOther);
        }
        if st.dock.contains(size, tile) {
            return Err(CommandError::AlreadyBuilt);
        }
    }

    if flags.exec {
        let id = match station {
            Some(id) => id as usize,
            None => state
                .stations
                .insert_with(|_| Station::new(owner_of(actor), tile, false)),
        };
        if let Some(st) = state.stations.get_mut(id) {
            st.dock.add_tile(size, tile);
        }
        log::debug!("built dock of station {id} on {tile}");
    }
    Ok(construction(price::BUILD_DOCK))
}
