//! Train composition.
//!
//! Parts are linked through `next`/`prev` indices in the vehicle pool. After
//! every rearrangement [`normalise_dual_heads`] puts the rear head of each
//! dual-headed engine back into its engine's chain and
//! [`check_chain_invariants`] verifies the result.

use super::trail::Trail;
use crate::engine::{engine, EngineClass, EngineId, VehicleType};
use crate::map::{CompanyId, RailTypes, StationId, TileIndex};
use crate::order::OrderList;
use crate::pool::Pool;
use crate::state::WorldState;
use crate::track::Direction;
use crate::vehicle::{chain, part, part_mut, PartFlags, PartLocation, TrainPart, Vehicle, VehicleId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistError {
    #[error("vehicle {0} is not a train part")]
    NotATrain(VehicleId),
    #[error("unknown engine {0}")]
    UnknownEngine(EngineId),
    #[error("train must be stopped inside a depot")]
    NotStoppedInDepot,
    #[error("rear engine follows its front engine")]
    RearHead,
    #[error("vehicles are in different depots")]
    DifferentDepots,
    #[error("incompatible rail types")]
    IncompatibleRailType,
    #[error("wagons of an articulated vehicle cannot be separated")]
    ArticulatedPart,
    #[error("chain link broken at {0}")]
    BrokenLink(VehicleId),
    #[error("dual-headed engine {0} split from its rear head")]
    SplitDualHead(VehicleId),
    #[error("chain {0} has {1} front engines")]
    FrontEngines(VehicleId, usize),
    #[error("cached length of {0} is stale")]
    StaleLength(VehicleId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsistFlags {
    /// Stopped by its owner.
    pub stopped: bool,
    pub crashed: bool,
    /// No path could be reserved; retried with backoff.
    pub stuck: bool,
    /// Turn around at the next opportunity.
    pub reverse_pending: bool,
    /// Pass the next red signal.
    pub force_proceed: bool,
    /// The train holds a path reservation ahead of it.
    pub path_reserved: bool,
    /// The pathfinder found no route to the destination.
    pub lost: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Parked inside a depot; no track is covered.
    InDepot(TileIndex),
    OnTrack(Trail),
}

/// Retry schedule for a train that could not get a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StuckState {
    /// Ticks spent stuck so far.
    pub ticks: u32,
    /// Ticks until the next attempt.
    pub retry_in: u32,
    pub interval: u32,
    /// The owner has been told.
    pub advised: bool,
}

impl StuckState {
    /// Schedule the next attempt, doubling the interval up to `max`.
    pub fn back_off(&mut self, max: u32) {
        self.interval = (self.interval.max(1) * 2).min(max.max(1));
        self.retry_in = self.interval;
    }
}

/// Per-train state, carried by the front part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consist {
    pub flags: ConsistFlags,
    pub placement: Placement,
    /// Sum of part lengths.
    pub length: u16,
    /// Rail types every part can run on.
    pub compatible: RailTypes,
    pub max_speed: u16,
    pub acceleration: u16,
    pub speed: u16,
    pub progress: u8,
    /// Speed cap from the curves under the train.
    pub curve_limit: u16,
    pub orders: OrderList,
    /// Ticks spent waiting at a red signal.
    pub wait_counter: u32,
    pub stuck: StuckState,
    pub crash_anim_pos: u16,
    pub tick_counter: u8,
    /// Ticks left standing at a platform.
    pub loading_ticks: u32,
    pub last_station: Option<StationId>,
}

impl Consist {
    pub fn in_depot(depot: TileIndex) -> Self {
        Self {
            flags: ConsistFlags {
                stopped: true,
                ..Default::default()
            },
            placement: Placement::InDepot(depot),
            length: 0,
            compatible: RailTypes::ALL,
            max_speed: 0,
            acceleration: 0,
            speed: 0,
            progress: 0,
            curve_limit: u16::MAX,
            orders: OrderList::default(),
            wait_counter: 0,
            stuck: StuckState::default(),
            crash_anim_pos: 0,
            tick_counter: 0,
            loading_ticks: 0,
            last_station: None,
        }
    }

    pub fn trail(&self) -> Option<&Trail> {
        match &self.placement {
            Placement::OnTrack(trail) => Some(trail),
            Placement::InDepot(_) => None,
        }
    }

    pub fn trail_mut(&mut self) -> Option<&mut Trail> {
        match &mut self.placement {
            Placement::OnTrack(trail) => Some(trail),
            Placement::InDepot(_) => None,
        }
    }

    pub fn depot(&self) -> Option<TileIndex> {
        match self.placement {
            Placement::InDepot(t) => Some(t),
            Placement::OnTrack(_) => None,
        }
    }

    pub fn is_stopped_in_depot(&self) -> bool {
        self.flags.stopped && self.depot().is_some()
    }
}

fn train_part(vehicles: &Pool<Vehicle>, id: VehicleId) -> Result<&TrainPart, ConsistError> {
    part(vehicles, id).ok_or(ConsistError::NotATrain(id))
}

/// Depot a stationary chain is parked in.
pub fn chain_depot(state: &WorldState, first: VehicleId) -> Option<TileIndex> {
    let p = part(&state.vehicles, first)?;
    match &p.consist {
        Some(c) => c.depot(),
        None if p.location.is_in_depot() => Some(p.location.tile),
        None => None,
    }
}

/// Parts that move as one unit with `id`: the part and its articulated
/// followers.
pub fn vehicle_unit(vehicles: &Pool<Vehicle>, id: VehicleId) -> Vec<VehicleId> {
    let mut out = vec![id];
    let mut cur = part(vehicles, id).and_then(|p| p.next);
    while let Some(n) = cur {
        match part(vehicles, n) {
            Some(p) if p.flags.articulated => {
                out.push(n);
                cur = p.next;
            }
            _ => break,
        }
    }
    out
}

/// Write `order` back as the links of one chain and refresh the cached
/// state of its front.
fn relink(state: &mut WorldState, order: &[VehicleId], depot: TileIndex) {
    let Some(&first) = order.first() else {
        return;
    };
    for (i, &id) in order.iter().enumerate() {
        if let Some(p) = part_mut(&mut state.vehicles, id) {
            p.first = first;
            p.prev = i.checked_sub(1).map(|j| order[j]);
            p.next = order.get(i + 1).copied();
            p.flags.front = i == 0;
            if i != 0 {
                p.consist = None;
            }
        }
    }
    let first_is_engine = part(&state.vehicles, first)
        .is_some_and(|p| p.flags.engine && !p.flags.rear_head);
    if let Some(p) = part_mut(&mut state.vehicles, first) {
        if first_is_engine {
            p.consist.get_or_insert_with(|| Box::new(Consist::in_depot(depot)));
        } else {
            p.consist = None;
        }
    }
    update_cached(state, first);
}

/// Recompute length, speed and rail type caches of the train at `first`.
pub fn update_cached(state: &mut WorldState, first: VehicleId) {
    let parts = chain(&state.vehicles, first);
    let mut length = 0u16;
    let mut compatible = RailTypes::ALL;
    let mut max_speed = u16::MAX;
    let mut acceleration = 0u16;
    for &id in &parts {
        let Some(p) = part(&state.vehicles, id) else {
            continue;
        };
        length += p.length;
        if let Some(info) = engine(p.engine) {
            compatible = compatible.intersect(info.rail_type.compatible());
            if info.is_engine() && !p.flags.rear_head && !p.flags.articulated {
                max_speed = max_speed.min(info.max_speed);
                acceleration = acceleration.max(info.acceleration);
            }
        }
    }
    if let Some(c) = state.consist_mut(first) {
        c.length = length;
        c.compatible = compatible;
        c.max_speed = if max_speed == u16::MAX { 0 } else { max_speed };
        c.acceleration = acceleration;
    }
}

fn new_part(
    engine_id: EngineId,
    owner: CompanyId,
    length: u16,
    depot: TileIndex,
    flags: PartFlags,
) -> impl FnOnce(usize) -> Vehicle {
    move |id| {
        Vehicle::Train(TrainPart {
            engine: engine_id,
            owner,
            length,
            first: id,
            next: None,
            prev: None,
            other_multihead: None,
            flags,
            location: PartLocation::in_depot(depot, Direction::NE),
            consist: None,
        })
    }
}

/// Create the parts of one vehicle of `engine_id` in `depot`. Engines start
/// a new stopped train; wagons join the first free wagon row in the depot or
/// start one. Returns the first new part.
pub fn build_rail_vehicle(
    state: &mut WorldState,
    depot: TileIndex,
    engine_id: EngineId,
    owner: CompanyId,
) -> Result<VehicleId, ConsistError> {
    let info = engine(engine_id).ok_or(ConsistError::UnknownEngine(engine_id))?;
    if info.vehicle_type != VehicleType::Train {
        return Err(ConsistError::UnknownEngine(engine_id));
    }
    let is_engine = info.is_engine();

    let mut unit = Vec::new();
    for (i, &len) in info.parts.iter().enumerate() {
        let flags = PartFlags {
            engine: is_engine && i == 0,
            articulated: i > 0,
            ..Default::default()
        };
        unit.push(
            state
                .vehicles
                .insert_with(new_part(engine_id, owner, len, depot, flags)),
        );
    }
    if info.class == EngineClass::Multihead {
        let flags = PartFlags {
            engine: true,
            rear_head: true,
            ..Default::default()
        };
        let rear = state
            .vehicles
            .insert_with(new_part(engine_id, owner, info.parts[0], depot, flags));
        if let Some(p) = part_mut(&mut state.vehicles, unit[0]) {
            p.other_multihead = Some(rear);
        }
        if let Some(p) = part_mut(&mut state.vehicles, rear) {
            p.other_multihead = Some(unit[0]);
        }
        unit.push(rear);
    }

    if is_engine {
        relink(state, &unit, depot);
    } else {
        let free_row = state.vehicles.iter().find_map(|(id, v)| match v {
            Vehicle::Train(p)
                if p.flags.front
                    && p.consist.is_none()
                    && p.owner == owner
                    && p.location.is_in_depot()
                    && p.location.tile == depot =>
            {
                Some(id)
            }
            _ => None,
        });
        let mut order = free_row.map(|f| chain(&state.vehicles, f)).unwrap_or_default();
        order.extend_from_slice(&unit);
        relink(state, &order, depot);
    }
    log::debug!("built engine {} as {} in depot {}", info.name, unit[0], depot);
    debug_assert_eq!(check_chain_invariants(state, first_of(state, unit[0])), Ok(()));
    Ok(unit[0])
}

fn first_of(state: &WorldState, id: VehicleId) -> VehicleId {
    part(&state.vehicles, id).map_or(id, |p| p.first)
}

/// Check that `src` may be rearranged or sold: stopped inside a depot.
pub fn check_in_depot(state: &WorldState, id: VehicleId) -> Result<TileIndex, ConsistError> {
    let p = train_part(&state.vehicles, id)?;
    let first = p.first;
    let stopped = match state.consist(first) {
        Some(c) => c.flags.stopped,
        None => true,
    };
    match chain_depot(state, first) {
        Some(depot) if stopped => Ok(depot),
        _ => Err(ConsistError::NotStoppedInDepot),
    }
}

/// Chains a validated move leaves behind, each in its final order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    depot: TileIndex,
    chains: Vec<Vec<VehicleId>>,
}

/// Move `src` (its whole vehicle unit, or everything from `src` to the end
/// of its chain when `whole_chain` is set) behind `dest`, or into a chain of
/// its own when `dest` is `None`.
pub fn move_rail_vehicle(
    state: &mut WorldState,
    src: VehicleId,
    dest: Option<VehicleId>,
    whole_chain: bool,
) -> Result<(), ConsistError> {
    let Some(plan) = plan_move_rail_vehicle(state, src, dest, whole_chain)? else {
        return Ok(());
    };
    // A front that lost its place also loses its train state
    for c in &plan.chains {
        for &id in c.iter().skip(1) {
            if let Some(p) = part_mut(&mut state.vehicles, id) {
                p.consist = None;
            }
        }
    }
    for c in &plan.chains {
        relink(state, c, plan.depot);
    }
    for c in &plan.chains {
        if let Some(&first) = c.first() {
            debug_assert_eq!(check_chain_invariants(state, first), Ok(()));
        }
    }
    log::debug!("moved {src} behind {dest:?} (chain: {whole_chain})");
    Ok(())
}

/// Check a move without changing anything. `None` means there is nothing
/// to do.
pub fn plan_move_rail_vehicle(
    state: &WorldState,
    src: VehicleId,
    dest: Option<VehicleId>,
    whole_chain: bool,
) -> Result<Option<MovePlan>, ConsistError> {
    let src_part = train_part(&state.vehicles, src)?;
    if src_part.flags.rear_head {
        return Err(ConsistError::RearHead);
    }
    if src_part.flags.articulated {
        return Err(ConsistError::ArticulatedPart);
    }
    let depot = check_in_depot(state, src)?;
    if let Some(d) = dest {
        if check_in_depot(state, d)? != depot {
            return Err(ConsistError::DifferentDepots);
        }
        if train_part(&state.vehicles, d)?.flags.rear_head
            && whole_chain
            && first_of(state, d) == first_of(state, src)
        {
            return Err(ConsistError::RearHead);
        }
    }
    if dest == Some(src) {
        return Ok(None);
    }

    let src_first = first_of(state, src);
    let mut src_chain = chain(&state.vehicles, src_first);
    let Some(at) = src_chain.iter().position(|&id| id == src) else {
        return Err(ConsistError::BrokenLink(src));
    };
    let moving: Vec<VehicleId> = if whole_chain {
        src_chain.split_off(at)
    } else {
        let unit = vehicle_unit(&state.vehicles, src);
        src_chain.retain(|id| !unit.contains(id));
        unit
    };
    if let Some(d) = dest {
        if moving.contains(&d) {
            return Err(ConsistError::BrokenLink(d));
        }
    }

    // Rear heads travel with their engines and are placed again below
    let rear_heads: Vec<VehicleId> = moving
        .iter()
        .filter_map(|&id| {
            let p = part(&state.vehicles, id)?;
            (!p.flags.rear_head).then_some(p.other_multihead).flatten()
        })
        .collect();

    let mut chains: Vec<Vec<VehicleId>> = Vec::new();
    let mut remaining = src_chain;
    let mut moving = moving;
    match dest {
        Some(d) => {
            let dest_first = first_of(state, d);
            let mut dest_chain = if dest_first == src_first {
                std::mem::take(&mut remaining)
            } else {
                chain(&state.vehicles, dest_first)
            };
            let anchor = vehicle_unit(&state.vehicles, d);
            let pos = dest_chain
                .iter()
                .position(|id| Some(id) == anchor.last())
                .ok_or(ConsistError::BrokenLink(d))?;
            dest_chain.splice(pos + 1..pos + 1, moving.drain(..));
            chains.push(dest_chain);
        }
        None => chains.push(std::mem::take(&mut moving)),
    }
    if !remaining.is_empty() {
        chains.push(remaining);
    }

    for c in &mut chains {
        c.retain(|id| !rear_heads.contains(id));
    }
    for &rear in &rear_heads {
        // Park them at the end of whichever chain holds their engine
        let front = part(&state.vehicles, rear).and_then(|p| p.other_multihead);
        if let Some(c) = chains.iter_mut().find(|c| front.is_some_and(|f| c.contains(&f))) {
            c.push(rear);
        }
    }

    let mut compatible_ok = true;
    for c in &chains {
        let types = c.iter().fold(RailTypes::ALL, |acc, &id| {
            match part(&state.vehicles, id).and_then(|p| engine(p.engine)) {
                Some(info) => acc.intersect(info.rail_type.compatible()),
                None => acc,
            }
        });
        compatible_ok &= types != RailTypes::NONE;
    }
    if !compatible_ok {
        return Err(ConsistError::IncompatibleRailType);
    }

    for c in &mut chains {
        normalise_dual_heads(&state.vehicles, c);
    }
    Ok(Some(MovePlan { depot, chains }))
}

/// Put the rear head of every dual-headed engine in `order` right after the
/// wagons that follow its engine, before the next engine.
pub fn normalise_dual_heads(vehicles: &Pool<Vehicle>, order: &mut Vec<VehicleId>) {
    let mut i = 0;
    while i < order.len() {
        let id = order[i];
        let rear = part(vehicles, id)
            .filter(|p| p.flags.engine && !p.flags.rear_head)
            .and_then(|p| p.other_multihead);
        if let Some(rear) = rear {
            if let Some(at) = order.iter().position(|&x| x == rear) {
                order.remove(at);
                if at < i {
                    i -= 1;
                }
            }
            let mut end = i + 1;
            while end < order.len()
                && part(vehicles, order[end]).is_some_and(|p| !p.flags.engine || p.flags.articulated)
            {
                end += 1;
            }
            order.insert(end, rear);
        }
        i += 1;
    }
}

/// Verify the links and caches of the chain starting at `first`.
pub fn check_chain_invariants(state: &WorldState, first: VehicleId) -> Result<(), ConsistError> {
    let parts = chain(&state.vehicles, first);
    let mut fronts = 0;
    let mut length = 0u16;
    let mut prev = None;
    for &id in &parts {
        let p = train_part(&state.vehicles, id)?;
        if p.first != first || p.prev != prev {
            return Err(ConsistError::BrokenLink(id));
        }
        if p.is_front_engine() {
            fronts += 1;
        }
        if let Some(other) = p.other_multihead {
            let back = part(&state.vehicles, other).and_then(|o| o.other_multihead);
            if back != Some(id) || !parts.contains(&other) {
                return Err(ConsistError::SplitDualHead(id));
            }
        }
        length += p.length;
        prev = Some(id);
    }
    let head = train_part(&state.vehicles, first)?;
    let expected = usize::from(head.flags.engine && !head.flags.rear_head);
    if fronts != expected {
        return Err(ConsistError::FrontEngines(first, fronts));
    }
    if let Some(c) = &head.consist {
        if c.length != length {
            return Err(ConsistError::StaleLength(first));
        }
    }
    Ok(())
}

/// Check that the unit at `id` may be sold. Returns its depot.
pub fn check_sell_rail_vehicle(state: &WorldState, id: VehicleId) -> Result<TileIndex, ConsistError> {
    let p = train_part(&state.vehicles, id)?;
    if p.flags.rear_head {
        return Err(ConsistError::RearHead);
    }
    if p.flags.articulated {
        return Err(ConsistError::ArticulatedPart);
    }
    check_in_depot(state, id)
}

/// Remove the vehicle unit at `id` (and its rear head), or the whole chain
/// when `whole_chain` is set. Returns the removed parts.
pub fn sell_rail_vehicle(
    state: &mut WorldState,
    id: VehicleId,
    whole_chain: bool,
) -> Result<Vec<VehicleId>, ConsistError> {
    let depot = check_sell_rail_vehicle(state, id)?;
    let p = train_part(&state.vehicles, id)?;
    let first = p.first;
    let mut order = chain(&state.vehicles, first);
    let removed: Vec<VehicleId> = if whole_chain {
        std::mem::take(&mut order)
    } else {
        let mut unit = vehicle_unit(&state.vehicles, id);
        unit.extend(p.other_multihead);
        order.retain(|x| !unit.contains(x));
        unit
    };
    for &r in &removed {
        state.vehicles.remove(r);
    }
    normalise_dual_heads(&state.vehicles, &mut order);
    relink(state, &order, depot);
    if let Some(&f) = order.first() {
        debug_assert_eq!(check_chain_invariants(state, f), Ok(()));
    }
    Ok(removed)
}

/// Cost of selling the parts of `id` that [`sell_rail_vehicle`] would remove.
pub fn sale_value(state: &WorldState, id: VehicleId, whole_chain: bool) -> i64 {
    let Some(p) = part(&state.vehicles, id) else {
        return 0;
    };
    let ids = if whole_chain {
        chain(&state.vehicles, p.first)
    } else {
        vec![id]
    };
    ids.iter()
        .filter_map(|&v| part(&state.vehicles, v))
        .filter(|v| !v.flags.articulated && !v.flags.rear_head)
        .filter_map(|v| engine(v.engine))
        .map(|info| info.cost / 2)
        .sum()
}

/// Recompute every part's location from the train's placement.
pub fn update_part_positions(state: &mut WorldState, front: VehicleId) {
    let parts = chain(&state.vehicles, front);
    let Some(consist) = state.consist(front) else {
        return;
    };
    let placement = consist.placement.clone();
    let mut dist = 0u16;
    for id in parts {
        let Some(len) = part(&state.vehicles, id).map(|p| p.length) else {
            continue;
        };
        let location = match &placement {
            Placement::InDepot(tile) => Some(PartLocation::in_depot(*tile, Direction::NE)),
            Placement::OnTrack(trail) => trail.location(&state.map, dist + len / 2),
        };
        if let (Some(p), Some(loc)) = (part_mut(&mut state.vehicles, id), location) {
            p.flags.hidden = loc.is_in_depot();
            p.location = loc;
        }
        dist += len;
    }
}
