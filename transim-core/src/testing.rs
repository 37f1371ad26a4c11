//! Builders for test worlds.

use crate::company::Company;
use crate::config::SimConfig;
use crate::engine::EngineId;
use crate::map::{
    CompanyId, DepotTile, Map, RailTile, RailType, StationId, StationTile, TileIndex, TileKind,
    Transport, WaterClass, WormholeKind, WormholeTile,
};
use crate::pathpos::PathPos;
use crate::pbs::force_reserve_rail_track;
use crate::signal::{SignalVariant, TrackSignals};
use crate::state::WorldState;
use crate::station::Station;
use crate::track::{Axis, DiagDirection, Track, TrackBits, Trackdir};
use crate::train::consist::{
    build_rail_vehicle, move_rail_vehicle, update_part_positions, Placement,
};
use crate::train::trail::{step_len, Trail, TrailStep};
use crate::vehicle::{chain, part, VehicleId};
use std::collections::BTreeMap;
use std::ops::Range;

/// Lays out a map tile by tile. Everything built belongs to company 0
/// unless [`MapBuilder::owner`] says otherwise; water is never owned.
pub struct MapBuilder {
    map: Map,
    rail_type: RailType,
    owner: Option<CompanyId>,
}

impl MapBuilder {
    pub fn new(size_x: u32, size_y: u32) -> Self {
        Self {
            map: Map::new(size_x, size_y),
            rail_type: RailType::Rail,
            owner: Some(0),
        }
    }

    /// Rail type of everything built from here on.
    pub fn rail_type(mut self, rail_type: RailType) -> Self {
        self.rail_type = rail_type;
        self
    }

    /// Owner of everything built from here on.
    pub fn owner(mut self, owner: Option<CompanyId>) -> Self {
        self.owner = owner;
        self
    }

    fn put(&mut self, x: u32, y: u32, kind: TileKind) {
        let tile = self.map.tile(x, y);
        let t = self.map.get_mut(tile);
        t.kind = kind;
        t.owner = self.owner;
    }

    /// Add `bits` to whatever track the tile already has.
    fn add_tracks(&mut self, x: u32, y: u32, bits: TrackBits) {
        let tile = self.map.tile(x, y);
        match self.map.rail_mut(tile) {
            Some(rail) => rail.tracks = rail.tracks | bits,
            None => self.put(x, y, TileKind::Rail(RailTile::new(bits, self.rail_type))),
        }
    }

    /// Straight X track along row `y`.
    pub fn rail_x(mut self, y: u32, xs: Range<u32>) -> Self {
        for x in xs {
            self.add_tracks(x, y, TrackBits::X);
        }
        self
    }

    /// Straight Y track along column `x`.
    pub fn rail_y(mut self, x: u32, ys: Range<u32>) -> Self {
        for y in ys {
            self.add_tracks(x, y, TrackBits::Y);
        }
        self
    }

    /// Replace the tile with plain track of exactly `bits`.
    pub fn tracks(mut self, x: u32, y: u32, bits: TrackBits) -> Self {
        self.put(x, y, TileKind::Rail(RailTile::new(bits, self.rail_type)));
        self
    }

    pub fn depot(mut self, x: u32, y: u32, exit: DiagDirection) -> Self {
        let rail_type = self.rail_type;
        self.put(
            x,
            y,
            TileKind::Depot(DepotTile {
                exit,
                rail_type,
                reserved: false,
            }),
        );
        self
    }

    fn wormhole_x(mut self, kind: WormholeKind, transport: Transport, y: u32, x0: u32, x1: u32) -> Self {
        let (a, b) = (self.map.tile(x0, y), self.map.tile(x1, y));
        for (x, dir, other_end) in [(x0, DiagDirection::SW, b), (x1, DiagDirection::NE, a)] {
            self.put(
                x,
                y,
                TileKind::Wormhole(WormholeTile {
                    kind,
                    dir,
                    other_end,
                    transport,
                    reserved: false,
                }),
            );
        }
        self
    }

    /// Rail tunnel along row `y` with heads at `x0` and `x1`.
    pub fn tunnel_x(self, y: u32, x0: u32, x1: u32) -> Self {
        let transport = Transport::Rail(self.rail_type);
        self.wormhole_x(WormholeKind::Tunnel, transport, y, x0, x1)
    }

    /// Rail bridge along row `y` with heads at `x0` and `x1`.
    pub fn bridge_x(self, y: u32, x0: u32, x1: u32) -> Self {
        let transport = Transport::Rail(self.rail_type);
        self.wormhole_x(WormholeKind::Bridge, transport, y, x0, x1)
    }

    /// Aqueduct along row `y` with heads at `x0` and `x1`.
    pub fn aqueduct_x(self, y: u32, x0: u32, x1: u32) -> Self {
        self.wormhole_x(WormholeKind::Bridge, Transport::Water, y, x0, x1)
    }

    /// Platform tiles of station `id` along row `y`.
    pub fn station_x(mut self, y: u32, xs: Range<u32>, id: StationId) -> Self {
        let rail_type = self.rail_type;
        for x in xs {
            self.put(
                x,
                y,
                TileKind::Station(StationTile {
                    station: id,
                    axis: Axis::X,
                    rail_type,
                    reserved: false,
                    waypoint: false,
                }),
            );
        }
        self
    }

    pub fn waypoint_x(mut self, x: u32, y: u32, id: StationId) -> Self {
        let rail_type = self.rail_type;
        self.put(
            x,
            y,
            TileKind::Station(StationTile {
                station: id,
                axis: Axis::X,
                rail_type,
                reserved: false,
                waypoint: true,
            }),
        );
        self
    }

    /// Put `signals` on `track` of an existing rail tile.
    pub fn signals(mut self, x: u32, y: u32, track: Track, signals: TrackSignals) -> Self {
        let tile = self.map.tile(x, y);
        if let Some(rail) = self.map.rail_mut(tile) {
            rail.signals[track as usize] = Some(signals);
        }
        self
    }

    /// One signal facing trains on `td`.
    pub fn signal(self, x: u32, y: u32, td: Trackdir, variant: SignalVariant) -> Self {
        self.signals(x, y, td.track(), TrackSignals::facing(variant, td))
    }

    /// Water over the rectangle `xs` by `ys`.
    pub fn water(mut self, xs: Range<u32>, ys: Range<u32>, class: WaterClass) -> Self {
        for y in ys {
            for x in xs.clone() {
                let tile = self.map.tile(x, y);
                let t = self.map.get_mut(tile);
                t.kind = TileKind::Water(class);
                t.owner = None;
            }
        }
        self
    }

    pub fn ship_depot(mut self, x: u32, y: u32, exit: DiagDirection) -> Self {
        self.put(x, y, TileKind::ShipDepot { exit });
        self
    }

    /// Raise the tile towards `rises` on top of `height`.
    pub fn slope(mut self, x: u32, y: u32, rises: DiagDirection, height: u8) -> Self {
        let tile = self.map.tile(x, y);
        let t = self.map.get_mut(tile);
        t.slope = Some(rises);
        t.height = height;
        self
    }

    pub fn build(self) -> Map {
        self.map
    }
}

/// Wraps a built map into a world. Stations are registered from the
/// platform and waypoint tiles found on the map.
pub struct WorldStateBuilder {
    map: Map,
    config: SimConfig,
    companies: Vec<(CompanyId, i64)>,
    docks: Vec<(StationId, TileIndex)>,
}

impl WorldStateBuilder {
    pub fn new(map: Map) -> Self {
        Self {
            map,
            config: SimConfig::default(),
            companies: Vec::new(),
            docks: Vec::new(),
        }
    }

    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    pub fn company(mut self, id: CompanyId, money: i64) -> Self {
        self.companies.push((id, money));
        self
    }

    /// Make `tile` a docking tile of station `id`.
    pub fn dock(mut self, id: StationId, tile: TileIndex) -> Self {
        self.docks.push((id, tile));
        self
    }

    pub fn build(self) -> WorldState {
        let size = self.map.size();
        let mut stations: BTreeMap<StationId, Station> = BTreeMap::new();
        for index in 0..self.map.tile_count() {
            let tile = TileIndex(index);
            let Some(st) = self.map.station(tile) else {
                continue;
            };
            let owner = self.map.get(tile).owner;
            let station = stations
                .entry(st.station)
                .or_insert_with(|| Station::new(owner, tile, st.waypoint));
            station.train_station.add_tile(size, tile);
        }
        for &(id, tile) in &self.docks {
            stations
                .entry(id)
                .or_insert_with(|| Station::new(None, tile, false))
                .dock
                .add_tile(size, tile);
        }

        let mut state = WorldState::new(self.map, &self.config);
        for (id, money) in self.companies {
            state.companies.insert(id, Company::new(money));
        }
        // Pool slots must line up with station ids
        let max = stations.keys().next_back().copied();
        let mut fillers = Vec::new();
        if let Some(max) = max {
            for id in 0..=max {
                match stations.remove(&id) {
                    Some(station) => {
                        state.stations.insert_with(|_| station);
                    }
                    None => fillers.push(state.stations.insert_with(|_| Station::new(None, TileIndex(0), false))),
                }
            }
        }
        for f in fillers {
            state.stations.remove(f);
        }
        state
    }
}

/// Build a train of company 0 from `engines` in `depot`, front first. The
/// train is left stopped inside the depot.
pub fn build_train(state: &mut WorldState, depot: TileIndex, engines: &[EngineId]) -> VehicleId {
    let (&first, rest) = engines.split_first().expect("train needs an engine");
    let front = build_rail_vehicle(state, depot, first, 0).expect("engine builds");
    for &e in rest {
        let id = build_rail_vehicle(state, depot, e, 0).expect("wagon builds");
        let tail = chain(&state.vehicles, front)
            .into_iter()
            .filter(|&v| part(&state.vehicles, v).is_some_and(|p| !p.flags.rear_head))
            .last()
            .expect("front is in its own chain");
        move_rail_vehicle(state, id, Some(tail), false).expect("wagon attaches");
    }
    front
}

/// Put a built train on the track covering `positions` (oldest first), its
/// front `head` units into the last one. The track under it is reserved and
/// the train is started.
pub fn place_train(state: &mut WorldState, front: VehicleId, positions: &[PathPos], head: u16) {
    let length = state.consist(front).expect("train").length;
    let (&last, older) = positions.split_last().expect("at least one position");
    let mut trail: Option<Trail> = None;
    for pos in older {
        let len = step_len(&state.map, pos, length);
        let step = TrailStep::new(*pos, len);
        match trail.as_mut() {
            Some(t) => {
                t.push(step, len);
            }
            None => trail = Some(Trail::new(step, len)),
        }
    }
    let len = step_len(&state.map, &last, length);
    let head = head.clamp(1, len);
    let step = TrailStep::new(last, len);
    let mut trail = match trail {
        Some(mut t) => {
            t.push(step, head);
            t
        }
        None => Trail::new(step, head),
    };
    trail.trim(length);
    for step in trail.steps() {
        if !step.pos.is_in_wormhole() {
            force_reserve_rail_track(&mut state.map, step.pos.tile, step.pos.td.track());
        }
    }

    let c = state.consist_mut(front).expect("train");
    c.placement = Placement::OnTrack(trail);
    c.flags.stopped = false;
    update_part_positions(state, front);
}
