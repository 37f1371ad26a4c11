use crate::company::Company;
use crate::config::{GameSettings, SimConfig};
use crate::map::{CompanyId, Map, StationId};
use crate::news::NewsEvent;
use crate::pool::Pool;
use crate::rng::SimRandom;
use crate::station::Station;
use crate::train::consist::Consist;
use crate::vehicle::{part, part_mut, Vehicle, VehicleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete simulation state. Everything that influences future ticks lives
/// here and is identical on every participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub tick: u64,
    pub map: Map,
    pub vehicles: Pool<Vehicle>,
    pub stations: Pool<Station>,
    pub companies: BTreeMap<CompanyId, Company>,
    pub rng: SimRandom,
    pub settings: GameSettings,
    pub paused: bool,
    /// Advisories raised so far, oldest first.
    pub news: Vec<NewsEvent>,
    /// Set while a [`crate::signal::SignalUpdateBatch`] is outstanding.
    #[serde(skip)]
    pub signal_batch_open: bool,
}

impl WorldState {
    pub fn new(map: Map, config: &SimConfig) -> Self {
        Self {
            tick: 0,
            map,
            vehicles: Pool::new(),
            stations: Pool::new(),
            companies: BTreeMap::new(),
            rng: SimRandom::new(config.seed),
            settings: config.game.clone(),
            paused: false,
            news: Vec::new(),
            signal_batch_open: false,
        }
    }

    pub fn station(&self, id: StationId) -> Option<&Station> {
        self.stations.get(id as usize)
    }

    pub fn consist(&self, front: VehicleId) -> Option<&Consist> {
        part(&self.vehicles, front).and_then(|p| p.consist.as_deref())
    }

    pub fn consist_mut(&mut self, front: VehicleId) -> Option<&mut Consist> {
        part_mut(&mut self.vehicles, front).and_then(|p| p.consist.as_deref_mut())
    }

    /// Detach a train's consist state so the rest of the world can be
    /// borrowed while it is updated. Must be returned with
    /// [`WorldState::put_consist`].
    pub fn take_consist(&mut self, front: VehicleId) -> Option<Box<Consist>> {
        part_mut(&mut self.vehicles, front).and_then(|p| p.consist.take())
    }

    pub fn put_consist(&mut self, front: VehicleId, consist: Box<Consist>) {
        if let Some(p) = part_mut(&mut self.vehicles, front) {
            debug_assert!(p.consist.is_none(), "consist of {front} put back twice");
            p.consist = Some(consist);
        }
    }

    /// Front parts of all trains, in pool order.
    pub fn train_fronts(&self) -> Vec<VehicleId> {
        self.vehicles
            .iter()
            .filter_map(|(id, v)| match v {
                Vehicle::Train(p) if p.is_front_engine() => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Compute a deterministic checksum of the simulation state.
    ///
    /// Identical states produce identical checksums; used for desync
    /// detection between participants.
    pub fn checksum(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.rng.state().hash(&mut hasher);
        self.paused.hash(&mut hasher);

        // Every collection serializes in a fixed order (pools by index,
        // companies by id), so the encoding is stable.
        let encoded = serde_json::to_vec(&(&self.map, &self.vehicles, &self.stations, &self.companies))
            .unwrap_or_default();
        encoded.hash(&mut hasher);
        hasher.finish()
    }
}
