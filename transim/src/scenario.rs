//! Demo world: a rail line between two stations and a canal with two docks,
//! all laid out through ordinary company commands.

use anyhow::{ensure, Context, Result};
use transim_core::map::{RailType, StationId};
use transim_core::order::{Order, StopLocation};
use transim_core::track::{Axis, DiagDirection, Track};
use transim_core::vehicle::VehicleId;
use transim_core::{do_command_p, Actor, Command, CommandQueue, Map, SimConfig, WorldState};

pub const MIN_WIDTH: u32 = 48;
pub const MIN_HEIGHT: u32 = 12;

const COMPANY: Actor = Actor::Company(0);
const START_MONEY: i64 = 2_000_000;

const LOCOMOTIVE: u16 = 0;
const CARRIAGE: u16 = 2;
const BARGE: u16 = 8;

const RAIL_ROW: u32 = 3;
const CANAL_ROW: u32 = 8;
const PLATFORM: u8 = 3;

struct Builder<'a> {
    state: &'a mut WorldState,
    net: CommandQueue,
}

impl Builder<'_> {
    fn run(&mut self, cmd: Command) -> Result<()> {
        let name = cmd.kind().error_summary();
        do_command_p(self.state, &mut self.net, COMPANY, &cmd, None).context(name)?;
        Ok(())
    }

    fn tile(&self, x: u32, y: u32) -> transim_core::TileIndex {
        self.state.map.tile(x, y)
    }

    fn next_vehicle(&self) -> VehicleId {
        self.state.vehicles.next_free()
    }

    fn next_station(&self) -> StationId {
        self.state.stations.next_free() as StationId
    }

    fn shuttle(&mut self, vehicle: VehicleId, stops: [StationId; 2]) -> Result<()> {
        for (index, station) in stops.into_iter().enumerate() {
            self.run(Command::SetVehicleOrder {
                vehicle,
                index,
                order: Order::GoToStation {
                    station,
                    stop: StopLocation::FarEnd,
                },
                replace: false,
            })?;
        }
        self.run(Command::StartStopVehicle { vehicle })
    }
}

/// Create the demo world on a `width` by `height` map.
pub fn build(width: u32, height: u32, config: &SimConfig) -> Result<WorldState> {
    ensure!(
        width >= MIN_WIDTH && height >= MIN_HEIGHT,
        "map must be at least {MIN_WIDTH}x{MIN_HEIGHT}, got {width}x{height}"
    );
    let mut state = WorldState::new(Map::new(width, height), config);
    state
        .companies
        .insert(0, transim_core::Company::new(START_MONEY));

    let mut b = Builder {
        state: &mut state,
        net: CommandQueue::default(),
    };
    rail_line(&mut b, width)?;
    canal(&mut b, width)?;

    let spent = START_MONEY - state.companies.get(&0).map_or(0, |c| c.money);
    log::info!(
        "scenario ready: {} vehicles, {} stations, {spent} spent",
        state.vehicles.len(),
        state.stations.len()
    );
    Ok(state)
}

fn rail_line(b: &mut Builder, width: u32) -> Result<()> {
    let y = RAIL_ROW;
    let west = 4;
    let east = width - 4 - PLATFORM as u32;

    let depot = b.tile(1, y);
    b.run(Command::BuildTrainDepot {
        tile: depot,
        exit: DiagDirection::SW,
        rail_type: RailType::Rail,
    })?;
    for x in 2..width - 2 {
        if (west..west + PLATFORM as u32).contains(&x) || (east..east + PLATFORM as u32).contains(&x) {
            continue;
        }
        b.run(Command::BuildRailroadTrack {
            tile: b.tile(x, y),
            track: Track::X,
            rail_type: RailType::Rail,
        })?;
    }

    let mut stations = [0; 2];
    for (i, x) in [west, east].into_iter().enumerate() {
        stations[i] = b.next_station();
        b.run(Command::BuildRailStation {
            tile: b.tile(x, y),
            axis: Axis::X,
            length: PLATFORM,
            rail_type: RailType::Rail,
        })?;
    }

    let train = b.next_vehicle();
    b.run(Command::BuildVehicle {
        depot,
        engine: LOCOMOTIVE,
    })?;
    let carriage = b.next_vehicle();
    b.run(Command::BuildVehicle {
        depot,
        engine: CARRIAGE,
    })?;
    b.run(Command::MoveRailVehicle {
        src: carriage,
        dest: Some(train),
        whole_chain: false,
    })?;
    b.shuttle(train, stations)
}

fn canal(b: &mut Builder, width: u32) -> Result<()> {
    let y = CANAL_ROW;
    b.run(Command::BuildCanal {
        start: b.tile(2, y - 1),
        end: b.tile(width - 3, y + 1),
    })?;
    let depot = b.tile(3, y);
    b.run(Command::BuildShipDepot {
        tile: depot,
        exit: DiagDirection::SW,
    })?;

    let mut docks = [0; 2];
    for (i, x) in [8, width - 8].into_iter().enumerate() {
        docks[i] = b.next_station();
        b.run(Command::BuildDock {
            tile: b.tile(x, y - 1),
            station: None,
        })?;
    }

    let ship = b.next_vehicle();
    b.run(Command::BuildVehicle {
        depot,
        engine: BARGE,
    })?;
    b.shuttle(ship, docks)
}
