use crate::command::{do_command_p, Command};
use crate::company::Actor;
use crate::network::CommandQueue;
use crate::profiling;
use crate::ship::tick_ship;
use crate::state::WorldState;
use crate::train::tick_train;
use crate::vehicle::Vehicle;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Commands one participant issues for the coming tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInputs {
    pub actor: Actor,
    pub commands: Vec<Command>,
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Tick that was simulated.
    pub tick: u64,
    pub commands_run: usize,
    pub commands_failed: usize,
    /// Set on ticks that are a multiple of the checksum frequency.
    pub checksum: Option<u64>,
}

/// Advance the world by one tick.
///
/// Commands come first: those the server sequenced for this tick, then the
/// local inputs. Vehicles then move in pool order, unless the game is
/// paused.
#[instrument(skip_all, name = "step_world", level = "debug")]
pub fn step_world(
    state: &mut WorldState,
    inputs: &[PlayerInputs],
    net: &mut CommandQueue,
    checksum_frequency: u32,
) -> StepReport {
    let mut report = StepReport {
        tick: state.tick,
        ..Default::default()
    };

    for result in net.replay(state) {
        report.commands_run += 1;
        if result.is_err() {
            report.commands_failed += 1;
        }
    }
    for input in inputs {
        for cmd in &input.commands {
            report.commands_run += 1;
            if let Err(e) = do_command_p(state, net, input.actor, cmd, None) {
                report.commands_failed += 1;
                log::warn!(
                    "{} for {:?} failed: {}",
                    cmd.kind().error_summary(),
                    input.actor,
                    e
                );
            }
        }
    }

    if !state.paused {
        tick_vehicles(state);
    }

    if checksum_frequency != 0 && state.tick % checksum_frequency as u64 == 0 {
        let checksum = state.checksum();
        log::debug!("tick {} checksum {checksum:016x}", state.tick);
        report.checksum = Some(checksum);
    }
    state.tick += 1;
    profiling::end_tick(&report);
    report
}

fn tick_vehicles(state: &mut WorldState) {
    // Vehicles bought or sold during the tick are picked up next tick
    let movers: Vec<(usize, bool)> = state
        .vehicles
        .iter()
        .filter_map(|(id, v)| match v {
            Vehicle::Train(p) if p.is_front_engine() => Some((id, true)),
            Vehicle::Ship(_) => Some((id, false)),
            Vehicle::Train(_) => None,
        })
        .collect();
    for (id, is_train) in movers {
        if !state.vehicles.contains(id) {
            continue;
        }
        if is_train {
            tick_train(state, id);
        } else {
            tick_ship(state, id);
        }
    }
}
