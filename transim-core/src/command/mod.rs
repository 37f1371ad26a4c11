//! Commands: the only way persistent world state is changed.
//!
//! Every command runs twice. The test phase checks validity and computes
//! the cost without touching the world; the execute phase repeats the same
//! work and applies it. Between the two the issuing company's money is
//! checked. Both phases must agree unless the command's table entry says
//! otherwise, and every participant of a networked game runs the same
//! commands in the same order.
//!
//! Composite commands call other commands through [`do_command`] with a
//! nested [`ExecutionContext`]. Only the outermost call runs a separate test
//! phase; nested calls made while executing apply directly.

pub mod cost;
pub mod handlers;

pub use cost::{CommandCost, CommandError, CommandResult};

use crate::company::{Actor, ExpenseType};
use crate::engine::EngineId;
use crate::map::{CompanyId, RailType, StationId, TileIndex, Transport};
use crate::network::{CommandPacket, CommandQueue, NetworkMode};
use crate::order::Order;
use crate::signal::SignalVariant;
use crate::state::WorldState;
use crate::track::{Axis, DiagDirection, Track, Trackdir};
use crate::vehicle::VehicleId;
use serde::{Deserialize, Serialize};

/// Opcode of a command.
///
/// The numbers are part of the network protocol: peers exchange them, so an
/// existing kind must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandKind {
    BuildRailroadTrack = 0,
    RemoveRailroadTrack = 1,
    BuildSingleSignal = 2,
    RemoveSingleSignal = 3,
    BuildTrainDepot = 4,
    BuildRailStation = 5,
    BuildRailWaypoint = 6,
    BuildBridge = 7,
    BuildTunnel = 8,
    LandscapeClear = 9,
    BuildCanal = 10,
    BuildShipDepot = 11,
    BuildVehicle = 12,
    SellVehicle = 13,
    MoveRailVehicle = 14,
    StartStopVehicle = 15,
    ReverseTrainDirection = 16,
    ForceTrainProceed = 17,
    SendVehicleToDepot = 18,
    SetVehicleOrder = 19,
    Pause = 20,
    GiveMoney = 21,
    BuildDock = 22,
}

/// Properties of a command kind, fixed in [`COMMAND_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandFlags {
    /// The command has no tile, or its tile needs no bounds check.
    pub tile_agnostic: bool,
    /// May be issued by the deity.
    pub deity: bool,
    /// Only the server (acting as deity) may issue it.
    pub server_only: bool,
    /// Test and execute phases may legitimately disagree.
    pub no_test: bool,
    pub allowed_while_paused: bool,
    /// Skips the money check and may be issued by a bankrupt company.
    pub bankrupt_exempt: bool,
}

impl CommandFlags {
    pub const NONE: CommandFlags = CommandFlags {
        tile_agnostic: false,
        deity: false,
        server_only: false,
        no_test: false,
        allowed_while_paused: false,
        bankrupt_exempt: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub flags: CommandFlags,
    pub expense: ExpenseType,
    /// Headline shown above the error of a failed command.
    pub error_summary: &'static str,
}

const fn info(
    name: &'static str,
    flags: CommandFlags,
    expense: ExpenseType,
    error_summary: &'static str,
) -> CommandInfo {
    CommandInfo {
        name,
        flags,
        expense,
        error_summary,
    }
}

const AGNOSTIC: CommandFlags = CommandFlags {
    tile_agnostic: true,
    ..CommandFlags::NONE
};

const VEHICLE_CONTROL: CommandFlags = CommandFlags {
    tile_agnostic: true,
    bankrupt_exempt: true,
    ..CommandFlags::NONE
};

/// Indexed by opcode.
pub static COMMAND_TABLE: [CommandInfo; 23] = [
    info("build_railroad_track", CommandFlags::NONE, ExpenseType::Construction, "Can't build railway track here"),
    info("remove_railroad_track", CommandFlags::NONE, ExpenseType::Construction, "Can't remove railway track from here"),
    info("build_signals", CommandFlags::NONE, ExpenseType::Construction, "Can't build signals here"),
    info("remove_signals", CommandFlags::NONE, ExpenseType::Construction, "Can't remove signals from here"),
    info("build_train_depot", CommandFlags::NONE, ExpenseType::Construction, "Can't build train depot here"),
    info("build_rail_station", CommandFlags::NONE, ExpenseType::Construction, "Can't build railway station here"),
    info("build_rail_waypoint", CommandFlags::NONE, ExpenseType::Construction, "Can't build waypoint here"),
    info("build_bridge", CommandFlags::NONE, ExpenseType::Construction, "Can't build bridge here"),
    info("build_tunnel", CommandFlags::NONE, ExpenseType::Construction, "Can't build tunnel here"),
    info(
        "landscape_clear",
        CommandFlags {
            deity: true,
            no_test: true,
            ..CommandFlags::NONE
        },
        ExpenseType::Construction,
        "Can't clear this area",
    ),
    info(
        "build_canal",
        CommandFlags {
            deity: true,
            ..CommandFlags::NONE
        },
        ExpenseType::Construction,
        "Can't build canals here",
    ),
    info("build_ship_depot", CommandFlags::NONE, ExpenseType::Construction, "Can't build ship depot here"),
    info("build_vehicle", CommandFlags::NONE, ExpenseType::NewVehicles, "Can't buy vehicle"),
    info("sell_vehicle", AGNOSTIC, ExpenseType::NewVehicles, "Can't sell vehicle"),
    info("move_rail_vehicle", AGNOSTIC, ExpenseType::NewVehicles, "Can't move vehicle"),
    info("start_stop_vehicle", VEHICLE_CONTROL, ExpenseType::Other, "Can't start or stop vehicle"),
    info("reverse_train_direction", VEHICLE_CONTROL, ExpenseType::TrainRun, "Can't reverse direction of train"),
    info("force_train_proceed", VEHICLE_CONTROL, ExpenseType::TrainRun, "Can't make train pass signal at danger"),
    info("send_vehicle_to_depot", VEHICLE_CONTROL, ExpenseType::Other, "Can't send vehicle to depot"),
    info("set_vehicle_order", VEHICLE_CONTROL, ExpenseType::Other, "Can't change orders"),
    info(
        "pause",
        CommandFlags {
            tile_agnostic: true,
            deity: true,
            server_only: true,
            allowed_while_paused: true,
            bankrupt_exempt: true,
            ..CommandFlags::NONE
        },
        ExpenseType::Other,
        "Can't pause the game",
    ),
    info("give_money", AGNOSTIC, ExpenseType::Other, "Can't give money to this company"),
    info("build_dock", CommandFlags::NONE, ExpenseType::Construction, "Can't build dock here"),
];

impl CommandKind {
    pub const ALL: [CommandKind; 23] = [
        CommandKind::BuildRailroadTrack,
        CommandKind::RemoveRailroadTrack,
        CommandKind::BuildSingleSignal,
        CommandKind::RemoveSingleSignal,
        CommandKind::BuildTrainDepot,
        CommandKind::BuildRailStation,
        CommandKind::BuildRailWaypoint,
        CommandKind::BuildBridge,
        CommandKind::BuildTunnel,
        CommandKind::LandscapeClear,
        CommandKind::BuildCanal,
        CommandKind::BuildShipDepot,
        CommandKind::BuildVehicle,
        CommandKind::SellVehicle,
        CommandKind::MoveRailVehicle,
        CommandKind::StartStopVehicle,
        CommandKind::ReverseTrainDirection,
        CommandKind::ForceTrainProceed,
        CommandKind::SendVehicleToDepot,
        CommandKind::SetVehicleOrder,
        CommandKind::Pause,
        CommandKind::GiveMoney,
        CommandKind::BuildDock,
    ];

    pub fn opcode(self) -> u8 {
        self as u8
    }

    pub fn from_opcode(opcode: u8) -> Option<CommandKind> {
        Self::ALL.get(opcode as usize).copied()
    }

    pub fn info(self) -> &'static CommandInfo {
        &COMMAND_TABLE[self as usize]
    }

    pub fn error_summary(self) -> &'static str {
        self.info().error_summary
    }
}

pub fn command_flags(kind: CommandKind) -> CommandFlags {
    kind.info().flags
}

pub fn command_name(kind: CommandKind) -> &'static str {
    kind.info().name
}

pub fn is_command_allowed_while_paused(kind: CommandKind) -> bool {
    kind.info().flags.allowed_while_paused
}

/// A command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    BuildRailroadTrack {
        tile: TileIndex,
        track: Track,
        rail_type: RailType,
    },
    RemoveRailroadTrack {
        tile: TileIndex,
        track: Track,
    },
    /// A signal facing trains on `facing`, or a two-way pair when `None`.
    /// Replaces any signal already on the track.
    BuildSingleSignal {
        tile: TileIndex,
        track: Track,
        variant: SignalVariant,
        facing: Option<Trackdir>,
    },
    RemoveSingleSignal {
        tile: TileIndex,
        track: Track,
    },
    BuildTrainDepot {
        tile: TileIndex,
        exit: DiagDirection,
        rail_type: RailType,
    },
    /// A platform of `length` tiles from `tile` along `axis`. Joins the
    /// adjacent station of the same owner, if there is exactly one.
    BuildRailStation {
        tile: TileIndex,
        axis: Axis,
        length: u8,
        rail_type: RailType,
    },
    /// Turns a straight piece of track into a waypoint.
    BuildRailWaypoint {
        tile: TileIndex,
        axis: Axis,
    },
    /// A rail bridge, or an aqueduct for [`Transport::Water`].
    BuildBridge {
        start: TileIndex,
        end: TileIndex,
        transport: Transport,
    },
    BuildTunnel {
        start: TileIndex,
        end: TileIndex,
        rail_type: RailType,
    },
    LandscapeClear {
        tile: TileIndex,
    },
    /// Canal over the rectangle with corners `start` and `end`.
    BuildCanal {
        start: TileIndex,
        end: TileIndex,
    },
    BuildShipDepot {
        tile: TileIndex,
        exit: DiagDirection,
    },
    BuildVehicle {
        depot: TileIndex,
        engine: EngineId,
    },
    SellVehicle {
        vehicle: VehicleId,
        whole_chain: bool,
    },
    MoveRailVehicle {
        src: VehicleId,
        dest: Option<VehicleId>,
        whole_chain: bool,
    },
    StartStopVehicle {
        vehicle: VehicleId,
    },
    ReverseTrainDirection {
        train: VehicleId,
    },
    ForceTrainProceed {
        train: VehicleId,
    },
    SendVehicleToDepot {
        vehicle: VehicleId,
    },
    SetVehicleOrder {
        vehicle: VehicleId,
        index: usize,
        order: Order,
        replace: bool,
    },
    Pause {
        paused: bool,
    },
    GiveMoney {
        to: CompanyId,
        amount: i64,
    },
    /// A docking tile on water for `station`, or for a new station.
    BuildDock {
        tile: TileIndex,
        station: Option<StationId>,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::BuildRailroadTrack { .. } => CommandKind::BuildRailroadTrack,
            Command::RemoveRailroadTrack { .. } => CommandKind::RemoveRailroadTrack,
            Command::BuildSingleSignal { .. } => CommandKind::BuildSingleSignal,
            Command::RemoveSingleSignal { .. } => CommandKind::RemoveSingleSignal,
            Command::BuildTrainDepot { .. } => CommandKind::BuildTrainDepot,
            Command::BuildRailStation { .. } => CommandKind::BuildRailStation,
            Command::BuildRailWaypoint { .. } => CommandKind::BuildRailWaypoint,
            Command::BuildBridge { .. } => CommandKind::BuildBridge,
            Command::BuildTunnel { .. } => CommandKind::BuildTunnel,
            Command::LandscapeClear { .. } => CommandKind::LandscapeClear,
            Command::BuildCanal { .. } => CommandKind::BuildCanal,
            Command::BuildShipDepot { .. } => CommandKind::BuildShipDepot,
            Command::BuildVehicle { .. } => CommandKind::BuildVehicle,
            Command::SellVehicle { .. } => CommandKind::SellVehicle,
            Command::MoveRailVehicle { .. } => CommandKind::MoveRailVehicle,
            Command::StartStopVehicle { .. } => CommandKind::StartStopVehicle,
            Command::ReverseTrainDirection { .. } => CommandKind::ReverseTrainDirection,
            Command::ForceTrainProceed { .. } => CommandKind::ForceTrainProceed,
            Command::SendVehicleToDepot { .. } => CommandKind::SendVehicleToDepot,
            Command::SetVehicleOrder { .. } => CommandKind::SetVehicleOrder,
            Command::Pause { .. } => CommandKind::Pause,
            Command::GiveMoney { .. } => CommandKind::GiveMoney,
            Command::BuildDock { .. } => CommandKind::BuildDock,
        }
    }

    /// Tile the command acts on, if it has one.
    pub fn tile(&self) -> Option<TileIndex> {
        match self {
            Command::BuildRailroadTrack { tile, .. }
            | Command::RemoveRailroadTrack { tile, .. }
            | Command::BuildSingleSignal { tile, .. }
            | Command::RemoveSingleSignal { tile, .. }
            | Command::BuildTrainDepot { tile, .. }
            | Command::BuildRailStation { tile, .. }
            | Command::BuildRailWaypoint { tile, .. }
            | Command::LandscapeClear { tile }
            | Command::BuildShipDepot { tile, .. }
            | Command::BuildDock { tile, .. } => Some(*tile),
            Command::BuildBridge { start, .. }
            | Command::BuildTunnel { start, .. }
            | Command::BuildCanal { start, .. } => Some(*start),
            Command::BuildVehicle { depot, .. } => Some(*depot),
            _ => None,
        }
    }

    /// Run one phase of the command. With `flags.exec` unset nothing
    /// persistent is changed.
    pub fn exec(
        &self,
        state: &mut WorldState,
        actor: Actor,
        flags: DoFlags,
        ctx: ExecutionContext,
    ) -> CommandResult {
        handlers::dispatch(state, actor, self, flags, ctx)
    }

    /// Run the whole transaction: validity checks, test, money check,
    /// network hand-off, execution and bookkeeping. `callback` is invoked
    /// with the result on this machine only.
    pub fn execp(
        &self,
        state: &mut WorldState,
        net: &mut CommandQueue,
        actor: Actor,
        source: CommandSource,
        callback: Option<CommandCallback>,
    ) -> CommandResult {
        let result = match self.transaction(state, net, actor, source, callback) {
            Transaction::Done(result) => result,
            Transaction::Sent => return Ok(CommandCost::free()),
        };
        match &result {
            Ok(cost) => log::debug!(
                "{} by {:?} done, cost {}",
                command_name(self.kind()),
                actor,
                cost.cost
            ),
            Err(e) => log::debug!("{}: {e}", self.kind().error_summary()),
        }
        if let Some(callback) = callback {
            callback(state, self, &result);
        }
        result
    }

    fn transaction(
        &self,
        state: &mut WorldState,
        net: &mut CommandQueue,
        actor: Actor,
        source: CommandSource,
        callback: Option<CommandCallback>,
    ) -> Transaction {
        let kind = self.kind();
        let info = kind.info();
        let _span = tracing::debug_span!("command", name = info.name).entered();

        if let Err(e) = check_allowed(state, actor, self) {
            return Transaction::Done(Err(e));
        }
        let tested = match self.exec(state, actor, DoFlags::TEST, ExecutionContext::TOP) {
            Ok(cost) => cost,
            Err(e) => return Transaction::Done(Err(e)),
        };
        if let Err(e) = check_affordable(state, actor, info, &tested) {
            return Transaction::Done(Err(e));
        }

        if net.mode() == NetworkMode::Client && source == CommandSource::Local {
            net.send(CommandPacket::new(actor, self.clone(), callback));
            return Transaction::Sent;
        }

        let result = self.exec(state, actor, DoFlags::EXEC, ExecutionContext::TOP);
        if !info.flags.no_test {
            debug_assert_eq!(
                result,
                Ok(tested),
                "test and execute of {} disagree",
                info.name
            );
        }
        debug_assert!(
            !state.signal_batch_open,
            "{} left a signal batch outstanding",
            info.name
        );
        let cost = match result {
            Ok(cost) => cost,
            Err(e) => return Transaction::Done(Err(e)),
        };

        if let Actor::Company(company) = actor {
            if let Some(c) = state.companies.get_mut(&company) {
                if !info.flags.bankrupt_exempt {
                    c.subtract(cost.expense, cost.cost);
                }
                if info.expense == ExpenseType::Construction {
                    if let Some(tile) = self.tile() {
                        c.last_build_tile = Some(tile);
                    }
                }
            }
        }
        if net.mode() == NetworkMode::Server {
            net.broadcast(CommandPacket::new(actor, self.clone(), None), state.tick);
        }
        Transaction::Done(Ok(cost))
    }
}

enum Transaction {
    Done(CommandResult),
    /// Handed to the server; the real result arrives with its echo.
    Sent,
}

/// Which phase a handler is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoFlags {
    pub exec: bool,
}

impl DoFlags {
    pub const TEST: DoFlags = DoFlags { exec: false };
    pub const EXEC: DoFlags = DoFlags { exec: true };
}

/// Position of a call in a chain of nested commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    /// The call came from outside any other command.
    pub is_top_level: bool,
}

impl ExecutionContext {
    pub const TOP: ExecutionContext = ExecutionContext { is_top_level: true };

    pub fn nested(self) -> ExecutionContext {
        ExecutionContext {
            is_top_level: false,
        }
    }
}

/// Where a command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandSource {
    /// Issued on this machine.
    Local,
    /// Replayed from the server's authoritative sequence.
    Network,
}

/// Called with the outcome of a command on the machine that issued it.
pub type CommandCallback = fn(&WorldState, &Command, &CommandResult);

/// Run `command` in the given phase. Called at the top level with
/// `flags.exec` set, the command is tested first and only executed when the
/// test succeeds. Nested calls with `flags.exec` set execute directly, since
/// the enclosing command's test phase already covered them.
pub fn do_command(
    state: &mut WorldState,
    actor: Actor,
    command: &Command,
    flags: DoFlags,
    ctx: ExecutionContext,
) -> CommandResult {
    if !flags.exec {
        return command.exec(state, actor, DoFlags::TEST, ctx);
    }
    if !ctx.is_top_level {
        return command.exec(state, actor, flags, ctx);
    }
    let tested = command.exec(state, actor, DoFlags::TEST, ctx)?;
    let result = command.exec(state, actor, flags, ctx);
    if !command_flags(command.kind()).no_test {
        debug_assert_eq!(result, Ok(tested), "test and execute of {:?} disagree", command.kind());
    }
    result
}

/// Issue a command from this machine.
pub fn do_command_p(
    state: &mut WorldState,
    net: &mut CommandQueue,
    actor: Actor,
    command: &Command,
    callback: Option<CommandCallback>,
) -> CommandResult {
    command.execp(state, net, actor, CommandSource::Local, callback)
}

/// What `command` would cost, without running it.
pub fn estimate(state: &mut WorldState, actor: Actor, command: &Command) -> CommandResult {
    check_allowed(state, actor, command)?;
    command.exec(state, actor, DoFlags::TEST, ExecutionContext::TOP)
}

fn check_allowed(state: &WorldState, actor: Actor, command: &Command) -> Result<(), CommandError> {
    let flags = command_flags(command.kind());
    if !flags.tile_agnostic {
        if let Some(tile) = command.tile() {
            if !state.map.is_valid(tile) {
                return Err(CommandError::TileOutOfBounds(tile));
            }
        }
    }
    match actor {
        Actor::Spectator => return Err(CommandError::NotPermitted),
        Actor::Deity if !flags.deity => return Err(CommandError::NotPermitted),
        Actor::Deity => {}
        Actor::Company(_) if flags.server_only => return Err(CommandError::NotPermitted),
        Actor::Company(id) => {
            let company = state
                .companies
                .get(&id)
                .ok_or(CommandError::UnknownCompany(id))?;
            if company.bankrupt && !flags.bankrupt_exempt {
                return Err(CommandError::NotPermitted);
            }
        }
    }
    if state.paused && !flags.allowed_while_paused {
        return Err(CommandError::Paused);
    }
    Ok(())
}

fn check_affordable(
    state: &WorldState,
    actor: Actor,
    info: &CommandInfo,
    cost: &CommandCost,
) -> Result<(), CommandError> {
    if info.flags.bankrupt_exempt || cost.cost <= 0 {
        return Ok(());
    }
    let Actor::Company(id) = actor else {
        return Ok(());
    };
    let available = state
        .companies
        .get(&id)
        .map_or(0, |c| c.available_money());
    if cost.cost > available {
        return Err(CommandError::InsufficientFunds {
            required: cost.cost,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
