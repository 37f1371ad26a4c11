//! Command results.

use crate::company::ExpenseType;
use crate::map::{CompanyId, TileIndex};
use crate::ship::ShipError;
use crate::train::consist::ConsistError;
use crate::vehicle::VehicleId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Money a successful command costs, booked under one expense category.
/// Negative costs are income, such as the proceeds of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCost {
    pub expense: ExpenseType,
    pub cost: i64,
}

impl CommandCost {
    pub fn new(expense: ExpenseType) -> Self {
        Self { expense, cost: 0 }
    }

    pub fn with_cost(expense: ExpenseType, cost: i64) -> Self {
        Self { expense, cost }
    }

    /// Nothing spent; also the placeholder result of a command handed to the
    /// network.
    pub fn free() -> Self {
        Self::new(ExpenseType::Other)
    }

    pub fn add_cost(&mut self, cost: i64) {
        self.cost += cost;
    }

    /// Add the cost of a sub-command.
    pub fn add(&mut self, other: CommandCost) {
        self.cost += other.cost;
    }
}

/// Why a command failed. Shown to the issuing player after the command's
/// error summary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("tile {0} is outside the map")]
    TileOutOfBounds(TileIndex),
    #[error("not allowed for this company")]
    NotPermitted,
    #[error("the game is paused")]
    Paused,
    #[error("not enough cash, {required} needed but only {available} available")]
    InsufficientFunds { required: i64, available: i64 },
    #[error("unknown company {0}")]
    UnknownCompany(CompanyId),
    #[error("site unsuitable")]
    SiteUnsuitable,
    #[error("already built")]
    AlreadyBuilt,
    #[error("no suitable railway track")]
    NoSuitableTrack,
    #[error("owned by another company")]
    OwnedByOther,
    #[error("must remove signals first")]
    MustRemoveSignals,
    #[error("no signal on this track")]
    NoSignal,
    #[error("train in the way")]
    TrainInTheWay,
    #[error("ship in the way")]
    ShipInTheWay,
    #[error("incompatible rail types")]
    IncompatibleRailType,
    #[error("bridge or tunnel ends are not in line")]
    EndsNotInLine,
    #[error("bridge or tunnel too short")]
    TooShort,
    #[error("unknown station {0}")]
    UnknownStation(u16),
    #[error("too close to another station")]
    AdjoinsMoreThanOneStation,
    #[error("unknown vehicle {0}")]
    UnknownVehicle(VehicleId),
    #[error("vehicle is owned by another company")]
    NotVehicleOwner,
    #[error("vehicle is destroyed")]
    VehicleCrashed,
    #[error("unable to find a depot")]
    NoDepotFound,
    #[error("order index {0} out of range")]
    InvalidOrderIndex(usize),
    #[error("nothing to clear")]
    NothingToClear,
    #[error("object in the way")]
    ObjectInTheWay,
    #[error(transparent)]
    Consist(#[from] ConsistError),
    #[error(transparent)]
    Ship(#[from] ShipError),
}

/// Outcome of running a command in either phase.
pub type CommandResult = Result<CommandCost, CommandError>;
