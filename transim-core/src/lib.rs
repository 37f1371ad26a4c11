//! # Transport Simulation Core
//!
//! Deterministic tile-based transport simulation: rail and water networks,
//! the trains and ships running on them, and the commands that change them.
//!
//! Every participant of a networked game runs this crate in lockstep. Given
//! the same initial [`WorldState`] and the same sequenced commands, every
//! participant computes bit-identical state, which [`WorldState::checksum`]
//! lets them verify.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │   Players   │────▶│ PlayerInputs │────▶│ step_world  │
//! │  (decide)   │     │ (commands)   │     │ (one tick)  │
//! └─────────────┘     └──────┬───────┘     └──────┬──────┘
//!                            │                    │
//!                     ┌──────▼───────┐     ┌──────▼──────┐
//!                     │ CommandQueue │────▶│ WorldState  │
//!                     │ (sequencing) │     │ (mutated)   │
//!                     └──────────────┘     └─────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`WorldState`] | Map, companies, vehicles and stations |
//! | [`Command`] | Player actions, run through a test then an execute phase |
//! | [`step_world`] | Advances the world one tick |
//! | [`CommandQueue`] | Server-ordered delivery of networked commands |
//! | [`Map`] | Tile grid with track, signals and reservations |
//!
//! ## Movement
//!
//! Trains pick their way with the YAPF rail search ([`pathfinder::yapf_rail`])
//! and reserve it through path signals ([`pbs`]). Ships use either the YAPF
//! water search or the older OPF one, chosen by [`config::PathfinderSettings`].

pub mod command;
pub mod company;
pub mod config;
pub mod engine;
pub mod follow_track;
pub mod map;
pub mod network;
pub mod news;
pub mod order;
pub mod pathfinder;
pub mod pathpos;
pub mod pbs;
pub mod pool;
pub mod profiling;
pub mod rng;
pub mod ship;
pub mod signal;
pub mod state;
pub mod station;
pub mod step;
pub mod tilearea;
pub mod track;
pub mod train;
pub mod vehicle;

#[cfg(test)]
pub mod testing;

pub use command::{do_command_p, estimate, Command, CommandCost, CommandError, CommandKind};
pub use company::{Actor, Company, ExpenseType};
pub use config::SimConfig;
pub use map::{Map, MapSize, TileIndex};
pub use network::{CommandPacket, CommandQueue, NetworkMode};
pub use state::WorldState;
pub use step::{step_world, PlayerInputs, StepReport};
