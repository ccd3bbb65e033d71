//! Shared game state for the capture loop and the command engine.
//!
//! The store in [`GameState`] is the only channel between perception and
//! action: the capture loop publishes what it sees, the engine reads it and
//! drives input, and external controls flip the enabled flag.

mod command;
mod position;
mod routine;
mod store;
pub mod validate;

pub use command::{Command, CommandSpec, Direction};
pub use position::Position;
pub use routine::{Point, PointDef, Routine};
pub use store::{GameState, GameStateSnapshot, RuneState};
pub use validate::ValidationError;
