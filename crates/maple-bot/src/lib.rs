mod commands;
mod config;
mod context;
mod engine;
mod error;
mod input;
mod navigate;

pub use commands::Execute;
pub use config::BotConfig;
pub use context::{CancelToken, Cooldowns, ExecContext};
pub use engine::Bot;
pub use error::BotError;
pub use input::{InputDriver, LogDriver};
pub use navigate::{adjust_to, move_to};
