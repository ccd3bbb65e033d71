use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// The bot was disabled or stopped while a command was running
    #[error("interrupted")]
    Interrupted,
    #[error("input driver failed: {0:#}")]
    Input(anyhow::Error),
    #[error("rune not resolved after {attempts} attempt(s)")]
    EventResolutionTimeout { attempts: u32 },
}
