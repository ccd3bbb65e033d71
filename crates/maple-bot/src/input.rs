use anyhow::Result;
use tracing::debug;

/// Keyboard collaborator. Keys are symbolic names ("left", "space", "f1", ...);
/// calls are synchronous and best-effort.
pub trait InputDriver: Send + Sync {
    fn key_down(&self, key: &str) -> Result<()>;
    fn key_up(&self, key: &str) -> Result<()>;
}

/// Driver that only logs key events. Used when no OS injection backend is wired in.
#[derive(Debug, Default)]
pub struct LogDriver;

impl InputDriver for LogDriver {
    fn key_down(&self, key: &str) -> Result<()> {
        debug!(target: "maple_bot::input", "key_down(\"{}\")", key);
        Ok(())
    }

    fn key_up(&self, key: &str) -> Result<()> {
        debug!(target: "maple_bot::input", "key_up(\"{}\")", key);
        Ok(())
    }
}
