use maple_state::{GameState, Position};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::BotConfig;
use crate::error::BotError;
use crate::input::InputDriver;

/// Default hold time of a key press
pub const DOWN_TIME: Duration = Duration::from_millis(50);
/// Default pause after releasing a pressed key
pub const UP_TIME: Duration = Duration::from_millis(100);

/// Trips once the bot is disabled or the process is shutting down.
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<GameState>,
    stop: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new(state: Arc<GameState>, stop: Arc<AtomicBool>) -> Self {
        Self { state, stop }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.state.enabled() || self.stop.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// When each buff group was last cast
#[derive(Debug, Clone, Default)]
pub struct Cooldowns {
    pub haku: Option<Instant>,
    pub buffs: Option<Instant>,
}

impl Cooldowns {
    /// Whether a cast at `last` is at least `period` ago (or never happened)
    pub fn ready(last: Option<Instant>, period: Duration) -> bool {
        last.map_or(true, |t| t.elapsed() > period)
    }
}

/// Everything a command needs while it runs.
///
/// Every wait goes through [`ExecContext::pause`], which sleeps in slices of
/// at most `poll_interval_ms` and returns [`BotError::Interrupted`] as soon as
/// the cancel token trips. A running command therefore stops within one poll
/// interval of the bot being disabled.
pub struct ExecContext {
    state: Arc<GameState>,
    driver: Arc<dyn InputDriver>,
    config: BotConfig,
    cancel: CancelToken,
    pub cooldowns: Cooldowns,
}

impl ExecContext {
    pub fn new(
        state: Arc<GameState>,
        driver: Arc<dyn InputDriver>,
        config: BotConfig,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let cancel = CancelToken::new(state.clone(), stop);
        Self {
            state,
            driver,
            config,
            cancel,
            cooldowns: Cooldowns::default(),
        }
    }

    pub fn state(&self) -> &Arc<GameState> {
        &self.state
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn player_pos(&self) -> Option<Position> {
        self.state.player_pos()
    }

    pub fn check(&self) -> Result<(), BotError> {
        if self.cancel.is_cancelled() {
            Err(BotError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Cancellable sleep
    pub fn pause(&self, duration: Duration) -> Result<(), BotError> {
        let deadline = Instant::now() + duration;
        let slice = self.config.poll_interval();
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep((deadline - now).min(slice));
        }
    }

    pub fn pause_ms(&self, millis: u64) -> Result<(), BotError> {
        self.pause(Duration::from_millis(millis))
    }

    pub fn key_down(&self, key: &str) -> Result<(), BotError> {
        self.driver.key_down(key).map_err(BotError::Input)
    }

    pub fn key_up(&self, key: &str) -> Result<(), BotError> {
        self.driver.key_up(key).map_err(BotError::Input)
    }

    /// Press `key` and keep it down until the returned guard is released or dropped
    pub fn hold(&self, key: &str) -> Result<HeldKey<'_>, BotError> {
        self.key_down(key)?;
        Ok(HeldKey {
            driver: self.driver.as_ref(),
            key: key.to_string(),
            released: false,
        })
    }

    pub fn press(&self, key: &str, times: u32) -> Result<(), BotError> {
        self.press_timed(key, times, DOWN_TIME, UP_TIME)
    }

    /// Press `key` `times` times, holding each press for `down` and waiting `up` after it
    pub fn press_timed(
        &self,
        key: &str,
        times: u32,
        down: Duration,
        up: Duration,
    ) -> Result<(), BotError> {
        for _ in 0..times {
            self.check()?;
            let held = self.hold(key)?;
            let waited = self.pause(down);
            held.release()?;
            waited?;
            self.pause(up)?;
        }
        Ok(())
    }
}

/// A key held down by [`ExecContext::hold`]. Released on drop if not released explicitly.
pub struct HeldKey<'a> {
    driver: &'a dyn InputDriver,
    key: String,
    released: bool,
}

impl HeldKey<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn release(mut self) -> Result<(), BotError> {
        self.released = true;
        self.driver.key_up(&self.key).map_err(BotError::Input)
    }
}

impl Drop for HeldKey<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.driver.key_up(&self.key) {
                warn!("Failed to release {}: {:#}", self.key, e);
            }
        }
    }
}
