use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Movement tolerances, pacing and cooldowns for the command engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Distance at which a `Move` counts as arrived
    pub move_tolerance: f64,
    /// Distance at which an `Adjust` counts as arrived
    pub adjust_tolerance: f64,
    /// Longest single sleep between cancellation checks
    pub poll_interval_ms: u64,
    /// Sleep between engine cycles while disabled
    pub idle_interval_ms: u64,
    /// Step budget when navigating to a point or rune
    pub move_max_steps: u32,
    pub adjust_max_steps: u32,
    /// Polls of the player position while walking one horizontal stretch
    pub walk_max_ticks: u32,
    /// Tries at reaching and activating a rune before giving up on it
    pub rune_attempts: u32,
    pub buff_cooldown_secs: u64,
    pub haku_cooldown_secs: u64,
    pub interact_key: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            move_tolerance: 0.1,
            adjust_tolerance: 0.01,
            poll_interval_ms: 50,
            idle_interval_ms: 10,
            move_max_steps: 15,
            adjust_max_steps: 5,
            walk_max_ticks: 60,
            rune_attempts: 3,
            buff_cooldown_secs: 180,
            haku_cooldown_secs: 490,
            interact_key: "y".to_string(),
        }
    }
}

impl BotConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}
