use maple_state::{Command, GameState, Point};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use crate::commands::Execute;
use crate::config::BotConfig;
use crate::context::ExecContext;
use crate::error::BotError;
use crate::input::InputDriver;
use crate::navigate::{adjust_to, move_to};

/// The command engine: runs the routine while enabled and resolves runes
/// the capture loop publishes.
pub struct Bot {
    ctx: ExecContext,
    /// Arrivals per point id, for point frequencies
    visits: HashMap<String, u64>,
}

impl Bot {
    pub fn new(
        state: Arc<GameState>,
        driver: Arc<dyn InputDriver>,
        config: BotConfig,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ctx: ExecContext::new(state, driver, config, stop),
            visits: HashMap::new(),
        }
    }

    /// Run cycles until the stop flag is set
    pub fn run(mut self) {
        info!(
            "Command engine started with {} routine point(s)",
            self.ctx.state().routine_len()
        );
        while !self.ctx.cancel_token().is_stopped() {
            self.cycle();
        }
        info!("Command engine stopped");
    }

    /// One engine cycle. Idles while disabled, alerting, without a routine or
    /// before the player has been seen on the minimap.
    pub fn cycle(&mut self) {
        let state = self.ctx.state().clone();
        if !state.enabled()
            || state.alert_active()
            || state.routine_len() == 0
            || state.player_pos().is_none()
        {
            thread::sleep(self.ctx.config().idle_interval());
            return;
        }

        let result = Command::Buff.execute(&mut self.ctx).and_then(|()| {
            if state.rune_active() {
                self.resolve_rune()
            } else {
                self.run_point()
            }
        });

        match result {
            Ok(()) => {}
            Err(BotError::Interrupted) => debug!("Cycle interrupted"),
            Err(e) => warn!("{}", e),
        }
    }

    /// Visit the current point, then advance the routine
    fn run_point(&mut self) -> Result<(), BotError> {
        // Buff swallows its own interruption
        self.ctx.check()?;
        let state = self.ctx.state().clone();
        let Some(point) = state.current_point() else {
            return Ok(());
        };
        let visit = self.visits.get(point.id()).copied().unwrap_or(0);
        let max_steps = self.ctx.config().move_max_steps;

        if point.is_active_visit(visit) {
            move_to(&self.ctx, point.location(), max_steps)?;
            if point.adjust() {
                adjust_to(&self.ctx, point.location(), self.ctx.config().adjust_max_steps)?;
            }
            for command in point.commands() {
                command.execute(&mut self.ctx)?;
                self.ctx.check()?;
            }
        } else if !point.skip() {
            move_to(&self.ctx, point.location(), max_steps)?;
        }

        self.visits.insert(point.id().to_string(), visit + 1);
        if let Some(next) = state.advance_routine() {
            debug!("Next point {}", next.id());
        }
        Ok(())
    }

    /// Walk to the rune and activate it. The rune is cleared on success and
    /// after the last failed attempt; only an interruption leaves it active.
    fn resolve_rune(&mut self) -> Result<(), BotError> {
        let state = self.ctx.state().clone();
        let rune = state.rune();
        let Some(rune_pos) = rune.position else {
            state.clear_rune();
            return Ok(());
        };

        let config = self.ctx.config().clone();
        for attempt in 1..=config.rune_attempts {
            if let Some(target) = rune.target.as_ref().map(Point::location) {
                move_to(&self.ctx, target, config.move_max_steps)?;
            }
            move_to(&self.ctx, rune_pos, config.move_max_steps)?;
            adjust_to(&self.ctx, rune_pos, config.adjust_max_steps)?;

            let reached = self
                .ctx
                .player_pos()
                .is_some_and(|pos| pos.distance(&rune_pos) <= config.adjust_tolerance);
            if reached {
                self.ctx.press(&config.interact_key, 1)?;
                info!("Rune activated on attempt {}", attempt);
                state.clear_rune();
                return Ok(());
            }
            debug!("Rune attempt {} of {} missed", attempt, config.rune_attempts);
        }

        state.clear_rune();
        Err(BotError::EventResolutionTimeout {
            attempts: config.rune_attempts,
        })
    }
}
