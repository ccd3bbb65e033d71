use maple_state::{Direction, Position};
use std::f64::consts::SQRT_2;
use std::time::Duration;
use tracing::debug;

use crate::context::{ExecContext, HeldKey, UP_TIME};
use crate::error::BotError;

const SETTLE: Duration = Duration::from_millis(50);
const LONG_PRESS: Duration = Duration::from_millis(100);

/// One class movement step toward `target`. Arrow keys are held by the caller.
fn step(ctx: &ExecContext, direction: Direction, target: Position) -> Result<(), BotError> {
    let presses = if direction.is_horizontal() { 2 } else { 1 };
    if let Some(pos) = ctx.player_pos() {
        if (target.y - pos.y).abs() > ctx.config().move_tolerance * 1.5 {
            match direction {
                Direction::Down => ctx.press("space", 3)?,
                Direction::Up => ctx.press("space", 1)?,
                _ => {}
            }
        }
    }
    ctx.press("e", presses)
}

/// Add the player's current position to the routine when recording
fn record_position(ctx: &ExecContext) {
    if ctx.state().record_layout() {
        if let Some(pos) = ctx.player_pos() {
            ctx.state().record_point(pos);
        }
    }
}

/// Teleport once in `direction`, jumping first if asked.
pub(crate) fn teleport(ctx: &ExecContext, direction: Direction, jump: bool) -> Result<(), BotError> {
    let presses = if direction.is_horizontal() { 3 } else { 2 };
    ctx.pause(SETTLE)?;

    let mut held = None;
    if direction != Direction::Up {
        held = Some(ctx.hold(direction.key())?);
        ctx.pause(SETTLE)?;
    }
    if jump {
        if direction == Direction::Down {
            ctx.press_timed("space", 3, LONG_PRESS, UP_TIME)?;
        } else {
            ctx.press("space", 1)?;
        }
    }
    if direction == Direction::Up {
        held = Some(ctx.hold(direction.key())?);
        ctx.pause(SETTLE)?;
    }
    ctx.press("e", presses)?;
    if let Some(key) = held {
        key.release()?;
    }

    record_position(ctx);
    Ok(())
}

/// Direction that closes the gap on one axis, if that gap exceeds `threshold`
fn correction(pos: Position, target: Position, horizontal: bool, threshold: f64) -> Option<Direction> {
    if horizontal {
        let dx = target.x - pos.x;
        (dx.abs() > threshold).then(|| Direction::horizontal(dx))
    } else {
        let dy = target.y - pos.y;
        (dy.abs() > threshold).then(|| Direction::vertical(dy))
    }
}

/// Travel toward `target` with class movement.
///
/// Alternates horizontal and vertical steps until the player is within
/// `move_tolerance` or `max_steps` steps were taken. The arrow key for the
/// current direction stays held between steps and is always released on exit.
/// Publishes `[player, target]` as the current path.
pub fn move_to(ctx: &ExecContext, target: Position, max_steps: u32) -> Result<(), BotError> {
    let tolerance = ctx.config().move_tolerance;
    let threshold = tolerance / SQRT_2;

    ctx.check()?;
    let Some(start) = ctx.player_pos() else {
        debug!("Player position unknown, not moving");
        return Ok(());
    };
    ctx.state().set_path(vec![start, target]);

    let mut held: Option<HeldKey<'_>> = None;
    let mut steps = 0;
    let mut horizontal = true;
    while steps < max_steps {
        ctx.check()?;
        let Some(pos) = ctx.player_pos() else { break };
        if pos.distance(&target) <= tolerance {
            break;
        }

        if let Some(direction) = correction(pos, target, horizontal, threshold) {
            if held.as_ref().map(|k| k.key()) != Some(direction.key()) {
                if let Some(previous) = held.take() {
                    previous.release()?;
                }
                held = Some(ctx.hold(direction.key())?);
            }
            step(ctx, direction, target)?;
            if !horizontal {
                record_position(ctx);
            }
            steps += 1;
        }
        horizontal = !horizontal;
    }

    if let Some(key) = held {
        key.release()?;
    }
    Ok(())
}

/// Hold `direction` until the player passes within `threshold` of `target_x`
fn walk(ctx: &ExecContext, direction: Direction, target_x: f64, threshold: f64) -> Result<(), BotError> {
    let held = ctx.hold(direction.key())?;
    for _ in 0..ctx.config().walk_max_ticks {
        let Some(pos) = ctx.player_pos() else { break };
        let dx = target_x - pos.x;
        let remaining = match direction {
            Direction::Left => dx < -threshold,
            _ => dx > threshold,
        };
        if !remaining {
            break;
        }
        ctx.pause(SETTLE)?;
    }
    held.release()
}

/// Close a small gap to `target` with fine movement.
///
/// Alternates walking horizontally and hopping vertically, at most
/// `max_steps` corrections, stopping once within `adjust_tolerance`.
pub fn adjust_to(ctx: &ExecContext, target: Position, max_steps: u32) -> Result<(), BotError> {
    let tolerance = ctx.config().adjust_tolerance;
    let threshold = tolerance / SQRT_2;

    let mut steps = 0;
    let mut horizontal = true;
    while steps < max_steps {
        ctx.check()?;
        let Some(pos) = ctx.player_pos() else { break };
        if pos.distance(&target) <= tolerance {
            break;
        }

        match correction(pos, target, horizontal, threshold) {
            Some(Direction::Up) => {
                teleport(ctx, Direction::Up, false)?;
                steps += 1;
            }
            Some(Direction::Down) => {
                let held = ctx.hold("down")?;
                ctx.pause(SETTLE)?;
                ctx.press_timed("space", 3, LONG_PRESS, UP_TIME)?;
                held.release()?;
                ctx.pause(SETTLE)?;
                steps += 1;
            }
            Some(direction) => {
                walk(ctx, direction, target.x, threshold)?;
                steps += 1;
            }
            None => {}
        }
        horizontal = !horizontal;
    }
    Ok(())
}
