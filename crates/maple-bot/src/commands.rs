use maple_state::{Command, Direction, Position};
use std::time::Duration;
use tracing::debug;

use crate::context::{Cooldowns, ExecContext, DOWN_TIME, UP_TIME};
use crate::error::BotError;
use crate::navigate::{adjust_to, move_to, teleport};

/// Running a command against the game.
pub trait Execute {
    /// Perform the command's key sequence. Returns `Ok(())` early, with every
    /// held key released, once the bot is disabled; only input failures are errors.
    fn execute(&self, ctx: &mut ExecContext) -> Result<(), BotError>;
}

impl Execute for Command {
    fn execute(&self, ctx: &mut ExecContext) -> Result<(), BotError> {
        match perform(self, ctx) {
            Err(BotError::Interrupted) => {
                debug!("{} interrupted", self.name());
                Ok(())
            }
            other => other,
        }
    }
}

const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn perform(command: &Command, ctx: &mut ExecContext) -> Result<(), BotError> {
    match *command {
        Command::Move { x, y, max_steps } => move_to(ctx, Position::new(x, y), max_steps),
        Command::Adjust { x, y, max_steps } => adjust_to(ctx, Position::new(x, y), max_steps),
        Command::Buff => buff(ctx),
        Command::Teleport { direction, jump } => teleport(ctx, direction, jump),
        Command::Shikigami {
            direction,
            attacks,
            repetitions,
        } => {
            if repetitions == 0 || attacks == 0 {
                return Ok(());
            }
            ctx.pause(ms(50))?;
            let held = ctx.hold(direction.key())?;
            ctx.pause(ms(50))?;
            for _ in 0..repetitions {
                ctx.press_timed("r", attacks, DOWN_TIME, ms(50))?;
            }
            held.release()?;
            ctx.pause(if attacks > 2 { ms(300) } else { ms(200) })
        }
        Command::Tengu => ctx.press("q", 1),
        Command::Yaksha { direction } => {
            // Toward the map center when no side is given
            let direction = direction.unwrap_or_else(|| match ctx.player_pos() {
                Some(pos) if pos.x > 0.5 => Direction::Left,
                _ => Direction::Right,
            });
            ctx.press_timed(direction.key(), 1, ms(100), ms(50))?;
            ctx.press("2", 3)
        }
        Command::Vanquisher => {
            // Stays held until the next Vanquisher
            ctx.key_up("f")?;
            ctx.pause(ms(75))?;
            ctx.key_down("f")?;
            ctx.pause(ms(150))
        }
        Command::Kishin => ctx.press_timed("ctrl", 4, ms(100), ms(150)),
        Command::NineTails => ctx.press("3", 3),
        Command::Exorcist { jump } => {
            if jump {
                ctx.press_timed("space", 1, ms(100), ms(150))?;
            }
            ctx.press_timed("w", 2, DOWN_TIME, ms(50))
        }
        Command::Domain => ctx.press("z", 3),
        Command::Legion => ctx.press_timed("5", 2, ms(100), UP_TIME),
        Command::BlossomBarrier => ctx.press("g", 2),
        Command::Yukimusume => ctx.press("c", 2),
        Command::Balance => ctx.press("lshift", 2),
        Command::Charm => ctx.press("d", 2),
        Command::Wait { millis } => ctx.pause(ms(millis as u64)),
    }
}

/// Cast Haku Reborn and the regular buffs, each group only once its cooldown elapsed
fn buff(ctx: &mut ExecContext) -> Result<(), BotError> {
    let haku_period = Duration::from_secs(ctx.config().haku_cooldown_secs);
    if Cooldowns::ready(ctx.cooldowns.haku, haku_period) {
        ctx.press("f4", 2)?;
        ctx.press("f3", 2)?;
        ctx.cooldowns.haku = Some(std::time::Instant::now());
    }

    let buff_period = Duration::from_secs(ctx.config().buff_cooldown_secs);
    if Cooldowns::ready(ctx.cooldowns.buffs, buff_period) {
        for key in ["f1", "f2"] {
            ctx.press_timed(key, 3, DOWN_TIME, ms(300))?;
        }
        ctx.cooldowns.buffs = Some(std::time::Instant::now());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotConfig;
    use crate::context::tests::test_context;
    use crate::input::tests::KeyEvent;
    use maple_state::CommandSpec;
    use std::thread;
    use std::time::Instant;

    fn command(spec: CommandSpec) -> Command {
        Command::from_spec(&spec).unwrap()
    }

    #[test]
    fn test_shikigami_key_sequence() {
        let (mut ctx, driver) = test_context(BotConfig::default());
        command(CommandSpec::new("Shikigami").arg("direction", "left"))
            .execute(&mut ctx)
            .unwrap();
        assert_eq!(
            driver.events(),
            vec![
                KeyEvent::Down("left".into()),
                KeyEvent::Down("r".into()),
                KeyEvent::Up("r".into()),
                KeyEvent::Down("r".into()),
                KeyEvent::Up("r".into()),
                KeyEvent::Up("left".into()),
            ]
        );
    }

    #[test]
    fn test_zero_repetitions_is_noop() {
        let (mut ctx, driver) = test_context(BotConfig::default());
        command(
            CommandSpec::new("Shikigami")
                .arg("direction", "right")
                .arg("repetitions", "0"),
        )
        .execute(&mut ctx)
        .unwrap();
        command(
            CommandSpec::new("Shikigami")
                .arg("direction", "left")
                .arg("attacks", "0")
                .arg("repetitions", "3"),
        )
        .execute(&mut ctx)
        .unwrap();
        command(CommandSpec::new("Wait").arg("millis", "0"))
            .execute(&mut ctx)
            .unwrap();
        assert!(driver.events().is_empty());
    }

    #[test]
    fn test_wait_cancelled_within_poll_interval() {
        let (mut ctx, _) = test_context(BotConfig::default());
        let state = ctx.state().clone();
        let disabler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            state.set_enabled(false);
            Instant::now()
        });

        let wait = Command::Wait { millis: 5_000 };
        assert!(wait.execute(&mut ctx).is_ok());
        let returned = Instant::now();
        let disabled_at = disabler.join().unwrap();
        assert!(returned.duration_since(disabled_at) <= Duration::from_millis(100));
    }

    #[test]
    fn test_interrupted_attack_releases_direction() {
        let (mut ctx, driver) = test_context(BotConfig::default());
        let state = ctx.state().clone();
        let disabler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            state.set_enabled(false);
        });

        let started = Instant::now();
        let attack = Command::Shikigami {
            direction: Direction::Right,
            attacks: 5,
            repetitions: 50,
        };
        assert!(attack.execute(&mut ctx).is_ok());
        disabler.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(driver.held().is_empty());
        assert!(driver.downs().contains(&"right".to_string()));
    }

    #[test]
    fn test_yaksha_faces_map_center() {
        let (mut ctx, driver) = test_context(BotConfig::default());
        ctx.state().set_player_pos(Position::new(0.7, 0.5));
        Command::Yaksha { direction: None }.execute(&mut ctx).unwrap();
        assert_eq!(driver.downs(), vec!["left", "2", "2", "2"]);
    }

    #[test]
    fn test_single_key_skills() {
        let cases = [
            (Command::Tengu, vec!["q"]),
            (Command::NineTails, vec!["3", "3", "3"]),
            (Command::Domain, vec!["z", "z", "z"]),
            (Command::Charm, vec!["d", "d"]),
            (
                Command::Exorcist { jump: true },
                vec!["space", "w", "w"],
            ),
        ];
        for (cmd, keys) in cases {
            let (mut ctx, driver) = test_context(BotConfig::default());
            cmd.execute(&mut ctx).unwrap();
            assert_eq!(driver.downs(), keys, "{}", cmd.name());
            assert!(driver.held().is_empty());
        }
    }

    #[test]
    fn test_vanquisher_keeps_key_held() {
        let (mut ctx, driver) = test_context(BotConfig::default());
        Command::Vanquisher.execute(&mut ctx).unwrap();
        assert_eq!(driver.held(), vec!["f".to_string()]);
    }

    #[test]
    fn test_buff_respects_cooldowns() {
        let (mut ctx, driver) = test_context(BotConfig::default());
        ctx.cooldowns = Cooldowns::default();

        Command::Buff.execute(&mut ctx).unwrap();
        assert_eq!(
            driver.downs(),
            vec!["f4", "f4", "f3", "f3", "f1", "f1", "f1", "f2", "f2", "f2"]
        );
        assert!(ctx.cooldowns.haku.is_some());
        assert!(ctx.cooldowns.buffs.is_some());

        Command::Buff.execute(&mut ctx).unwrap();
        assert_eq!(driver.downs().len(), 10);
    }

    #[test]
    fn test_input_failure_is_an_error() {
        let (mut ctx, _) = test_context(BotConfig::default());
        let state = ctx.state().clone();
        let driver = std::sync::Arc::new(crate::input::tests::RecordingDriver::failing_on("q"));
        let mut failing = ExecContext::new(
            state,
            driver,
            ctx.config().clone(),
            std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        );
        assert!(matches!(
            Command::Tengu.execute(&mut failing),
            Err(BotError::Input(_))
        ));
        assert!(Command::Wait { millis: 1 }.execute(&mut ctx).is_ok());
    }

    #[test]
    fn test_move_command_publishes_path() {
        let (mut ctx, _) = test_context(BotConfig::default());
        ctx.state().set_player_pos(Position::new(0.2, 0.2));
        command(CommandSpec::new("Move").arg("x", "0.25").arg("y", "0.2"))
            .execute(&mut ctx)
            .unwrap();
        assert_eq!(ctx.state().path().len(), 2);
    }
}
