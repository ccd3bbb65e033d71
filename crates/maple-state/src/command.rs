use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::validate::{
    validate_boolean, validate_coordinate, validate_direction, validate_horizontal,
    validate_nonnegative_int, ValidationError,
};

/// Default step budget for a `Move` written without `max_steps`
pub const DEFAULT_MOVE_STEPS: u32 = 15;

/// Default step budget for an `Adjust` written without `max_steps`
pub const DEFAULT_ADJUST_STEPS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Symbolic key that moves the character this way
    pub fn key(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    /// Horizontal direction that closes a signed x gap
    pub fn horizontal(delta: f64) -> Direction {
        if delta < 0.0 {
            Direction::Left
        } else {
            Direction::Right
        }
    }

    /// Vertical direction that closes a signed y gap (y grows downward)
    pub fn vertical(delta: f64) -> Direction {
        if delta < 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

/// A command as written in a routine definition: a name plus string arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, key: &str, value: &str) -> Self {
        self.args.insert(key.to_string(), value.to_string());
        self
    }
}

/// A validated macro.
///
/// Values are immutable once built; every parameter has already passed the
/// parsers in [`crate::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "name")]
pub enum Command {
    /// Travel toward a location with class movement.
    Move { x: f64, y: f64, max_steps: u32 },
    /// Close a small gap to a location with fine movement.
    Adjust { x: f64, y: f64, max_steps: u32 },
    /// Cast buffs whose cooldown has elapsed.
    Buff,
    Teleport { direction: Direction, jump: bool },
    Shikigami {
        direction: Direction,
        attacks: u32,
        repetitions: u32,
    },
    Tengu,
    /// `None` places the summon toward the map center.
    Yaksha { direction: Option<Direction> },
    Vanquisher,
    Kishin,
    NineTails,
    Exorcist { jump: bool },
    Domain,
    Legion,
    BlossomBarrier,
    Yukimusume,
    Balance,
    Charm,
    Wait { millis: u32 },
}

impl Command {
    /// Build a command from its definition, failing on the first bad argument.
    pub fn from_spec(spec: &CommandSpec) -> Result<Command, ValidationError> {
        let mut args = Args::new(&spec.name, &spec.args);

        let command = match spec.name.trim().to_ascii_lowercase().as_str() {
            "move" => Command::Move {
                x: args.required("x", validate_coordinate)?,
                y: args.required("y", validate_coordinate)?,
                max_steps: args.optional("max_steps", DEFAULT_MOVE_STEPS, validate_nonnegative_int)?,
            },
            "adjust" => Command::Adjust {
                x: args.required("x", validate_coordinate)?,
                y: args.required("y", validate_coordinate)?,
                max_steps: args.optional(
                    "max_steps",
                    DEFAULT_ADJUST_STEPS,
                    validate_nonnegative_int,
                )?,
            },
            "buff" => Command::Buff,
            "teleport" => Command::Teleport {
                direction: args.required("direction", validate_direction)?,
                jump: args.optional("jump", false, validate_boolean)?,
            },
            "shikigami" => Command::Shikigami {
                direction: args.required("direction", validate_horizontal)?,
                attacks: args.optional("attacks", 2, validate_nonnegative_int)?,
                repetitions: args.optional("repetitions", 1, validate_nonnegative_int)?,
            },
            "tengu" => Command::Tengu,
            "yaksha" => Command::Yaksha {
                direction: args.optional("direction", None, |v| validate_horizontal(v).map(Some))?,
            },
            "vanquisher" => Command::Vanquisher,
            "kishin" => Command::Kishin,
            "ninetails" => Command::NineTails,
            "exorcist" => Command::Exorcist {
                jump: args.optional("jump", false, validate_boolean)?,
            },
            "domain" => Command::Domain,
            "legion" => Command::Legion,
            "blossombarrier" => Command::BlossomBarrier,
            "yukimusume" => Command::Yukimusume,
            "balance" => Command::Balance,
            "charm" => Command::Charm,
            "wait" => Command::Wait {
                millis: args.required("millis", validate_nonnegative_int)?,
            },
            _ => return Err(ValidationError::UnknownCommand(spec.name.clone())),
        };

        args.finish()?;
        debug!("Created {} {:?}", command.name(), spec.args);
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Move { .. } => "Move",
            Command::Adjust { .. } => "Adjust",
            Command::Buff => "Buff",
            Command::Teleport { .. } => "Teleport",
            Command::Shikigami { .. } => "Shikigami",
            Command::Tengu => "Tengu",
            Command::Yaksha { .. } => "Yaksha",
            Command::Vanquisher => "Vanquisher",
            Command::Kishin => "Kishin",
            Command::NineTails => "NineTails",
            Command::Exorcist { .. } => "Exorcist",
            Command::Domain => "Domain",
            Command::Legion => "Legion",
            Command::BlossomBarrier => "BlossomBarrier",
            Command::Yukimusume => "Yukimusume",
            Command::Balance => "Balance",
            Command::Charm => "Charm",
            Command::Wait { .. } => "Wait",
        }
    }
}

/// Tracks which arguments a constructor consumed so leftovers can be rejected.
struct Args<'a> {
    command: &'a str,
    values: &'a BTreeMap<String, String>,
    used: Vec<&'a str>,
}

impl<'a> Args<'a> {
    fn new(command: &'a str, values: &'a BTreeMap<String, String>) -> Self {
        Self {
            command,
            values,
            used: Vec::new(),
        }
    }

    fn take(&mut self, key: &'a str) -> Option<&'a str> {
        self.used.push(key);
        self.values.get(key).map(String::as_str)
    }

    fn parse<T>(
        &self,
        key: &str,
        raw: &str,
        parse: impl Fn(&str) -> Result<T, ValidationError>,
    ) -> Result<T, ValidationError> {
        parse(raw).map_err(|reason| ValidationError::InvalidArgument {
            command: self.command.to_string(),
            arg: key.to_string(),
            reason: Box::new(reason),
        })
    }

    fn required<T>(
        &mut self,
        key: &'a str,
        parse: impl Fn(&str) -> Result<T, ValidationError>,
    ) -> Result<T, ValidationError> {
        match self.take(key) {
            Some(raw) => self.parse(key, raw, parse),
            None => Err(ValidationError::MissingArgument {
                command: self.command.to_string(),
                arg: key.to_string(),
            }),
        }
    }

    fn optional<T>(
        &mut self,
        key: &'a str,
        default: T,
        parse: impl Fn(&str) -> Result<T, ValidationError>,
    ) -> Result<T, ValidationError> {
        match self.take(key) {
            Some(raw) => self.parse(key, raw, parse),
            None => Ok(default),
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        match self.values.keys().find(|k| !self.used.contains(&k.as_str())) {
            Some(extra) => Err(ValidationError::UnexpectedArgument {
                command: self.command.to_string(),
                arg: extra.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teleport_from_spec() {
        let spec = CommandSpec::new("Teleport")
            .arg("direction", "up")
            .arg("jump", "True");
        assert_eq!(
            Command::from_spec(&spec),
            Ok(Command::Teleport {
                direction: Direction::Up,
                jump: true
            })
        );
    }

    #[test]
    fn test_defaults_apply() {
        let spec = CommandSpec::new("shikigami").arg("direction", "left");
        assert_eq!(
            Command::from_spec(&spec),
            Ok(Command::Shikigami {
                direction: Direction::Left,
                attacks: 2,
                repetitions: 1
            })
        );

        let adjust = CommandSpec::new("Adjust").arg("x", "0.5").arg("y", "0.25");
        assert_eq!(
            Command::from_spec(&adjust),
            Ok(Command::Adjust {
                x: 0.5,
                y: 0.25,
                max_steps: DEFAULT_ADJUST_STEPS
            })
        );
    }

    #[test]
    fn test_shikigami_rejects_vertical() {
        let spec = CommandSpec::new("Shikigami").arg("direction", "up");
        match Command::from_spec(&spec) {
            Err(ValidationError::InvalidArgument { arg, reason, .. }) => {
                assert_eq!(arg, "direction");
                assert!(matches!(*reason, ValidationError::HorizontalDirection(_)));
            }
            other => panic!("expected invalid argument, got {:?}", other),
        }
    }

    #[test]
    fn test_repetitions_must_be_nonnegative_int() {
        for bad in ["-1", "1.5", "many"] {
            let spec = CommandSpec::new("Shikigami")
                .arg("direction", "right")
                .arg("repetitions", bad);
            assert!(
                Command::from_spec(&spec).is_err(),
                "repetitions={} should be rejected",
                bad
            );
        }
        let zero = CommandSpec::new("Shikigami")
            .arg("direction", "right")
            .arg("repetitions", "0");
        assert!(Command::from_spec(&zero).is_ok());
    }

    #[test]
    fn test_missing_and_unexpected_arguments() {
        assert_eq!(
            Command::from_spec(&CommandSpec::new("Teleport")),
            Err(ValidationError::MissingArgument {
                command: "Teleport".into(),
                arg: "direction".into()
            })
        );
        assert_eq!(
            Command::from_spec(&CommandSpec::new("Tengu").arg("speed", "9")),
            Err(ValidationError::UnexpectedArgument {
                command: "Tengu".into(),
                arg: "speed".into()
            })
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::from_spec(&CommandSpec::new("Fireball")),
            Err(ValidationError::UnknownCommand("Fireball".into()))
        );
    }

    #[test]
    fn test_yaksha_direction_is_optional() {
        assert_eq!(
            Command::from_spec(&CommandSpec::new("Yaksha")),
            Ok(Command::Yaksha { direction: None })
        );
        assert_eq!(
            Command::from_spec(&CommandSpec::new("Yaksha").arg("direction", "left")),
            Ok(Command::Yaksha {
                direction: Some(Direction::Left)
            })
        );
    }

    #[test]
    fn test_direction_helpers() {
        assert_eq!(Direction::horizontal(-0.1), Direction::Left);
        assert_eq!(Direction::horizontal(0.1), Direction::Right);
        assert_eq!(Direction::vertical(-0.1), Direction::Up);
        assert_eq!(Direction::vertical(0.1), Direction::Down);
        assert_eq!(Direction::Left.key(), "left");
    }
}
