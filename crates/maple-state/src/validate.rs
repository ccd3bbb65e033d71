//! Parsers for the string arguments found in routine definitions.
//!
//! Every command argument arrives as text. These functions are the only way
//! text becomes a typed parameter, so a routine either loads fully validated
//! or not at all.

use thiserror::Error;

use crate::command::Direction;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("'{0}' is not a valid direction (expected up, down, left or right)")]
    Direction(String),

    #[error("'{0}' is not a valid horizontal direction (expected left or right)")]
    HorizontalDirection(String),

    #[error("'{0}' is not a valid boolean (expected True or False)")]
    Boolean(String),

    #[error("'{0}' is not a non-negative integer")]
    NonNegativeInt(String),

    #[error("'{0}' is not a valid frequency (expected a positive integer)")]
    Frequency(u32),

    #[error("'{0}' is not a valid coordinate (expected a number in [0, 1])")]
    Coordinate(String),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("{command}: missing argument '{arg}'")]
    MissingArgument { command: String, arg: String },

    #[error("{command}: unexpected argument '{arg}'")]
    UnexpectedArgument { command: String, arg: String },

    #[error("{command}: argument '{arg}': {reason}")]
    InvalidArgument {
        command: String,
        arg: String,
        reason: Box<ValidationError>,
    },
}

/// Accept one of the four arrow directions
pub fn validate_direction(value: &str) -> Result<Direction, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "up" => Ok(Direction::Up),
        "down" => Ok(Direction::Down),
        "left" => Ok(Direction::Left),
        "right" => Ok(Direction::Right),
        _ => Err(ValidationError::Direction(value.to_string())),
    }
}

/// Accept `left` or `right` only
pub fn validate_horizontal(value: &str) -> Result<Direction, ValidationError> {
    match validate_direction(value) {
        Ok(d) if d.is_horizontal() => Ok(d),
        _ => Err(ValidationError::HorizontalDirection(value.to_string())),
    }
}

/// Accept `True`/`False` in any letter case
pub fn validate_boolean(value: &str) -> Result<bool, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ValidationError::Boolean(value.to_string())),
    }
}

/// Accept base-10 integers >= 0. Signs, fractions and exponents are rejected.
pub fn validate_nonnegative_int(value: &str) -> Result<u32, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::NonNegativeInt(value.to_string()));
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| ValidationError::NonNegativeInt(value.to_string()))
}

/// Accept a finite number within the normalized minimap range
pub fn validate_coordinate(value: &str) -> Result<f64, ValidationError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| coordinate_in_range(*v))
        .ok_or_else(|| ValidationError::Coordinate(value.to_string()))
}

pub(crate) fn coordinate_in_range(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
