use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::command::{Command, CommandSpec};
use crate::position::Position;
use crate::validate::{coordinate_in_range, validate_boolean, ValidationError};

/// A waypoint and the commands to run on arrival
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    id: String,
    location: Position,
    commands: Vec<Command>,
    frequency: u32,
    skip: bool,
    adjust: bool,
}

impl Point {
    pub fn new(id: impl Into<String>, location: Position, commands: Vec<Command>) -> Self {
        Self {
            id: id.into(),
            location,
            commands,
            frequency: 1,
            skip: false,
            adjust: false,
        }
    }

    /// Run commands only every `frequency` visits; `skip` also skips the travel
    /// on the visits in between, `adjust` fine-tunes after arriving.
    pub fn with_options(mut self, frequency: u32, skip: bool, adjust: bool) -> Self {
        self.frequency = frequency.max(1);
        self.skip = skip;
        self.adjust = adjust;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Position {
        self.location
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn adjust(&self) -> bool {
        self.adjust
    }

    /// Whether the commands run on the `visit`-th arrival (0-based)
    pub fn is_active_visit(&self, visit: u64) -> bool {
        visit % self.frequency as u64 == 0
    }
}

fn default_frequency() -> u32 {
    1
}

/// Point as written in a routine file
#[derive(Debug, Clone, Deserialize)]
pub struct PointDef {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    #[serde(default)]
    pub skip: Option<String>,
    #[serde(default)]
    pub adjust: Option<String>,
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

impl PointDef {
    fn build(&self, id: String) -> Result<Point, ValidationError> {
        for value in [self.x, self.y] {
            if !coordinate_in_range(value) {
                return Err(ValidationError::Coordinate(value.to_string()));
            }
        }
        if self.frequency == 0 {
            return Err(ValidationError::Frequency(self.frequency));
        }
        let skip = self.skip.as_deref().map(validate_boolean).transpose()?;
        let adjust = self.adjust.as_deref().map(validate_boolean).transpose()?;

        let commands = self
            .commands
            .iter()
            .map(Command::from_spec)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Point::new(id, Position::new(self.x, self.y), commands).with_options(
            self.frequency,
            skip.unwrap_or(false),
            adjust.unwrap_or(false),
        ))
    }
}

/// Ordered, cyclic sequence of points.
///
/// The cursor always stays in `0..len` (or 0 when empty). Points appended
/// while recording go to the end and never move the cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Routine {
    points: Vec<Point>,
    index: usize,
    recorded: usize,
}

impl Routine {
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            points,
            index: 0,
            recorded: 0,
        }
    }

    /// Build from definitions, stopping at the first invalid point or command.
    pub fn from_defs(defs: &[PointDef]) -> Result<Self> {
        let points = defs
            .iter()
            .enumerate()
            .map(|(i, def)| {
                def.build(format!("p{}", i))
                    .with_context(|| format!("Invalid routine point {}", i))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(points))
    }

    pub fn parse(json: &str) -> Result<Self> {
        let defs: Vec<PointDef> = serde_json::from_str(json).context("Failed to parse routine")?;
        Self::from_defs(&defs)
    }

    /// Load a routine file (a JSON array of points)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read routine {}", path.display()))?;
        let routine =
            Self::parse(&content).with_context(|| format!("Failed to load {}", path.display()))?;
        info!("Loaded routine with {} points from {}", routine.len(), path.display());
        Ok(routine)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn current(&self) -> Option<&Point> {
        self.points.get(self.index)
    }

    /// Move the cursor forward, wrapping at the end
    pub fn advance(&mut self) -> Option<&Point> {
        if self.points.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % self.points.len();
        self.points.get(self.index)
    }

    /// Closest point to `position` and its distance. Ties go to the earliest
    /// point; an empty routine yields `(None, f64::INFINITY)`.
    pub fn nearest_to(&self, position: Position) -> (Option<&Point>, f64) {
        let mut best: Option<&Point> = None;
        let mut best_distance = f64::INFINITY;
        for point in &self.points {
            let d = point.location.distance(&position);
            if d < best_distance {
                best = Some(point);
                best_distance = d;
            }
        }
        (best, best_distance)
    }

    /// Append a bare point at `location`
    pub fn add(&mut self, location: Position) -> &Point {
        let id = format!("rec{}", self.recorded);
        self.recorded += 1;
        self.points.push(Point::new(id, location, Vec::new()));
        &self.points[self.points.len() - 1]
    }
}
