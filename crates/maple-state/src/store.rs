use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::position::Position;
use crate::routine::{Point, Routine};

/// Event marker status. Published and cleared as one value so readers never
/// see an active event without its position.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuneState {
    pub active: bool,
    pub position: Option<Position>,
    /// Routine point closest to the marker, where resolution starts from
    pub target: Option<Point>,
}

/// Point-in-time copy of every field in the store
#[derive(Debug, Clone, Serialize)]
pub struct GameStateSnapshot {
    pub enabled: bool,
    pub alert_active: bool,
    pub record_layout: bool,
    pub player_pos: Option<Position>,
    pub rune: RuneState,
    pub routine: Routine,
    pub path: Vec<Position>,
}

/// Process-wide facts shared by the capture loop, the command engine and
/// external controls.
///
/// Each field has its own lock or atomic so writers of one field never block
/// readers of another; critical sections only copy values in or out. Every
/// write is last-writer-wins.
#[derive(Debug, Default)]
pub struct GameState {
    enabled: AtomicBool,
    alert_active: AtomicBool,
    record_layout: AtomicBool,
    player_pos: RwLock<Option<Position>>,
    rune: RwLock<RuneState>,
    routine: RwLock<Routine>,
    path: RwLock<Arc<Vec<Position>>>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routine(routine: Routine) -> Self {
        let state = Self::default();
        *state.routine.write() = routine;
        state
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Flip the enabled flag; enabling also acknowledges any alert.
    /// Returns the new value.
    pub fn toggle_enabled(&self) -> bool {
        let enabled = !self.enabled.fetch_xor(true, Ordering::SeqCst);
        if enabled {
            self.clear_alert();
        }
        info!("Bot {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    pub fn alert_active(&self) -> bool {
        self.alert_active.load(Ordering::SeqCst)
    }

    /// Raise the alert and disable the bot, but only while enabled and not
    /// already alerting. Returns whether the alert fired.
    pub fn trip_alert(&self, reason: &str) -> bool {
        if !self.enabled() || self.alert_active() {
            return false;
        }
        self.alert_active.store(true, Ordering::SeqCst);
        self.enabled.store(false, Ordering::SeqCst);
        warn!("Alert raised: {}. Bot disabled", reason);
        true
    }

    /// Acknowledge the alert without touching the enabled flag
    pub fn clear_alert(&self) {
        self.alert_active.store(false, Ordering::SeqCst);
    }

    pub fn record_layout(&self) -> bool {
        self.record_layout.load(Ordering::SeqCst)
    }

    pub fn set_record_layout(&self, record: bool) {
        self.record_layout.store(record, Ordering::SeqCst);
    }

    pub fn player_pos(&self) -> Option<Position> {
        *self.player_pos.read()
    }

    pub fn set_player_pos(&self, pos: Position) {
        *self.player_pos.write() = Some(pos);
    }

    pub fn rune(&self) -> RuneState {
        self.rune.read().clone()
    }

    pub fn rune_active(&self) -> bool {
        self.rune.read().active
    }

    pub fn publish_rune(&self, position: Position, target: Option<Point>) {
        *self.rune.write() = RuneState {
            active: true,
            position: Some(position),
            target,
        };
    }

    pub fn clear_rune(&self) {
        self.rune.write().active = false;
    }

    pub fn set_routine(&self, routine: Routine) {
        *self.routine.write() = routine;
    }

    pub fn routine(&self) -> Routine {
        self.routine.read().clone()
    }

    pub fn routine_len(&self) -> usize {
        self.routine.read().len()
    }

    pub fn current_point(&self) -> Option<Point> {
        self.routine.read().current().cloned()
    }

    pub fn advance_routine(&self) -> Option<Point> {
        self.routine.write().advance().cloned()
    }

    pub fn nearest_point(&self, position: Position) -> (Option<Point>, f64) {
        let routine = self.routine.read();
        let (point, distance) = routine.nearest_to(position);
        (point.cloned(), distance)
    }

    /// Append `position` to the routine as a bare point
    pub fn record_point(&self, position: Position) {
        let mut routine = self.routine.write();
        let id = routine.add(position).id().to_string();
        debug!("Recorded {} at ({:.3}, {:.3})", id, position.x, position.y);
    }

    pub fn path(&self) -> Arc<Vec<Position>> {
        self.path.read().clone()
    }

    pub fn set_path(&self, path: Vec<Position>) {
        *self.path.write() = Arc::new(path);
    }

    pub fn snapshot(&self) -> GameStateSnapshot {
        GameStateSnapshot {
            enabled: self.enabled(),
            alert_active: self.alert_active(),
            record_layout: self.record_layout(),
            player_pos: self.player_pos(),
            rune: self.rune(),
            routine: self.routine(),
            path: self.path().as_ref().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_trip_alert_only_when_enabled() {
        let state = GameState::new();
        assert!(!state.trip_alert("test"));
        assert!(!state.alert_active());

        state.set_enabled(true);
        assert!(state.trip_alert("test"));
        assert!(state.alert_active());
        assert!(!state.enabled());

        // Already alerting: no second trip
        state.set_enabled(true);
        assert!(!state.trip_alert("test"));
    }

    #[test]
    fn test_toggle_clears_alert_on_enable() {
        let state = GameState::new();
        state.set_enabled(true);
        state.trip_alert("test");
        assert!(state.toggle_enabled());
        assert!(!state.alert_active());
        assert!(!state.toggle_enabled());
    }

    #[test]
    fn test_clear_alert_keeps_bot_disabled() {
        let state = GameState::new();
        state.set_enabled(true);
        state.trip_alert("test");
        state.clear_alert();
        assert!(!state.alert_active());
        assert!(!state.enabled());
    }

    #[test]
    fn test_rune_publish_and_clear() {
        let state = GameState::new();
        let target = Point::new("p1", Position::new(0.5, 0.5), vec![]);
        state.publish_rune(Position::new(0.4, 0.6), Some(target.clone()));
        let rune = state.rune();
        assert!(rune.active);
        assert_eq!(rune.position, Some(Position::new(0.4, 0.6)));
        assert_eq!(rune.target, Some(target));

        state.clear_rune();
        assert!(!state.rune_active());
    }

    #[test]
    fn test_record_point_appends() {
        let state = GameState::with_routine(Routine::new(vec![Point::new(
            "p0",
            Position::new(0.1, 0.1),
            vec![],
        )]));
        state.record_point(Position::new(0.9, 0.9));
        assert_eq!(state.routine_len(), 2);
        assert_eq!(state.current_point().map(|p| p.id().to_string()), Some("p0".into()));
    }

    #[test]
    fn test_position_reads_never_tear() {
        let state = Arc::new(GameState::new());
        let writer = {
            let state = state.clone();
            thread::spawn(move || {
                for i in 0..20_000 {
                    let v = i as f64 / 20_000.0;
                    state.set_player_pos(Position::new(v, v));
                }
            })
        };
        for _ in 0..20_000 {
            if let Some(pos) = state.player_pos() {
                assert_eq!(pos.x, pos.y, "torn position read");
            }
        }
        writer.join().unwrap();
    }
}
