mod calibration;
mod capture_loop;
mod config;
mod detect;
mod error;
pub mod matching;
mod templates;

pub use calibration::{calibrate, Calibration, CalibrationData};
pub use capture_loop::{CaptureLoop, DisplaySnapshot};
pub use config::{HsvRange, VisionConfig};
pub use detect::{dark_fraction, detect_hazard, detect_rune, locate_player, minimap_view};
pub use error::VisionError;
pub use matching::{distance, filter_color, match_all, match_best, to_relative, Template};
pub use templates::Templates;
