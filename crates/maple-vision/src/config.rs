use serde::{Deserialize, Serialize};

/// Inclusive lower/upper HSV bounds on OpenCV's 8-bit scale (H 0-180, S/V 0-255)
pub type HsvRange = ([u8; 3], [u8; 3]);

/// Thresholds and geometry for the capture loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Minimum match score for the player marker on the minimap
    pub player_threshold: f64,
    /// Minimum match score for the elite warning in the screen center
    pub hazard_threshold: f64,
    /// Minimum match score for the rune marker on the color-filtered minimap
    pub rune_threshold: f64,
    /// Minimum best-match score for the minimap corner during calibration
    pub calibration_threshold: f64,
    /// Gray level below which a pixel counts as black
    pub black_level: u8,
    /// Fraction of black pixels that means the screen went dark
    pub black_fraction: f64,
    /// Rune detection runs once every this many cycles
    pub rune_interval: u32,
    pub cycle_delay_ms: u64,
    /// Failed calibration cycles before a warning is logged
    pub calibration_warn_after: u32,
    /// Distance from the top of the screen to the top of the minimap
    pub minimap_top_border: u32,
    /// Thickness of the other three minimap borders
    pub minimap_border: u32,
    /// Smallest accepted bottom-right coordinate of the minimap, per axis
    pub minimap_min_extent: u32,
    pub rune_ranges: Vec<HsvRange>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            player_threshold: 0.8,
            hazard_threshold: 0.9,
            rune_threshold: 0.9,
            calibration_threshold: 0.5,
            black_level: 15,
            black_fraction: 0.95,
            rune_interval: 100,
            cycle_delay_ms: 1,
            calibration_warn_after: 500,
            minimap_top_border: 21,
            minimap_border: 8,
            minimap_min_extent: 75,
            rune_ranges: vec![([141, 148, 245], [146, 158, 255])],
        }
    }
}
